use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use hap::server::IpServer;
use maxvapor_client_rs::DeviceRecord;
use tracing::warn;
use uuid::Uuid;

use crate::accessories::{EnailHandler, EnailThermostatAccessory};
use crate::cache::{AccessoryCache, CachedAccessory, PlatformAccessory};

/// What the platform needs from the home-automation host.
#[async_trait]
pub trait AccessoryHost: Send + Sync {
    /// Binds the characteristic handlers of `accessory` and exposes it.
    async fn attach(
        &self,
        accessory: &PlatformAccessory,
        device: &DeviceRecord,
        handler: EnailHandler,
    ) -> Result<()>;

    /// Records newly created accessories so they are restored on the next start.
    async fn register_accessories(&self, accessories: &[CachedAccessory]) -> Result<()>;
}

/// Host backed by the HAP server and the on-disk accessory cache.
pub struct HapHost {
    server: IpServer,
    cache: AccessoryCache,
    attached: DashMap<Uuid, EnailThermostatAccessory>,
}

impl HapHost {
    pub fn new(server: IpServer, cache: AccessoryCache) -> Self {
        Self {
            server,
            cache,
            attached: DashMap::new(),
        }
    }

    pub fn server(&self) -> &IpServer {
        &self.server
    }

    /// Accessories registered by previous runs.
    pub async fn cached_accessories(&self) -> Vec<CachedAccessory> {
        self.cache.entries().await
    }
}

#[async_trait]
impl AccessoryHost for HapHost {
    async fn attach(
        &self,
        accessory: &PlatformAccessory,
        device: &DeviceRecord,
        handler: EnailHandler,
    ) -> Result<()> {
        if let Some(existing) = self.attached.get(&accessory.uuid) {
            warn!(
                "E-nail {} is already exposed, ignoring second attach",
                existing.serial()
            );
            return Ok(());
        }
        let thermostat = EnailThermostatAccessory::new(
            accessory.aid,
            device.display_name(),
            handler,
            &self.server,
        )
        .await?;
        self.attached.insert(accessory.uuid, thermostat);
        Ok(())
    }

    async fn register_accessories(&self, accessories: &[CachedAccessory]) -> Result<()> {
        self.cache.add(accessories).await
    }
}
