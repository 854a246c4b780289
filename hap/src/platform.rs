use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use maxvapor_client_rs::{DeviceRecord, MaxVaporClientError, MaxVaporClientTrait};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::accessories::EnailHandler;
use crate::cache::{CachedAccessory, PlatformAccessory};
use crate::host::AccessoryHost;
use crate::web::metrics::Metrics;
use crate::web::state::{ApiStatus, BridgeState, DeviceInfo};

/// Time between two discovery passes.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(60);

/// The bridge itself is aid 1.
const FIRST_DEVICE_AID: u64 = 2;

const UUID_NAMESPACE: Uuid = Uuid::from_u128(0x6d61_7876_6170_4f72_a5e1_6e61_696c_0001);

/// Stable accessory identifier of the device with the given serial.
pub fn generate_uuid(serial: &str) -> Uuid {
    Uuid::new_v5(&UUID_NAMESPACE, serial.as_bytes())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Devices listed by the API.
    pub discovered: usize,
    /// New accessories created and registered with the host.
    pub registered: usize,
    /// Cached accessories that failed to attach at startup and got attached now.
    pub restored: usize,
    /// Accessories already attached earlier in this run.
    pub unchanged: usize,
    /// Devices that could not be exposed this pass.
    pub failed: usize,
}

struct KnownAccessory {
    accessory: PlatformAccessory,
    attached: bool,
}

/// Discovers e-nails and keeps the host's accessory list in sync with them.
///
/// Accessories are only ever added: a device missing from a later discovery
/// response stays registered.
pub struct Platform {
    client: Arc<dyn MaxVaporClientTrait>,
    host: Arc<dyn AccessoryHost>,
    accessories: DashMap<Uuid, KnownAccessory>,
    contexts: DashMap<Uuid, DeviceRecord>,
    next_aid: AtomicU64,
    state: BridgeState,
}

impl Platform {
    pub fn new(
        client: Arc<dyn MaxVaporClientTrait>,
        host: Arc<dyn AccessoryHost>,
        state: BridgeState,
    ) -> Self {
        Self {
            client,
            host,
            accessories: DashMap::new(),
            contexts: DashMap::new(),
            next_aid: AtomicU64::new(FIRST_DEVICE_AID),
            state,
        }
    }

    /// Called for every accessory restored from the host cache at startup.
    ///
    /// The accessory is exposed right away, whether or not a later discovery
    /// lists it. If exposing fails, the next discovery pass that lists the
    /// device tries again.
    pub async fn configure_accessory(&self, cached: CachedAccessory) {
        let CachedAccessory {
            accessory,
            context,
        } = cached;
        info!("Loading accessory from cache: {}", accessory.display_name);

        if accessory.uuid != generate_uuid(&context.serial) {
            warn!(
                "Cached accessory {} does not match serial {}",
                accessory.display_name, context.serial
            );
        }
        self.next_aid
            .fetch_max(accessory.aid + 1, Ordering::SeqCst);
        self.state.register_device(DeviceInfo {
            uuid: accessory.uuid.to_string(),
            serial: context.serial.clone(),
            name: accessory.display_name.clone(),
            aid: accessory.aid,
            restored: true,
            last_seen: None,
        });
        self.contexts.insert(accessory.uuid, context.clone());
        self.accessories.insert(
            accessory.uuid,
            KnownAccessory {
                accessory: accessory.clone(),
                attached: false,
            },
        );
        self.attach(&accessory, &context).await;
        Metrics::set_device_count(self.attached_count());
    }

    pub fn accessory_count(&self) -> usize {
        self.accessories.len()
    }

    /// Accessories currently exposed through the host.
    pub fn attached_count(&self) -> usize {
        self.accessories.iter().filter(|k| k.attached).count()
    }

    pub fn context(&self, uuid: &Uuid) -> Option<DeviceRecord> {
        self.contexts.get(uuid).map(|c| c.clone())
    }

    /// Runs one discovery pass.
    ///
    /// A failing discovery call abandons the pass. Failures to expose a single
    /// device are counted in the report and retried on the next pass.
    pub async fn discover_devices(&self) -> Result<DiscoveryReport, MaxVaporClientError> {
        let devices = match self.client.devices().await {
            Ok(devices) => devices,
            Err(e) => {
                let status = match &e {
                    MaxVaporClientError::Unauthorized => {
                        error!(
                            "Could not connect to MaxVapor API, please verify your credentials."
                        );
                        ApiStatus::Unauthorized
                    }
                    _ => {
                        error!("Error from API: {e}");
                        ApiStatus::Error
                    }
                };
                self.state.record_discovery_failure(status, e.to_string());
                Metrics::record_discovery(false);
                return Err(e);
            }
        };
        self.state.record_discovery_success();
        Metrics::record_discovery(true);

        let mut report = DiscoveryReport {
            discovered: devices.len(),
            ..Default::default()
        };
        for device in devices {
            self.add_accessory(device, &mut report).await;
        }
        Metrics::set_device_count(self.attached_count());
        Metrics::inc_registered(report.registered);
        debug!(?report, "Discovery pass done");
        Ok(report)
    }

    async fn add_accessory(&self, device: DeviceRecord, report: &mut DiscoveryReport) {
        let uuid = generate_uuid(&device.serial);
        let known = self
            .accessories
            .get(&uuid)
            .map(|k| (k.accessory.clone(), k.attached));

        match known {
            Some((_, true)) => {
                self.state.mark_seen(&uuid.to_string());
                report.unchanged += 1;
            }
            Some((accessory, false)) => {
                info!(
                    "Retrying cached accessory: {}",
                    accessory.display_name
                );
                let context = self.context(&uuid).unwrap_or_else(|| device.clone());
                if self.attach(&accessory, &context).await {
                    self.state.mark_seen(&uuid.to_string());
                    report.restored += 1;
                } else {
                    report.failed += 1;
                }
            }
            None => {
                info!("Adding new accessory: {}", device.display_name());
                let accessory = PlatformAccessory {
                    uuid,
                    aid: self.next_aid.fetch_add(1, Ordering::SeqCst),
                    display_name: device.display_name().to_string(),
                };
                self.contexts.insert(uuid, device.clone());
                if !self.attach(&accessory, &device).await {
                    self.contexts.remove(&uuid);
                    report.failed += 1;
                    return;
                }
                self.accessories.insert(
                    uuid,
                    KnownAccessory {
                        accessory: accessory.clone(),
                        attached: true,
                    },
                );
                self.state.register_device(DeviceInfo {
                    uuid: uuid.to_string(),
                    serial: device.serial.clone(),
                    name: accessory.display_name.clone(),
                    aid: accessory.aid,
                    restored: false,
                    last_seen: Some(std::time::Instant::now()),
                });
                let cached = CachedAccessory {
                    accessory,
                    context: device,
                };
                if let Err(e) = self.host.register_accessories(&[cached]).await {
                    warn!("Accessory exposed but not cached: {e:#}");
                }
                report.registered += 1;
            }
        }
    }

    async fn attach(&self, accessory: &PlatformAccessory, device: &DeviceRecord) -> bool {
        let handler = EnailHandler::new(device.serial.clone(), self.client.clone());
        match self.host.attach(accessory, device, handler).await {
            Ok(()) => {
                if let Some(mut known) = self.accessories.get_mut(&accessory.uuid) {
                    known.attached = true;
                }
                true
            }
            Err(e) => {
                error!(
                    "Failed to expose accessory {}: {e:#}",
                    accessory.display_name
                );
                false
            }
        }
    }

    /// Discovers right away, then again every `interval`. Passes never overlap.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.discover_devices().await {
                Ok(report) if report.registered > 0 || report.restored > 0 => info!(
                    "Discovery found {} devices: {} new, {} restored",
                    report.discovered, report.registered, report.restored
                ),
                Ok(_) => {}
                // already logged, wait for the next pass
                Err(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessories::testing::FakeMaxVaporClient;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct FakeHost {
        attached: RwLock<Vec<(PlatformAccessory, String)>>,
        registered: RwLock<Vec<CachedAccessory>>,
        fail_attach: AtomicBool,
    }

    #[async_trait]
    impl AccessoryHost for FakeHost {
        async fn attach(
            &self,
            accessory: &PlatformAccessory,
            _device: &DeviceRecord,
            handler: EnailHandler,
        ) -> Result<()> {
            if self.fail_attach.load(Ordering::SeqCst) {
                anyhow::bail!("HAP server refused the accessory");
            }
            self.attached
                .write()
                .await
                .push((accessory.clone(), handler.serial().to_string()));
            Ok(())
        }

        async fn register_accessories(&self, accessories: &[CachedAccessory]) -> Result<()> {
            self.registered.write().await.extend_from_slice(accessories);
            Ok(())
        }
    }

    fn platform(client: &FakeMaxVaporClient, host: &Arc<FakeHost>) -> Platform {
        Platform::new(Arc::new(client.clone()), host.clone(), BridgeState::new())
    }

    #[test]
    fn test_generate_uuid_is_stable() {
        assert_eq!(generate_uuid("ABC123"), generate_uuid("ABC123"));
        assert_ne!(generate_uuid("ABC123"), generate_uuid("ABC124"));
    }

    #[tokio::test]
    async fn test_discovery_registers_once() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("ABC123", "Nail1")]);
        let host = Arc::new(FakeHost::default());
        let platform = platform(&client, &host);

        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.registered, 1);

        let registered = host.registered.read().await.clone();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].accessory.uuid, generate_uuid("ABC123"));
        assert_eq!(registered[0].accessory.aid, FIRST_DEVICE_AID);
        assert_eq!(registered[0].accessory.display_name, "Nail1");
        assert_eq!(registered[0].context.serial, "ABC123");
        assert_eq!(
            platform.context(&generate_uuid("ABC123")).unwrap().name,
            "Nail1"
        );

        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.registered, 0);
        assert_eq!(report.unchanged, 1);
        assert_eq!(host.registered.read().await.len(), 1);
        assert_eq!(host.attached.read().await.len(), 1);
    }

    fn cached(serial: &str, name: &str, aid: u64) -> CachedAccessory {
        CachedAccessory {
            accessory: PlatformAccessory {
                uuid: generate_uuid(serial),
                aid,
                display_name: name.into(),
            },
            context: DeviceRecord::new(serial, name),
        }
    }

    #[tokio::test]
    async fn test_cached_accessory_is_attached_not_registered() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("ABC123", "Nail1")]);
        let host = Arc::new(FakeHost::default());
        let platform = platform(&client, &host);

        platform.configure_accessory(cached("ABC123", "Nail1", 7)).await;
        {
            let attached = host.attached.read().await;
            assert_eq!(attached.len(), 1);
            assert_eq!(attached[0].0.aid, 7);
            assert_eq!(attached[0].1, "ABC123");
        }
        assert_eq!(platform.attached_count(), 1);

        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.registered, 0);
        assert!(host.registered.read().await.is_empty());
        assert_eq!(host.attached.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_new_aids_follow_cached_ones() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("NEW1", "New")]);
        let host = Arc::new(FakeHost::default());
        let platform = platform(&client, &host);
        platform.configure_accessory(cached("OLD1", "Old", 5)).await;

        platform.discover_devices().await.unwrap();
        let registered = host.registered.read().await;
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].accessory.aid, 6);
        assert_eq!(platform.accessory_count(), 2);
    }

    #[tokio::test]
    async fn test_cached_device_missing_from_discovery_stays_exposed() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("NEW1", "New")]);
        let host = Arc::new(FakeHost::default());
        let platform = platform(&client, &host);
        platform.configure_accessory(cached("OLD1", "Old", 5)).await;

        platform.discover_devices().await.unwrap();
        let serials: Vec<_> = host
            .attached
            .read()
            .await
            .iter()
            .map(|(_, serial)| serial.clone())
            .collect();
        assert_eq!(serials, vec!["OLD1", "NEW1"]);
        assert_eq!(platform.attached_count(), 2);
    }

    #[tokio::test]
    async fn test_cached_accessories_exposed_when_api_is_down() {
        let client = FakeMaxVaporClient::failing();
        let host = Arc::new(FakeHost::default());
        let platform = platform(&client, &host);
        platform.configure_accessory(cached("ABC123", "Nail1", 2)).await;

        assert!(platform.discover_devices().await.is_err());
        let attached = host.attached.read().await;
        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].1, "ABC123");
    }

    #[tokio::test]
    async fn test_cached_attach_failure_is_retried_by_discovery() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("ABC123", "Nail1")]);
        let host = Arc::new(FakeHost::default());
        host.fail_attach.store(true, Ordering::SeqCst);
        let platform = platform(&client, &host);

        platform.configure_accessory(cached("ABC123", "Nail1", 3)).await;
        assert_eq!(platform.attached_count(), 0);

        host.fail_attach.store(false, Ordering::SeqCst);
        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.registered, 0);
        assert_eq!(host.attached.read().await[0].0.aid, 3);
        assert!(host.registered.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_serials_in_one_response() {
        let client = FakeMaxVaporClient::with_devices(vec![
            DeviceRecord::new("ABC123", "Nail1"),
            DeviceRecord::new("ABC123", "Nail1"),
        ]);
        let host = Arc::new(FakeHost::default());
        let platform = platform(&client, &host);

        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.discovered, 2);
        assert_eq!(report.registered, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(host.registered.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_abandons_pass() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("ABC123", "Nail1")]);
        client.unauthorized.store(true, Ordering::SeqCst);
        let host = Arc::new(FakeHost::default());
        let state = BridgeState::new();
        let platform = Platform::new(Arc::new(client.clone()), host.clone(), state.clone());

        let res = platform.discover_devices().await;
        assert!(matches!(res, Err(MaxVaporClientError::Unauthorized)));
        assert!(host.attached.read().await.is_empty());
        assert_eq!(state.api_status(), ApiStatus::Unauthorized);

        // next pass succeeds once the token is accepted
        client.unauthorized.store(false, Ordering::SeqCst);
        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.registered, 1);
        assert_eq!(state.api_status(), ApiStatus::Connected);
    }

    #[tokio::test]
    async fn test_failed_attach_is_retried() {
        let client = FakeMaxVaporClient::with_devices(vec![DeviceRecord::new("ABC123", "Nail1")]);
        let host = Arc::new(FakeHost::default());
        host.fail_attach.store(true, Ordering::SeqCst);
        let platform = platform(&client, &host);

        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(host.registered.read().await.is_empty());
        assert_eq!(platform.accessory_count(), 0);

        host.fail_attach.store(false, Ordering::SeqCst);
        let report = platform.discover_devices().await.unwrap();
        assert_eq!(report.registered, 1);
    }
}
