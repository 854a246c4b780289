//! Persistent list of accessories the bridge has registered.
//!
//! HomeKit controllers identify accessories by their `aid`, so an e-nail
//! must get the same `aid` on every start. The cache keeps the identifier,
//! the assigned `aid` and the device record of each registered accessory
//! in a JSON file next to the HAP storage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use maxvapor_client_rs::DeviceRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub const CACHE_FILE_NAME: &str = "accessories.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccessory {
    pub uuid: Uuid,
    pub aid: u64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessory {
    #[serde(flatten)]
    pub accessory: PlatformAccessory,
    pub context: DeviceRecord,
}

pub struct AccessoryCache {
    path: PathBuf,
    entries: Mutex<Vec<CachedAccessory>>,
}

impl AccessoryCache {
    /// Loads the cache from `dir`. A missing file is an empty cache, an
    /// unreadable one is logged and replaced on the next save.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CACHE_FILE_NAME);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<CachedAccessory>>(&content) {
                Ok(entries) => {
                    info!("Loaded {} cached accessories", entries.len());
                    entries
                }
                Err(e) => {
                    warn!("Ignoring corrupted accessory cache {}: {e}", path.display());
                    vec![]
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => vec![],
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Cannot read accessory cache {}", path.display()));
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub async fn entries(&self) -> Vec<CachedAccessory> {
        self.entries.lock().await.clone()
    }

    /// Adds accessories, replacing any entry with the same identifier, and
    /// writes the file.
    pub async fn add(&self, accessories: &[CachedAccessory]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for accessory in accessories {
            entries.retain(|e| e.accessory.uuid != accessory.accessory.uuid);
            entries.push(accessory.clone());
        }
        entries.sort_by_key(|e| e.accessory.aid);
        let content = serde_json::to_string_pretty(&*entries)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Cannot write accessory cache {}", self.path.display()))
    }
}
