//! Device bindings stored as JSON
//!
//! `devices.json` holds one entry per bound meter. Entries are checked one by
//! one on load: a malformed entry, an unknown model or a repeated address
//! only drops that entry, never the whole file.

use crate::device::BoundDevice;
use crate::registry::ProfileRegistry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// File name of the bindings table inside the data directory
pub const DEVICES_FILE: &str = "devices.json";

/// Bindings file of one bridge
#[derive(Debug)]
pub struct BindingStore {
    path: PathBuf,
    /// Held across a whole save so concurrent saves do not share the tmp file
    write_lock: Mutex<()>,
}

impl BindingStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(DEVICES_FILE),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the bindings whose model `registry` can serve
    pub async fn load(&self, registry: &ProfileRegistry) -> Vec<BoundDevice> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No bindings at {:?}, starting fresh", self.path);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read bindings {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        let entries = match serde_json::from_str::<Vec<serde_json::Value>>(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Bindings file {:?} is not a JSON list: {}", self.path, e);
                return Vec::new();
            }
        };

        let mut devices: BTreeMap<[u8; 8], BoundDevice> = BTreeMap::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let device = match serde_json::from_value::<BoundDevice>(entry) {
                Ok(device) => device,
                Err(e) => {
                    tracing::warn!("Skipping binding #{}: {}", index, e);
                    continue;
                }
            };
            if registry.lookup(&device.model_id).is_none() {
                tracing::warn!(
                    "Skipping binding of {} to unknown model {}",
                    device.ieee_address_string(),
                    device.model_id
                );
                continue;
            }
            if let Some(previous) = devices.insert(device.ieee_address, device) {
                tracing::warn!(
                    "Binding of {} listed twice, keeping the later one",
                    previous.ieee_address_string()
                );
            }
        }

        tracing::info!("Loaded {} bound devices from {:?}", devices.len(), self.path);
        devices.into_values().collect()
    }

    /// Replace the stored bindings, ordered by address
    #[allow(clippy::missing_errors_doc)]
    pub async fn save(&self, devices: &[BoundDevice]) -> Result<(), std::io::Error> {
        let mut sorted: Vec<&BoundDevice> = devices.iter().collect();
        sorted.sort_by_key(|device| device.ieee_address);
        let json = serde_json::to_string_pretty(&sorted)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).await?;
        fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!("Saved {} bound devices to {:?}", sorted.len(), self.path);
        Ok(())
    }
}
