// Import ESP-IDF's NVS (Non-Volatile Storage) functionality
// The whole configuration is one JSON document under one key, so a write
// either lands completely or the previous document stays in place.
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

// Import ESP-IDF error codes for the "namespace never written" case
use esp_idf_svc::sys::{EspError, ESP_ERR_NVS_NOT_FOUND};

// Import logging macros for debug output
use log::{info, warn};

// Import anyhow for error handling
use anyhow::{anyhow, Result};

use climate_node_shared::config::ConfigStore;

// NVS storage keys
const NVS_NAMESPACE: &str = "node_config"; // Namespace groups related keys together
const CONFIG_KEY: &str = "config"; // Key for the configuration document
const CONFIG_BUFFER_LEN: usize = 1024; // Largest document we expect to read back

// Configuration storage - NVS-backed `ConfigStore`
pub struct NvsConfigStore {
    partition: EspDefaultNvsPartition, // Shared with the WiFi driver
}

impl NvsConfigStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }

    fn open(&self, read_write: bool) -> Result<EspNvs<NvsDefault>, EspError> {
        EspNvs::new(self.partition.clone(), NVS_NAMESPACE, read_write)
    }
}

impl ConfigStore for NvsConfigStore {
    fn load(&mut self) -> Result<Option<String>> {
        // Read-only open fails with NOT_FOUND until the portal has saved once
        let nvs = match self.open(false) {
            Ok(nvs) => nvs,
            Err(e) if e.code() == ESP_ERR_NVS_NOT_FOUND as i32 => {
                info!("📭 No stored configuration namespace yet");
                return Ok(None);
            }
            Err(e) => return Err(anyhow!("Failed to open NVS namespace: {:?}", e)),
        };

        let mut buffer = [0u8; CONFIG_BUFFER_LEN];
        match nvs.get_str(CONFIG_KEY, &mut buffer) {
            Ok(Some(json)) => {
                info!("📂 Loaded configuration document ({} bytes)", json.len());
                Ok(Some(json.to_string()))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("⚠️ Failed to read stored configuration: {:?}", e);
                Err(anyhow!("Failed to read configuration: {:?}", e))
            }
        }
    }

    fn persist(&mut self, json: &str) -> Result<()> {
        if json.len() >= CONFIG_BUFFER_LEN {
            return Err(anyhow!(
                "Configuration document too large ({} bytes)",
                json.len()
            ));
        }

        let mut nvs = self
            .open(true)
            .map_err(|e| anyhow!("Failed to open NVS namespace for writing: {:?}", e))?;
        nvs.set_str(CONFIG_KEY, json)
            .map_err(|e| anyhow!("Failed to write configuration: {:?}", e))?;

        info!("💾 Configuration stored in NVS ({} bytes)", json.len());
        Ok(())
    }
}
