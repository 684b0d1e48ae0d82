//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the node: the whole [`NodeConfig`] is one
//! postcard blob under `snuffelaar::nodecfg`.
//!
//! - Validation: [`NodeConfig::validate`] runs before every save, so a
//!   bad portal submission never reaches flash.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`, so
//!   a power cut mid-save leaves the previous config intact.
//! - WiFi credentials are not part of the blob.  ESP-IDF persists the
//!   station config in its own namespace.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::NodeConfig;
use log::info;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use log::warn;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "snuffelaar";
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
const CONFIG_KEY: &str = "nodecfg";
#[cfg(all(target_os = "espidf", feature = "espidf"))]
const CONFIG_KEY_C: &[u8] = b"nodecfg\0";

/// Upper bound on the stored blob; anything larger is treated as corrupt.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    store: std::cell::RefCell<std::collections::HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create the adapter, initialising NVS flash if nobody has yet.
    ///
    /// On a layout or version mismatch the partition is erased and
    /// re-initialised, which drops any stored config.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            // SAFETY: called from the single main context before any other
            // NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NvsAdapter: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            store: std::cell::RefCell::new(std::collections::HashMap::new()),
        })
    }

    /// Load the stored config, or the defaults when none is stored yet.
    /// A corrupt blob also falls back to defaults, with a warning.
    pub fn load_or_default(&self) -> NodeConfig {
        match self.load() {
            Ok(config) => config,
            Err(ConfigError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                NodeConfig::default()
            }
            Err(e) => {
                log::warn!("NvsAdapter: {}, using defaults", e);
                NodeConfig::default()
            }
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Overwrite the stored blob with garbage (simulation only).
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn corrupt_for_test(&self) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), vec![0xFF; 3]);
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(bytes),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(ConfigError::NotFound),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        self.store
            .borrow()
            .get(&Self::composite_key())
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        let bytes = self.read_blob()?;
        let config: NodeConfig =
            postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(config)
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
