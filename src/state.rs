//! Application state shared across request handlers

use std::path::PathBuf;
use std::sync::Arc;

use crate::config_store::ConfigStore;
use crate::data_store::DataStore;
use crate::device::DeviceLogic;
use crate::realtime_hub::RealtimeHub;

/// Process configuration, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address
    pub host: String,
    /// Directory served at `/` for the bundled web UI, if any
    pub static_dir: Option<PathBuf>,
    /// Simulator settings file
    pub config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            static_dir: std::env::var("STATIC_DIR").ok().map(PathBuf::from),
            config_path: std::env::var("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config.json")),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub settings: Arc<ConfigStore>,
    pub store: Arc<DataStore>,
    pub device: Arc<DeviceLogic>,
    pub realtime: Arc<RealtimeHub>,
}
