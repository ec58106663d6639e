//! ConfigStore - Persisted Simulator Settings
//!
//! ## Responsibilities
//!
//! - Load/save the simulator settings file (JSON, wire-key names)
//! - Serve cached reads for the hot paths (recognition simulation)
//! - Apply whitelisted updates from `setConfig`
//!
//! A corrupt or unreadable settings file falls back to defaults rather
//! than refusing to start; the simulator must stay usable for clients
//! even when its own config is damaged.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Error, Result};

/// Persisted settings. Keys match the device configuration names used
/// by the web UI and the `getConfig` answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorSettings {
    pub ip_address: String,
    pub http_port: u16,
    pub ws_port: u16,
    /// Percentage [0,100]: chance that `getLog` synthesizes a
    /// recognition when none is cached
    pub recognition_success_rate: u8,
    /// Country context reported in decisions
    pub default_context: String,
    /// Reliability [0,100] reported in synthesized decisions
    pub plate_reliability: u8,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_string(),
            http_port: 8080,
            ws_port: 10001,
            recognition_success_rate: 75,
            default_context: "F".to_string(),
            plate_reliability: 80,
        }
    }
}

/// ConfigStore instance
pub struct ConfigStore {
    path: Option<PathBuf>,
    cache: RwLock<SimulatorSettings>,
}

impl ConfigStore {
    /// Load settings from `path`, creating the file with defaults when
    /// it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str(&raw) {
                    Ok(settings) => settings,
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "Settings file corrupt, using defaults");
                        SimulatorSettings::default()
                    }
                },
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Cannot read settings file, using defaults");
                    SimulatorSettings::default()
                }
            }
        } else {
            let defaults = SimulatorSettings::default();
            write_settings(&path, &defaults)?;
            tracing::info!(path = %path.display(), "Created default settings file");
            defaults
        };

        Ok(Self {
            path: Some(path),
            cache: RwLock::new(settings),
        })
    }

    /// Store without file persistence (tests, ephemeral runs).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: RwLock::new(SimulatorSettings::default()),
        }
    }

    pub async fn snapshot(&self) -> SimulatorSettings {
        self.cache.read().await.clone()
    }

    pub async fn recognition_success_rate(&self) -> u8 {
        self.cache.read().await.recognition_success_rate
    }

    pub async fn set_recognition_success_rate(&self, rate: u8) -> Result<()> {
        self.update(|s| s.recognition_success_rate = rate.min(100))
            .await
    }

    pub async fn plate_reliability(&self) -> u8 {
        self.cache.read().await.plate_reliability
    }

    pub async fn set_plate_reliability(&self, reliability: u8) -> Result<()> {
        self.update(|s| s.plate_reliability = reliability.min(100))
            .await
    }

    pub async fn default_context(&self) -> String {
        self.cache.read().await.default_context.clone()
    }

    /// Restore factory defaults (and persist them).
    pub async fn reset_defaults(&self) -> Result<()> {
        self.update(|s| *s = SimulatorSettings::default()).await
    }

    async fn update(&self, apply: impl FnOnce(&mut SimulatorSettings)) -> Result<()> {
        let snapshot = {
            let mut cache = self.cache.write().await;
            apply(&mut cache);
            cache.clone()
        };
        if let Some(path) = &self.path {
            write_settings(path, &snapshot)?;
        }
        Ok(())
    }
}

fn write_settings(path: &PathBuf, settings: &SimulatorSettings) -> Result<()> {
    let raw = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, raw).map_err(|e| {
        Error::Config(format!(
            "cannot write settings file {}: {e}",
            path.display()
        ))
    })
}
