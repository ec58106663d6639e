//! ANPR Simulator
//!
//! Networked simulator for an ANPR (automatic number-plate recognition)
//! camera/barrier controller. Speaks the vendor device-control protocol
//! over two transports so client software can be integration-tested
//! without real hardware.
//!
//! ## Architecture (7 Components)
//!
//! 1. Protocol - tagged message/answer model with wire-compatible naming
//! 2. DataStore - mutex-guarded device state (lock, barrier, plates, log)
//! 3. DeviceLogic - message dispatch, authorization, recognition simulation
//! 4. ConfigStore - persisted simulator settings (JSON file)
//! 5. RealtimeHub - WebSocket connection registry and event broadcast
//! 6. WebAPI - HTTP `/sync` and WebSocket `/async` adapters
//! 7. State - shared application state wiring
//!
//! ## Design Principles
//!
//! - One critical section per store operation; both transports observe
//!   the same serialized device state
//! - Static per-message classification (lock-required, HTTP-prohibited)
//! - Domain failures are protocol answers, never transport errors

pub mod config_store;
pub mod data_store;
pub mod device;
pub mod error;
pub mod protocol;
pub mod realtime_hub;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
