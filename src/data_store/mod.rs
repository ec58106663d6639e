//! DataStore - Device State (Single Critical Section per Operation)
//!
//! ## Responsibilities
//!
//! - Hold all mutable device state (lock, barrier, plate set, current
//!   recognition, trigger sessions, simulated clock)
//! - Bounded event log (ring buffer, newest 100 kept)
//! - Forward every logged event on a tap channel for broadcast
//!
//! Every public operation takes the inner lock exactly once, so
//! cross-transport interleavings are serializable at operation
//! granularity. No operation re-enters the lock or holds it across an
//! await into another store call.

use std::collections::{BTreeSet, VecDeque};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::RecognitionEvent;

/// Bound on the event log; oldest entries are dropped first.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Barrier movement recorded in the log.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BarrierAction {
    Open,
    Close,
}

/// Plate database mutation recorded in the log.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseAction {
    Add,
    Remove,
    Clear,
}

/// Security mutation recorded in the log.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityChange {
    PasswordChange,
    RsaChange,
}

/// One logged device event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Barrier {
        action: BarrierAction,
    },
    Database {
        action: DatabaseAction,
        #[serde(skip_serializing_if = "Option::is_none")]
        plate: Option<String>,
    },
    Recognition {
        #[serde(skip_serializing_if = "Option::is_none")]
        plate: Option<String>,
    },
    Security {
        change: SecurityChange,
    },
    Config {
        path: String,
    },
    Reboot,
}

/// Broadcast category a log event belongs to, matched against
/// per-connection subscription flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCategory {
    ConfigChanges,
    InfoChanges,
    Traces,
}

impl StreamCategory {
    /// Top-level key of the unsolicited frame pushed to subscribers.
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::ConfigChanges => "configChanged",
            Self::InfoChanges => "infoChanged",
            Self::Traces => "traces",
        }
    }
}

impl LogEvent {
    pub const fn category(&self) -> StreamCategory {
        match self {
            Self::Config { .. } => StreamCategory::ConfigChanges,
            _ => StreamCategory::InfoChanges,
        }
    }
}

/// Log entry: event plus simulated-clock timestamp.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogEntry {
    /// Simulated clock milliseconds at append time
    pub date_ms: i64,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// One open trigger window. Sessions never expire on their own; they
/// persist until an explicit `triggerOff` (matching the real device).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSession {
    pub id: u32,
    pub camera_id: String,
    pub timeout_ms: i64,
    pub started_at_ms: i64,
}

/// Security update applied in one critical section.
#[derive(Debug, Clone, Default)]
pub struct SecurityUpdate {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub password_hint: Option<String>,
    pub rsa_hint: Option<String>,
}

struct StoreInner {
    locked: bool,
    lock_password: Option<String>,
    lock_password_hint: Option<String>,
    rsa_hint: Option<String>,
    barrier_open: bool,
    config_allowed: bool,
    plates: BTreeSet<String>,
    current_recognition: Option<RecognitionEvent>,
    event_log: VecDeque<LogEntry>,
    triggers: Vec<TriggerSession>,
    simulated_date_ms: i64,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            locked: false,
            lock_password: None,
            lock_password_hint: None,
            rsa_hint: None,
            barrier_open: false,
            config_allowed: true,
            plates: BTreeSet::new(),
            current_recognition: None,
            event_log: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            triggers: Vec::new(),
            simulated_date_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// DataStore instance
pub struct DataStore {
    inner: RwLock<StoreInner>,
    events: mpsc::UnboundedSender<LogEntry>,
}

impl DataStore {
    /// Create a store and the receiving end of its event tap. The
    /// receiver is wired to the realtime hub at startup; tests may
    /// simply drop it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: RwLock::new(StoreInner::new()),
                events: tx,
            },
            rx,
        )
    }

    fn append_log(&self, inner: &mut StoreInner, event: LogEvent) {
        let entry = LogEntry {
            date_ms: inner.simulated_date_ms,
            event,
        };
        if inner.event_log.len() >= MAX_LOG_ENTRIES {
            inner.event_log.pop_front();
        }
        inner.event_log.push_back(entry.clone());
        // Tap failures only mean nobody is listening
        let _ = self.events.send(entry);
    }

    /// Lock the device. Succeeds if no lock password is set or the
    /// supplied password matches exactly; idempotent, so locking an
    /// already-locked device with the right password still reports
    /// success.
    pub async fn lock(&self, password: Option<&str>) -> bool {
        let mut inner = self.inner.write().await;
        let accepted = match &inner.lock_password {
            Some(expected) => password == Some(expected.as_str()),
            None => true,
        };
        if accepted {
            inner.locked = true;
        }
        accepted
    }

    /// Lock bracket for a single HTTP request. Unlike [`lock`], an
    /// already-locked device refuses the attempt so an HTTP caller can
    /// never piggyback on (or later release) another party's lock.
    ///
    /// [`lock`]: DataStore::lock
    pub async fn lock_for_request(&self, password: Option<&str>) -> bool {
        let mut inner = self.inner.write().await;
        if inner.locked {
            return false;
        }
        let accepted = match &inner.lock_password {
            Some(expected) => password == Some(expected.as_str()),
            None => true,
        };
        if accepted {
            inner.locked = true;
        }
        accepted
    }

    /// Unlock. Always succeeds.
    pub async fn unlock(&self) -> bool {
        self.inner.write().await.locked = false;
        true
    }

    pub async fn is_locked(&self) -> bool {
        self.inner.read().await.locked
    }

    /// True once a lock password has been configured.
    pub async fn lock_password_set(&self) -> bool {
        self.inner.read().await.lock_password.is_some()
    }

    pub async fn open_barrier(&self) {
        let mut inner = self.inner.write().await;
        inner.barrier_open = true;
        self.append_log(
            &mut inner,
            LogEvent::Barrier {
                action: BarrierAction::Open,
            },
        );
    }

    pub async fn close_barrier(&self) {
        let mut inner = self.inner.write().await;
        inner.barrier_open = false;
        self.append_log(
            &mut inner,
            LogEvent::Barrier {
                action: BarrierAction::Close,
            },
        );
    }

    pub async fn is_barrier_open(&self) -> bool {
        self.inner.read().await.barrier_open
    }

    pub async fn set_config_allowed(&self, allowed: bool) {
        self.inner.write().await.config_allowed = allowed;
    }

    pub async fn is_config_allowed(&self) -> bool {
        self.inner.read().await.config_allowed
    }

    /// Record a configuration change in the event log.
    pub async fn log_config_change(&self, path: &str) {
        let mut inner = self.inner.write().await;
        self.append_log(
            &mut inner,
            LogEvent::Config {
                path: path.to_string(),
            },
        );
    }

    /// Set-insert; always succeeds, duplicates collapse.
    pub async fn add_plate(&self, plate: &str) {
        let mut inner = self.inner.write().await;
        inner.plates.insert(plate.to_string());
        self.append_log(
            &mut inner,
            LogEvent::Database {
                action: DatabaseAction::Add,
                plate: Some(plate.to_string()),
            },
        );
    }

    /// Remove a plate. Absent plates yield `false` with no mutation and
    /// no log entry.
    pub async fn remove_plate(&self, plate: &str) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.plates.remove(plate) {
            return false;
        }
        self.append_log(
            &mut inner,
            LogEvent::Database {
                action: DatabaseAction::Remove,
                plate: Some(plate.to_string()),
            },
        );
        true
    }

    pub async fn clear_database(&self) {
        let mut inner = self.inner.write().await;
        inner.plates.clear();
        self.append_log(
            &mut inner,
            LogEvent::Database {
                action: DatabaseAction::Clear,
                plate: None,
            },
        );
    }

    pub async fn contains_plate(&self, plate: &str) -> bool {
        self.inner.read().await.plates.contains(plate)
    }

    pub async fn plates(&self) -> Vec<String> {
        self.inner.read().await.plates.iter().cloned().collect()
    }

    /// Replace the current recognition wholesale.
    pub async fn set_current_recognition(&self, event: RecognitionEvent) {
        let mut inner = self.inner.write().await;
        let plate = event.decision.plate.clone();
        inner.current_recognition = Some(event);
        self.append_log(&mut inner, LogEvent::Recognition { plate });
    }

    pub async fn current_recognition(&self) -> Option<RecognitionEvent> {
        self.inner.read().await.current_recognition.clone()
    }

    /// Simulated reboot: clears lock, barrier and current recognition;
    /// configuration, security settings and the plate database survive.
    pub async fn simulate_reboot(&self) {
        let mut inner = self.inner.write().await;
        inner.locked = false;
        inner.barrier_open = false;
        inner.current_recognition = None;
        self.append_log(&mut inner, LogEvent::Reboot);
    }

    /// Apply a security update in one critical section. Fails (without
    /// mutating anything) when a lock password is already set and the
    /// supplied current password does not match it.
    pub async fn apply_security(&self, update: SecurityUpdate) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(expected) = &inner.lock_password {
            if update.current_password.as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        if let Some(new_password) = update.new_password {
            inner.lock_password = Some(new_password);
            self.append_log(
                &mut inner,
                LogEvent::Security {
                    change: SecurityChange::PasswordChange,
                },
            );
        }
        if let Some(hint) = update.password_hint {
            inner.lock_password_hint = Some(hint);
        }
        if let Some(rsa_hint) = update.rsa_hint {
            inner.rsa_hint = Some(rsa_hint);
            self.append_log(
                &mut inner,
                LogEvent::Security {
                    change: SecurityChange::RsaChange,
                },
            );
        }
        true
    }

    /// Record a trigger session opened by `triggerOn`.
    pub async fn open_trigger(&self, id: u32, camera_id: &str, timeout_ms: i64) {
        let mut inner = self.inner.write().await;
        let started_at_ms = inner.simulated_date_ms;
        inner.triggers.push(TriggerSession {
            id,
            camera_id: camera_id.to_string(),
            timeout_ms,
            started_at_ms,
        });
    }

    /// Close the first session whose camera matches, returning its id.
    pub async fn close_trigger(&self, camera_id: &str) -> Option<u32> {
        let mut inner = self.inner.write().await;
        let pos = inner.triggers.iter().position(|t| t.camera_id == camera_id)?;
        Some(inner.triggers.remove(pos).id)
    }

    pub async fn trigger_sessions(&self) -> Vec<TriggerSession> {
        self.inner.read().await.triggers.clone()
    }

    pub async fn simulated_date_ms(&self) -> i64 {
        self.inner.read().await.simulated_date_ms
    }

    pub async fn set_simulated_date_ms(&self, date_ms: i64) {
        self.inner.write().await.simulated_date_ms = date_ms;
    }

    /// Snapshot of the event log, oldest first.
    pub async fn event_log(&self) -> Vec<LogEntry> {
        self.inner.read().await.event_log.iter().cloned().collect()
    }
}
