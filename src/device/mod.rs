//! DeviceLogic - Protocol Dispatch and Device Operations
//!
//! ## Responsibilities
//!
//! - Route each decoded message to its handler
//! - Enforce transport authorization (HTTP-prohibited, lock-required)
//! - Recognition/event simulation against the data store
//!
//! Handlers convert their own recoverable faults into `failed` answers;
//! anything returned as `Err` here is a transport-level rejection and
//! happens before any state mutation.

mod recognition;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config_store::ConfigStore;
use crate::data_store::{DataStore, SecurityUpdate};
use crate::protocol::{
    Answer, AnprEngineInfo, CameraInfo, CamerasInfo, ClientMessage, DatabaseEdit, DateBody,
    DeviceInfos, ImageBody, InterfaceInfo, LogQuery, NetworkBlock, PlateList, PlateValue,
    SecurityInfo, SensorInfo, TracesBody, TriggerStatus,
};
use crate::{Error, Result};

/// Base64 of the stub XSD schema served by `getXSD`.
const XSD_BASE64: &str = "PD94bWwgdmVyc2lvbj0iMS4wIiBlbmNvZGluZz0iVVRGLTgiPz48eHM6c2NoZW1hIHhtbG5zOnhzPSJodHRwOi8vd3d3LnczLm9yZy8yMDAxL1hNTFNjaGVtYSI+PC94czpzY2hlbWE+";

/// Transport a message arrived on. Decides the authorization model:
/// HTTP locks implicitly per request, WebSocket locks explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    WebSocket,
}

/// DeviceLogic instance
pub struct DeviceLogic {
    settings: Arc<ConfigStore>,
    store: Arc<DataStore>,
    rng: Mutex<StdRng>,
}

impl DeviceLogic {
    /// Create with an entropy-seeded RNG.
    pub fn new(settings: Arc<ConfigStore>, store: Arc<DataStore>) -> Self {
        Self::with_rng(settings, store, StdRng::from_entropy())
    }

    /// Create with a fixed seed for deterministic tests.
    pub fn with_seed(settings: Arc<ConfigStore>, store: Arc<DataStore>, seed: u64) -> Self {
        Self::with_rng(settings, store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: Arc<ConfigStore>, store: Arc<DataStore>, rng: StdRng) -> Self {
        Self {
            settings,
            store,
            rng: Mutex::new(rng),
        }
    }

    /// Dispatch one message: transport checks first, then the handler.
    pub async fn dispatch(&self, message: &ClientMessage, transport: Transport) -> Result<Answer> {
        if transport == Transport::Http && message.prohibited_over_http() {
            return Err(Error::ForbiddenTransport(message.operation().to_string()));
        }
        if message.requires_locking() && !self.store.is_locked().await {
            return Err(Error::Authorization(format!(
                "{} requires the device to be locked",
                message.operation()
            )));
        }

        tracing::debug!(operation = %message.operation(), ?transport, "Dispatching message");
        self.handle(message).await
    }

    async fn handle(&self, message: &ClientMessage) -> Result<Answer> {
        match message {
            ClientMessage::GetConfig => self.handle_get_config().await,
            ClientMessage::GetCurrentLog(query) | ClientMessage::GetLog(query) => {
                self.handle_get_log(query.as_ref()).await
            }
            ClientMessage::GetDatabase => self.handle_get_database().await,
            ClientMessage::GetDate => self.handle_get_date().await,
            ClientMessage::GetImage(_) => self.handle_get_image().await,
            ClientMessage::GetInfos => self.handle_get_infos().await,
            ClientMessage::GetTraces => Ok(Answer::Traces(TracesBody {
                current_execution_old: "BASE64_TRACES_OLD".to_string(),
                current_execution_current: "BASE64_TRACES_NEW".to_string(),
            })),
            ClientMessage::GetXsd => Ok(Answer::Xsd(XSD_BASE64.to_string())),
            ClientMessage::OpenBarrier => {
                self.store.open_barrier().await;
                Ok(Answer::ok())
            }
            ClientMessage::CloseBarrier => {
                self.store.close_barrier().await;
                Ok(Answer::ok())
            }
            ClientMessage::TriggerOn(payload) => self.handle_trigger_on(payload.as_ref()).await,
            ClientMessage::TriggerOff(payload) => self.handle_trigger_off(payload.as_ref()).await,
            ClientMessage::Lock(payload) => {
                if self.store.lock(payload.password.as_deref()).await {
                    Ok(Answer::ok())
                } else {
                    Ok(Answer::failed("Failed to lock device"))
                }
            }
            ClientMessage::Unlock => {
                self.store.unlock().await;
                Ok(Answer::ok())
            }
            ClientMessage::ResetConfig => {
                if let Err(e) = self.settings.reset_defaults().await {
                    return Ok(Answer::failed(format!("Cannot reset config: {e}")));
                }
                self.store.log_config_change("*").await;
                Ok(Answer::ok())
            }
            ClientMessage::ResetEngine => {
                // Empty decision, not absence: the engine reports an idle
                // capture slot after a reset.
                let event = crate::protocol::RecognitionEvent {
                    date: self.store.simulated_date_ms().await.to_string(),
                    decision: crate::protocol::Decision::default(),
                };
                self.store.set_current_recognition(event).await;
                Ok(Answer::ok())
            }
            ClientMessage::SetConfig(payload) => self.handle_set_config(payload).await,
            ClientMessage::EditDatabase(edit) => self.handle_edit_database(edit).await,
            ClientMessage::AllowSetConfig(_) => {
                self.store.set_config_allowed(true).await;
                self.store.log_config_change("allowSetConfig").await;
                Ok(Answer::ok())
            }
            ClientMessage::ForbidSetConfig(_) => {
                self.store.set_config_allowed(false).await;
                self.store.log_config_change("forbidSetConfig").await;
                Ok(Answer::ok())
            }
            ClientMessage::SetEnableStreams(flags) => {
                // The transport adapter persists the subscription; the
                // handler only echoes the accepted flags.
                Ok(Answer::Streams(flags.clone()))
            }
            ClientMessage::SetSecurity(payload) => {
                let applied = self
                    .store
                    .apply_security(SecurityUpdate {
                        current_password: payload.current_lock_password.clone(),
                        new_password: payload.new_lock_password.clone(),
                        password_hint: payload.lock_password_hint.clone(),
                        rsa_hint: payload.rsa_hint.clone(),
                    })
                    .await;
                if applied {
                    Ok(Answer::ok())
                } else {
                    Ok(Answer::failed("Invalid current lock password"))
                }
            }
            ClientMessage::EraseDatabase => {
                self.store.clear_database().await;
                Ok(Answer::ok())
            }
            ClientMessage::Reboot => {
                self.store.simulate_reboot().await;
                Ok(Answer::ok())
            }
            // Accepted for protocol compatibility; nothing to simulate.
            ClientMessage::ResetCounters
            | ClientMessage::CalibrateZoomFocus(_)
            | ClientMessage::KeepAlive
            | ClientMessage::Update(_)
            | ClientMessage::Setup(_)
            | ClientMessage::TestFtp(_)
            | ClientMessage::TestNtp(_)
            | ClientMessage::UpdateWebFirmware(_) => Ok(Answer::ok()),
        }
    }

    async fn handle_get_config(&self) -> Result<Answer> {
        let settings = self.settings.snapshot().await;
        let config = json!({
            "device": {
                "@name": "Simulator Device",
                "@installationHeight_cm": "100"
            },
            "network": {
                "interface": {
                    "@ipAddress": settings.ip_address,
                    "@ipMask": "255.255.255.0"
                },
                "clp": {
                    "@port": settings.ws_port.to_string()
                },
                "ssws": {
                    "@httpPort": settings.http_port.to_string()
                }
            },
            "cameras": {
                "camera": {
                    "anpr": {
                        "@context": format!("{}>OTHERS", settings.default_context),
                        "@squarePlates": "0",
                        "@plateReliability": settings.plate_reliability.to_string()
                    }
                }
            },
            "database": {
                "@enabled": "0",
                "@openForAll": "0"
            },
            "io": {
                "defaultImpulse": {
                    "@pulseMode": "rising",
                    "@duration_ms": "500"
                }
            }
        });
        Ok(Answer::Config(config))
    }

    /// `getLog`/`getCurrentLog`: cached recognition if present, else a
    /// probabilistic draw against the configured success rate.
    async fn handle_get_log(&self, query: Option<&LogQuery>) -> Result<Answer> {
        if let Some(event) = self.store.current_recognition().await {
            return Ok(Answer::Anpr(event));
        }

        let rate = self.settings.recognition_success_rate().await;
        let roll = self.rng.lock().await.gen_range(1..=100u32);
        if roll > u32::from(rate) {
            return Ok(Answer::failed("No current recognition"));
        }

        let plate = match query.and_then(|q| q.plate.clone()) {
            Some(plate) => plate,
            None => recognition::random_plate(&mut *self.rng.lock().await),
        };
        let reliability = self.settings.plate_reliability().await;
        let context = self.settings.default_context().await;
        let date_ms = self.store.simulated_date_ms().await;
        let in_database = self.store.contains_plate(&plate).await;

        let event = recognition::synthesize_event(
            &mut *self.rng.lock().await,
            plate,
            reliability,
            &context,
            date_ms,
            in_database,
        );
        self.store.set_current_recognition(event.clone()).await;
        Ok(Answer::Anpr(event))
    }

    async fn handle_get_database(&self) -> Result<Answer> {
        let plate = self
            .store
            .plates()
            .await
            .into_iter()
            .map(|value| PlateValue { value })
            .collect();
        Ok(Answer::Database(PlateList { plate }))
    }

    async fn handle_get_date(&self) -> Result<Answer> {
        Ok(Answer::Date(DateBody {
            date: self.store.simulated_date_ms().await.to_string(),
        }))
    }

    async fn handle_get_image(&self) -> Result<Answer> {
        Ok(Answer::Image(ImageBody {
            date: self.store.simulated_date_ms().await.to_string(),
            jpeg: recognition::SAMPLE_JPEG.to_string(),
        }))
    }

    async fn handle_get_infos(&self) -> Result<Answer> {
        let locked = self.store.is_locked().await;
        let password_needed = self.store.lock_password_set().await;
        Ok(Answer::Infos(DeviceInfos {
            sensor: SensorInfo {
                kind: "Simulator".to_string(),
                firmware_version: env!("CARGO_PKG_VERSION").to_string(),
                serial: "SIM12345".to_string(),
                mac_address: "00:11:22:33:44:55".to_string(),
                status: "RUNNING".to_string(),
                locked: wire_flag(locked),
            },
            cameras: CamerasInfo {
                camera: CameraInfo {
                    id: "0".to_string(),
                    enabled_algorithms: json!({ "anpr": null, "trigger": null }),
                },
            },
            network: NetworkBlock {
                interface_wifi: InterfaceInfo {
                    mac_address: "00:22:55:00:aa:cc".to_string(),
                    connected: wire_flag(true),
                },
            },
            security: SecurityInfo {
                lock_password_needed: wire_flag(password_needed),
                rsa_crypted: wire_flag(false),
            },
            anpr: AnprEngineInfo {
                version: "1.0".to_string(),
                possible_contexts: format!("{}>OTHERS", self.settings.default_context().await),
            },
        }))
    }

    async fn handle_trigger_on(
        &self,
        payload: Option<&crate::protocol::TriggerOnPayload>,
    ) -> Result<Answer> {
        let camera_id = payload
            .and_then(|p| p.camera_id.clone())
            .unwrap_or_else(|| "0".to_string());
        let timeout_ms = payload
            .and_then(|p| p.timeout.as_deref())
            .and_then(|t| t.parse().ok())
            .unwrap_or(1000);

        let id = self.rng.lock().await.gen_range(1..=10_000u32);
        self.store.open_trigger(id, &camera_id, timeout_ms).await;
        tracing::debug!(trigger_id = id, camera_id = %camera_id, timeout_ms, "Trigger session opened");
        Ok(TriggerStatus::ok_for_id(id))
    }

    async fn handle_trigger_off(
        &self,
        payload: Option<&crate::protocol::TriggerOffPayload>,
    ) -> Result<Answer> {
        let camera_id = payload
            .and_then(|p| p.camera_id.clone())
            .unwrap_or_else(|| "0".to_string());

        match self.store.close_trigger(&camera_id).await {
            Some(id) => Ok(TriggerStatus::ok_for_id(id)),
            None => Ok(TriggerStatus::failed_for_id(
                0,
                format!("No active trigger for camera {camera_id}"),
            )),
        }
    }

    /// `setConfig`: best-effort extraction of the one whitelisted field
    /// from a loosely-typed nested payload. Malformed shapes yield a
    /// failed answer, never a panic.
    async fn handle_set_config(&self, payload: &Value) -> Result<Answer> {
        if !self.store.is_config_allowed().await {
            return Ok(Answer::failed("Configuration changes are not allowed"));
        }
        if payload.is_null() || !payload.is_object() {
            return Ok(Answer::failed("Invalid config data"));
        }

        let Some(raw) = payload.pointer("/config/cameras/camera/anpr/@plateReliability") else {
            // Nothing we simulate was touched
            return Ok(Answer::ok());
        };

        let reliability = match raw {
            Value::String(s) => s.parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        match reliability {
            Some(value) if value <= 100 => {
                if let Err(e) = self.settings.set_plate_reliability(value as u8).await {
                    return Ok(Answer::failed(format!("Cannot persist config: {e}")));
                }
                self.store
                    .log_config_change("cameras.camera.anpr.plateReliability")
                    .await;
                Ok(Answer::ok())
            }
            _ => Ok(Answer::failed(format!(
                "Invalid config format: bad plateReliability {raw}"
            ))),
        }
    }

    async fn handle_edit_database(&self, edit: &DatabaseEdit) -> Result<Answer> {
        match edit {
            DatabaseEdit::AddPlate(plate) => {
                self.store.add_plate(&plate.value).await;
                Ok(Answer::ok())
            }
            DatabaseEdit::DelPlate(plate) => {
                if self.store.remove_plate(&plate.value).await {
                    Ok(Answer::ok())
                } else {
                    Ok(Answer::failed(format!("Plate not found: {}", plate.value)))
                }
            }
        }
    }
}

fn wire_flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StreamFlags;

    fn fixture(seed: u64) -> (Arc<ConfigStore>, Arc<DataStore>, DeviceLogic) {
        let settings = Arc::new(ConfigStore::in_memory());
        let store = Arc::new(DataStore::new().0);
        let device = DeviceLogic::with_seed(settings.clone(), store.clone(), seed);
        (settings, store, device)
    }

    async fn ws(device: &DeviceLogic, raw: &[u8]) -> Answer {
        let msg = ClientMessage::decode(raw).unwrap();
        device.dispatch(&msg, Transport::WebSocket).await.unwrap()
    }

    #[tokio::test]
    async fn test_prohibited_over_http_rejected_before_handler() {
        let (_, store, device) = fixture(1);
        let msg = ClientMessage::decode(br#"{"lock":{"@password":"x"}}"#).unwrap();
        let err = device.dispatch(&msg, Transport::Http).await.unwrap_err();
        assert!(matches!(err, Error::ForbiddenTransport(_)));
        assert!(!store.is_locked().await); // no state mutation

        // Same message over WebSocket is fine
        assert_eq!(
            device.dispatch(&msg, Transport::WebSocket).await.unwrap(),
            Answer::ok()
        );
    }

    #[tokio::test]
    async fn test_lock_required_without_lock_is_authorization_error() {
        let (_, _, device) = fixture(1);
        let msg =
            ClientMessage::decode(br#"{"editDatabase":{"addPlate":{"@value":"AB123CD"}}}"#).unwrap();
        let err = device
            .dispatch(&msg, Transport::WebSocket)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
    }

    #[tokio::test]
    async fn test_ws_lock_then_set_config() {
        let (settings, store, device) = fixture(1);
        assert_eq!(ws(&device, br#"{"lock":{"@password":"abc"}}"#).await, Answer::ok());
        assert!(store.is_locked().await);

        let answer = ws(
            &device,
            br#"{"setConfig":{"config":{"cameras":{"camera":{"anpr":{"@plateReliability":"90"}}}}}}"#,
        )
        .await;
        assert_eq!(answer, Answer::ok());
        assert_eq!(settings.plate_reliability().await, 90);
    }

    #[tokio::test]
    async fn test_set_config_forbidden() {
        let (_, store, device) = fixture(1);
        store.lock(None).await;
        store.set_config_allowed(false).await;
        let answer = ws(
            &device,
            br#"{"setConfig":{"config":{"cameras":{"camera":{"anpr":{"@plateReliability":"90"}}}}}}"#,
        )
        .await;
        assert_eq!(
            answer,
            Answer::failed("Configuration changes are not allowed")
        );
    }

    #[tokio::test]
    async fn test_set_config_malformed_values_fail_cleanly() {
        let (settings, store, device) = fixture(1);
        store.lock(None).await;
        let answer = ws(
            &device,
            br#"{"setConfig":{"config":{"cameras":{"camera":{"anpr":{"@plateReliability":"many"}}}}}}"#,
        )
        .await;
        assert!(answer.is_failed());
        assert_eq!(settings.plate_reliability().await, 80); // untouched

        // Payload without the whitelisted field is accepted best-effort
        let answer = ws(&device, br#"{"setConfig":{"config":{"other":1}}}"#).await;
        assert_eq!(answer, Answer::ok());
    }

    #[tokio::test]
    async fn test_delete_absent_plate_reports_not_found() {
        let (_, store, device) = fixture(1);
        store.lock(None).await;
        let answer = ws(
            &device,
            br#"{"editDatabase":{"delPlate":{"@value":"ZZ999ZZ"}}}"#,
        )
        .await;
        assert_eq!(answer, Answer::failed("Plate not found: ZZ999ZZ"));
    }

    #[tokio::test]
    async fn test_trigger_off_returns_id_from_trigger_on() {
        let (_, _, device) = fixture(42);
        let on = ws(&device, br#"{"triggerOn":{"@cameraId":"0","@timeout":"500"}}"#).await;
        let Answer::Trigger(on) = on else {
            panic!("unexpected: {on:?}");
        };
        assert_eq!(on.status, "ok");

        let off = ws(&device, br#"{"triggerOff":{"@cameraId":"0"}}"#).await;
        let Answer::Trigger(off) = off else {
            panic!("unexpected: {off:?}");
        };
        assert_eq!(off.status, "ok");
        assert_eq!(off.trigger_id, on.trigger_id);

        // No session left for that camera
        let off = ws(&device, br#"{"triggerOff":{"@cameraId":"0"}}"#).await;
        let Answer::Trigger(off) = off else {
            panic!("unexpected: {off:?}");
        };
        assert_eq!(off.status, "failed");
        assert_eq!(off.trigger_id, 0);
    }

    #[tokio::test]
    async fn test_recognition_rate_100_always_recognizes() {
        let (settings, store, device) = fixture(3);
        settings.set_recognition_success_rate(100).await.unwrap();
        for _ in 0..20 {
            let answer = ws(&device, br#"{"getCurrentLog":null}"#).await;
            assert!(matches!(answer, Answer::Anpr(_)), "got {answer:?}");
            // Clear the cached recognition so every call re-rolls
            store.simulate_reboot().await;
        }
    }

    #[tokio::test]
    async fn test_recognition_rate_0_never_recognizes() {
        let (settings, _, device) = fixture(3);
        settings.set_recognition_success_rate(0).await.unwrap();
        for _ in 0..20 {
            let answer = ws(&device, br#"{"getLog":null}"#).await;
            assert_eq!(answer, Answer::failed("No current recognition"));
        }
    }

    #[tokio::test]
    async fn test_cached_recognition_is_returned_as_is() {
        let (settings, _, device) = fixture(3);
        settings.set_recognition_success_rate(100).await.unwrap();
        let first = ws(&device, br#"{"getCurrentLog":null}"#).await;
        let second = ws(&device, br#"{"getCurrentLog":null}"#).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_database_match_distance_zero_iff_known() {
        let (settings, store, device) = fixture(3);
        settings.set_recognition_success_rate(100).await.unwrap();
        store.add_plate("AB123CD").await;

        let answer = ws(&device, br#"{"getLog":{"@plate":"AB123CD"}}"#).await;
        let Answer::Anpr(event) = answer else {
            panic!("unexpected: {answer:?}");
        };
        let db = event.decision.database.expect("known plate must match");
        assert_eq!(db.plate, "AB123CD");
        assert_eq!(db.distance, "0");

        store.simulate_reboot().await;
        let answer = ws(&device, br#"{"getLog":{"@plate":"XX000XX"}}"#).await;
        let Answer::Anpr(event) = answer else {
            panic!("unexpected: {answer:?}");
        };
        assert!(event.decision.database.is_none());
    }

    #[tokio::test]
    async fn test_set_security_flow() {
        let (_, store, device) = fixture(1);

        // State precondition checked inside the handler
        store.lock(None).await;
        store.unlock().await;
        let msg = ClientMessage::decode(br#"{"setSecurity":{"@newLockPassword":"abc"}}"#).unwrap();
        // requires_locking gate fires first when unlocked
        assert!(device.dispatch(&msg, Transport::WebSocket).await.is_err());

        store.lock(None).await;
        assert_eq!(
            ws(&device, br#"{"setSecurity":{"@newLockPassword":"abc"}}"#).await,
            Answer::ok()
        );
        // Changing again now needs the current password
        assert_eq!(
            ws(&device, br#"{"setSecurity":{"@newLockPassword":"def"}}"#).await,
            Answer::failed("Invalid current lock password")
        );
        assert_eq!(
            ws(
                &device,
                br#"{"setSecurity":{"@currentLockPassword":"abc","@newLockPassword":"def"}}"#
            )
            .await,
            Answer::ok()
        );

        store.unlock().await;
        assert!(store.lock(Some("def")).await);
    }

    #[tokio::test]
    async fn test_reboot_and_erase_database() {
        let (_, store, device) = fixture(1);
        store.lock(None).await;
        store.add_plate("AB123CD").await;

        assert_eq!(ws(&device, br#"{"eraseDatabase":null}"#).await, Answer::ok());
        assert!(store.plates().await.is_empty());

        assert_eq!(ws(&device, br#"{"reboot":null}"#).await, Answer::ok());
        assert!(!store.is_locked().await);
    }

    #[tokio::test]
    async fn test_set_enable_streams_echoes_flags() {
        let (_, _, device) = fixture(1);
        let answer = ws(
            &device,
            br#"{"setEnableStreams":{"@configChanges":"1","@traces":"1"}}"#,
        )
        .await;
        assert_eq!(
            answer,
            Answer::Streams(StreamFlags {
                config_changes: true,
                info_changes: false,
                traces: true,
            })
        );
    }

    #[tokio::test]
    async fn test_get_infos_reports_lock_state() {
        let (_, store, device) = fixture(1);
        let Answer::Infos(infos) = ws(&device, br#"{"getInfos":null}"#).await else {
            panic!("expected infos");
        };
        assert_eq!(infos.sensor.locked, "0");
        assert_eq!(infos.security.lock_password_needed, "0");

        store.lock(None).await;
        let Answer::Infos(infos) = ws(&device, br#"{"getInfos":null}"#).await else {
            panic!("expected infos");
        };
        assert_eq!(infos.sensor.locked, "1");
    }

    #[tokio::test]
    async fn test_compatibility_noops_answer_ok() {
        let (_, _, device) = fixture(1);
        for raw in [
            br#"{"resetCounters":null}"#.as_slice(),
            br#"{"testNTP":{"@host":"pool.ntp.org"}}"#,
            br#"{"testFTP":{"@address":"10.0.0.1"}}"#,
            br#"{"updateWebFirmware":{"@url":"http://x/fw.bin"}}"#,
        ] {
            assert_eq!(ws(&device, raw).await, Answer::ok());
        }
    }
}
