//! Answer model
//!
//! Every response is a single top-level JSON object whose sole key
//! names the answer kind, mirroring the request convention. Domain
//! failures are `answer` bodies with `@status: "failed"` and a readable
//! `@errorText`; they are protocol-level successes (HTTP 200).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::StreamFlags;

/// One protocol answer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Answer {
    #[serde(rename = "answer")]
    Status(Status),
    #[serde(rename = "triggerAnswer")]
    Trigger(TriggerStatus),
    #[serde(rename = "config")]
    Config(Value),
    #[serde(rename = "database")]
    Database(PlateList),
    #[serde(rename = "date")]
    Date(DateBody),
    #[serde(rename = "image")]
    Image(ImageBody),
    #[serde(rename = "infos")]
    Infos(DeviceInfos),
    #[serde(rename = "anpr")]
    Anpr(RecognitionEvent),
    #[serde(rename = "traces")]
    Traces(TracesBody),
    #[serde(rename = "xsd")]
    Xsd(String),
    #[serde(rename = "setEnableStreamsAnswer")]
    Streams(StreamFlags),
}

impl Answer {
    /// Plain `{"answer":{"@status":"ok"}}`.
    pub fn ok() -> Self {
        Self::Status(Status {
            status: "ok".to_string(),
            error_text: None,
        })
    }

    /// Domain failure with readable text.
    pub fn failed(text: impl Into<String>) -> Self {
        Self::Status(Status {
            status: "failed".to_string(),
            error_text: Some(text.into()),
        })
    }

    /// True for `failed` status answers.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Status(s) if s.status == "failed")
    }
}

/// `answer` body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Status {
    #[serde(rename = "@status")]
    pub status: String,
    #[serde(rename = "@errorText", skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

/// `triggerAnswer` body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TriggerStatus {
    #[serde(rename = "@status")]
    pub status: String,
    #[serde(rename = "@triggerId")]
    pub trigger_id: u32,
    #[serde(rename = "@errorText", skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl TriggerStatus {
    pub fn ok_for_id(id: u32) -> Answer {
        Answer::Trigger(Self {
            status: "ok".to_string(),
            trigger_id: id,
            error_text: None,
        })
    }

    pub fn failed_for_id(id: u32, text: impl Into<String>) -> Answer {
        Answer::Trigger(Self {
            status: "failed".to_string(),
            trigger_id: id,
            error_text: Some(text.into()),
        })
    }
}

/// `database` body: list of known plates.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlateList {
    pub plate: Vec<PlateValue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlateValue {
    #[serde(rename = "@value")]
    pub value: String,
}

/// `date` body: simulated clock in milliseconds, string-typed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DateBody {
    #[serde(rename = "@date")]
    pub date: String,
}

/// `image` body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageBody {
    #[serde(rename = "@date")]
    pub date: String,
    pub jpeg: String,
}

/// `traces` body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TracesBody {
    #[serde(rename = "currentExecution_old")]
    pub current_execution_old: String,
    #[serde(rename = "currentExecution_current")]
    pub current_execution_current: String,
}

/// `infos` body: the device identity blocks.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceInfos {
    pub sensor: SensorInfo,
    pub cameras: CamerasInfo,
    pub network: NetworkBlock,
    pub security: SecurityInfo,
    pub anpr: AnprEngineInfo,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SensorInfo {
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "@firmwareVersion")]
    pub firmware_version: String,
    #[serde(rename = "@serial")]
    pub serial: String,
    #[serde(rename = "@macAddress")]
    pub mac_address: String,
    #[serde(rename = "@status")]
    pub status: String,
    /// `"1"`/`"0"` on the wire
    #[serde(rename = "@locked")]
    pub locked: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CamerasInfo {
    pub camera: CameraInfo,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CameraInfo {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "enabledAlgorithms")]
    pub enabled_algorithms: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NetworkBlock {
    #[serde(rename = "interfaceWifi")]
    pub interface_wifi: InterfaceInfo,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InterfaceInfo {
    #[serde(rename = "@macAddress")]
    pub mac_address: String,
    #[serde(rename = "@connected")]
    pub connected: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecurityInfo {
    #[serde(rename = "@lockPasswordNeeded")]
    pub lock_password_needed: String,
    #[serde(rename = "@rsaCrypted")]
    pub rsa_crypted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnprEngineInfo {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@possibleContexts")]
    pub possible_contexts: String,
}

/// One recognition: the structured result of a simulated capture.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecognitionEvent {
    /// Simulated clock milliseconds, string-typed
    #[serde(rename = "@date")]
    pub date: String,
    pub decision: Decision,
}

/// Recognition decision. All attributes optional so the empty decision
/// produced by `resetEngine` serializes as `{}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    #[serde(rename = "@plate", skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    /// 0-100, string-typed on the wire
    #[serde(rename = "@reliability", skip_serializing_if = "Option::is_none")]
    pub reliability: Option<String>,
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg: Option<String>,
    #[serde(
        rename = "reliabilityPerCharacter",
        skip_serializing_if = "Option::is_none"
    )]
    pub reliability_per_character: Option<ReliabilityPerCharacter>,
    /// Present iff the plate is in the device database
    #[serde(rename = "database", skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReliabilityPerCharacter {
    #[serde(rename = "char")]
    pub chars: Vec<CharReliability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharReliability {
    #[serde(rename = "@index")]
    pub index: String,
    #[serde(rename = "@reliability")]
    pub reliability: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseMatch {
    #[serde(rename = "@plate")]
    pub plate: String,
    #[serde(rename = "@distance")]
    pub distance: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_answer_shape() {
        let json = serde_json::to_value(Answer::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"answer": {"@status": "ok"}}));
    }

    #[test]
    fn test_failed_answer_shape() {
        let json = serde_json::to_value(Answer::failed("Plate not found: ZZ999ZZ")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "answer": {"@status": "failed", "@errorText": "Plate not found: ZZ999ZZ"}
            })
        );
    }

    #[test]
    fn test_trigger_answer_shape() {
        let json = serde_json::to_value(TriggerStatus::ok_for_id(42)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"triggerAnswer": {"@status": "ok", "@triggerId": 42}})
        );
    }

    #[test]
    fn test_empty_decision_serializes_empty() {
        let event = RecognitionEvent {
            date: "1000".to_string(),
            decision: Decision::default(),
        };
        let json = serde_json::to_value(Answer::Anpr(event)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"anpr": {"@date": "1000", "decision": {}}})
        );
    }

    #[test]
    fn test_recognition_wire_attributes() {
        let event = RecognitionEvent {
            date: "5".to_string(),
            decision: Decision {
                plate: Some("AB123CD".to_string()),
                reliability: Some("80".to_string()),
                context: Some("F".to_string()),
                jpeg: None,
                reliability_per_character: Some(ReliabilityPerCharacter {
                    chars: vec![CharReliability {
                        index: "0".to_string(),
                        reliability: "92".to_string(),
                    }],
                }),
                database: Some(DatabaseMatch {
                    plate: "AB123CD".to_string(),
                    distance: "0".to_string(),
                }),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["decision"]["@plate"], "AB123CD");
        assert_eq!(json["decision"]["database"]["@distance"], "0");
        assert_eq!(
            json["decision"]["reliabilityPerCharacter"]["char"][0]["@index"],
            "0"
        );
    }

    #[test]
    fn test_stream_answer_echoes_string_flags() {
        let flags = StreamFlags {
            config_changes: true,
            info_changes: false,
            traces: true,
        };
        let json = serde_json::to_value(Answer::Streams(flags)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "setEnableStreamsAnswer": {
                    "@configChanges": "1",
                    "@infoChanges": "0",
                    "@traces": "1"
                }
            })
        );
    }
}
