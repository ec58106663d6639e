//! Client message model
//!
//! A request body is one JSON object with exactly one recognized
//! top-level key naming the operation. serde's externally-tagged enum
//! representation enforces the single-key invariant: zero keys, extra
//! keys and unknown keys all fail to decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire;
use crate::{Error, Result};

/// One decoded protocol message.
///
/// Variant payload shapes mirror the device: `null` payloads are unit
/// variants, optional/loose payloads carry `Option<Value>`, structured
/// payloads carry their own types.
#[derive(Debug, Clone, Deserialize)]
pub enum ClientMessage {
    #[serde(rename = "getConfig")]
    GetConfig,
    #[serde(rename = "getCurrentLog")]
    GetCurrentLog(Option<LogQuery>),
    #[serde(rename = "getDatabase")]
    GetDatabase,
    #[serde(rename = "getDate")]
    GetDate,
    #[serde(rename = "getImage")]
    GetImage(Option<Value>),
    #[serde(rename = "getInfos")]
    GetInfos,
    #[serde(rename = "getLog")]
    GetLog(Option<LogQuery>),
    #[serde(rename = "getTraces")]
    GetTraces,
    #[serde(rename = "getXSD")]
    GetXsd,
    #[serde(rename = "openBarrier")]
    OpenBarrier,
    #[serde(rename = "closeBarrier")]
    CloseBarrier,
    #[serde(rename = "triggerOn")]
    TriggerOn(Option<TriggerOnPayload>),
    #[serde(rename = "triggerOff")]
    TriggerOff(Option<TriggerOffPayload>),
    #[serde(rename = "lock")]
    Lock(LockPayload),
    #[serde(rename = "unlock")]
    Unlock,
    #[serde(rename = "resetConfig")]
    ResetConfig,
    #[serde(rename = "resetEngine")]
    ResetEngine,
    #[serde(rename = "setConfig")]
    SetConfig(Value),
    #[serde(rename = "editDatabase")]
    EditDatabase(DatabaseEdit),
    #[serde(rename = "resetCounters")]
    ResetCounters,
    #[serde(rename = "allowSetConfig")]
    AllowSetConfig(Option<Value>),
    #[serde(rename = "forbidSetConfig")]
    ForbidSetConfig(Option<Value>),
    #[serde(rename = "calibrateZoomFocus")]
    CalibrateZoomFocus(Option<Value>),
    #[serde(rename = "setEnableStreams")]
    SetEnableStreams(StreamFlags),
    #[serde(rename = "keepAlive")]
    KeepAlive,
    #[serde(rename = "update")]
    Update(Value),
    #[serde(rename = "setup")]
    Setup(Value),
    #[serde(rename = "setSecurity")]
    SetSecurity(SecurityPayload),
    #[serde(rename = "testFTP")]
    TestFtp(FtpPayload),
    #[serde(rename = "testNTP")]
    TestNtp(NtpPayload),
    #[serde(rename = "updateWebFirmware")]
    UpdateWebFirmware(FirmwarePayload),
    #[serde(rename = "eraseDatabase")]
    EraseDatabase,
    #[serde(rename = "reboot")]
    Reboot,
}

impl ClientMessage {
    /// Decode a raw request body.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Validation("Empty message".to_string()));
        }
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Validation(format!("Malformed message: {e}")))
    }

    /// Wire name of the operation.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::GetConfig => "getConfig",
            Self::GetCurrentLog(_) => "getCurrentLog",
            Self::GetDatabase => "getDatabase",
            Self::GetDate => "getDate",
            Self::GetImage(_) => "getImage",
            Self::GetInfos => "getInfos",
            Self::GetLog(_) => "getLog",
            Self::GetTraces => "getTraces",
            Self::GetXsd => "getXSD",
            Self::OpenBarrier => "openBarrier",
            Self::CloseBarrier => "closeBarrier",
            Self::TriggerOn(_) => "triggerOn",
            Self::TriggerOff(_) => "triggerOff",
            Self::Lock(_) => "lock",
            Self::Unlock => "unlock",
            Self::ResetConfig => "resetConfig",
            Self::ResetEngine => "resetEngine",
            Self::SetConfig(_) => "setConfig",
            Self::EditDatabase(_) => "editDatabase",
            Self::ResetCounters => "resetCounters",
            Self::AllowSetConfig(_) => "allowSetConfig",
            Self::ForbidSetConfig(_) => "forbidSetConfig",
            Self::CalibrateZoomFocus(_) => "calibrateZoomFocus",
            Self::SetEnableStreams(_) => "setEnableStreams",
            Self::KeepAlive => "keepAlive",
            Self::Update(_) => "update",
            Self::Setup(_) => "setup",
            Self::SetSecurity(_) => "setSecurity",
            Self::TestFtp(_) => "testFTP",
            Self::TestNtp(_) => "testNTP",
            Self::UpdateWebFirmware(_) => "updateWebFirmware",
            Self::EraseDatabase => "eraseDatabase",
            Self::Reboot => "reboot",
        }
    }

    /// Operation must run with the device locked.
    ///
    /// Fixed at the type level: HTTP acquires the lock implicitly for
    /// the duration of the call, WebSocket clients must have sent an
    /// explicit `lock` beforehand.
    pub const fn requires_locking(&self) -> bool {
        matches!(
            self,
            Self::ResetConfig
                | Self::SetConfig(_)
                | Self::EditDatabase(_)
                | Self::AllowSetConfig(_)
                | Self::ForbidSetConfig(_)
                | Self::CalibrateZoomFocus(_)
                | Self::SetSecurity(_)
                | Self::EraseDatabase
                | Self::Reboot
        )
    }

    /// Operation is only valid on the streaming transport.
    pub const fn prohibited_over_http(&self) -> bool {
        matches!(
            self,
            Self::Lock(_) | Self::KeepAlive | Self::Update(_) | Self::Setup(_)
        )
    }
}

/// Optional query payload of `getLog`/`getCurrentLog`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    /// Force a specific plate instead of a random one
    #[serde(rename = "@plate", default)]
    pub plate: Option<String>,
}

/// `triggerOn` payload. Both attributes are optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerOnPayload {
    #[serde(rename = "@cameraId", default)]
    pub camera_id: Option<String>,
    /// Milliseconds, string-typed on the wire
    #[serde(rename = "@timeout", default)]
    pub timeout: Option<String>,
}

/// `triggerOff` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerOffPayload {
    #[serde(rename = "@cameraId", default)]
    pub camera_id: Option<String>,
}

/// `lock` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockPayload {
    #[serde(rename = "@password", default)]
    pub password: Option<String>,
}

/// `editDatabase` payload: a choice between the add and delete forms.
#[derive(Debug, Clone, Deserialize)]
pub enum DatabaseEdit {
    #[serde(rename = "addPlate")]
    AddPlate(PlateRef),
    #[serde(rename = "delPlate")]
    DelPlate(PlateRef),
}

/// A plate reference inside `editDatabase`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlateRef {
    #[serde(rename = "@value")]
    pub value: String,
}

/// `setEnableStreams` payload and answer body: per-connection
/// subscription flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamFlags {
    #[serde(
        rename = "@configChanges",
        default,
        deserialize_with = "wire::de_flag",
        serialize_with = "wire::ser_flag"
    )]
    pub config_changes: bool,
    #[serde(
        rename = "@infoChanges",
        default,
        deserialize_with = "wire::de_flag",
        serialize_with = "wire::ser_flag"
    )]
    pub info_changes: bool,
    #[serde(
        rename = "@traces",
        default,
        deserialize_with = "wire::de_flag",
        serialize_with = "wire::ser_flag"
    )]
    pub traces: bool,
}

/// `setSecurity` payload. Only the lock-password and RSA-hint fields
/// are simulated; unknown attributes are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityPayload {
    #[serde(rename = "@newLockPassword")]
    pub new_lock_password: Option<String>,
    #[serde(rename = "@currentLockPassword")]
    pub current_lock_password: Option<String>,
    #[serde(rename = "@lockPasswordHint")]
    pub lock_password_hint: Option<String>,
    #[serde(rename = "@rsaHint")]
    pub rsa_hint: Option<String>,
}

/// `testFTP` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FtpPayload {
    #[serde(rename = "@address")]
    pub address: String,
    #[serde(rename = "@port", default)]
    pub port: Option<String>,
    #[serde(rename = "@login", default)]
    pub login: Option<String>,
    #[serde(rename = "@password", default)]
    pub password: Option<String>,
    #[serde(rename = "@protocol", default)]
    pub protocol: Option<String>,
    #[serde(rename = "@fileName", default)]
    pub file_name: Option<String>,
}

/// `testNTP` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NtpPayload {
    #[serde(rename = "@host")]
    pub host: String,
}

/// `updateWebFirmware` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwarePayload {
    #[serde(rename = "@url")]
    pub url: String,
}
