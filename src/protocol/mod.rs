//! Protocol - Tagged Message/Answer Model
//!
//! ## Responsibilities
//!
//! - Decode request bodies into tagged message variants
//! - Static per-variant classification (lock-required, HTTP-prohibited)
//! - Answer serialization with the device's wire conventions
//!
//! ## Wire Conventions
//!
//! Every message and answer is a single top-level JSON object whose sole
//! key names the operation or answer kind. Attribute fields carry an `@`
//! prefix and several booleans/numbers are string-typed on the wire
//! (`"@locked": "1"`). These shapes are preserved exactly for
//! compatibility with existing clients.

mod answer;
mod message;
mod wire;

pub use answer::{
    Answer, AnprEngineInfo, CameraInfo, CamerasInfo, CharReliability, DatabaseMatch, DateBody,
    Decision, DeviceInfos, ImageBody, InterfaceInfo, NetworkBlock, PlateList, PlateValue,
    RecognitionEvent, ReliabilityPerCharacter, SecurityInfo, SensorInfo, Status, TracesBody,
    TriggerStatus,
};
pub use message::{
    ClientMessage, DatabaseEdit, FirmwarePayload, FtpPayload, LockPayload, LogQuery, NtpPayload,
    PlateRef, SecurityPayload, StreamFlags, TriggerOffPayload, TriggerOnPayload,
};
