//! Wire-format helpers
//!
//! The device encodes booleans as `"0"`/`"1"` strings in most places,
//! but clients in the field also send plain JSON booleans. Flags are
//! accepted in either form and always serialized back as strings.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Deserialize a wire flag: `"1"`, `"true"`, `true` or `1` are truthy;
/// `"0"`, `"false"`, `false`, `0` and `null` are falsy.
pub(crate) fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s == "1" || s.eq_ignore_ascii_case("true")),
        Value::Number(n) => Ok(n.as_i64() == Some(1)),
        other => Err(D::Error::custom(format!(
            "expected boolean flag, got {other}"
        ))),
    }
}

/// Serialize a flag as the device does: `"1"` or `"0"`.
pub(crate) fn ser_flag<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(if *value { "1" } else { "0" })
}
