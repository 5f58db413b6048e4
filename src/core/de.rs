//! ZAP writes most scalar fields as strings (`"count": "3"`, `"riskcode": "2"`),
//! but hand-edited or third-party reports use numbers. Accept both.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StringOrNumber {
    Number(u64),
    String(String),
}

pub(crate) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n),
        StringOrNumber::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(0);
            }
            s.parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid count: {s:?}")))
        }
    }
}

pub(crate) fn count_as_string<S: Serializer>(count: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&count.to_string())
}
