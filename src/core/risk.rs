use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::core::de::StringOrNumber;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    #[default]
    Informational,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Informational => "Informational",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// ZAP `riskcode` value.
    pub const fn code(self) -> u8 {
        match self {
            RiskLevel::Informational => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(RiskLevel::Informational),
            1 => Some(RiskLevel::Low),
            2 => Some(RiskLevel::Medium),
            3 => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u64>() {
            return RiskLevel::from_code(code)
                .ok_or_else(|| format!("invalid risk code: {s} (expected 0|1|2|3)"));
        }
        match s.to_ascii_lowercase().as_str() {
            "informational" | "info" => Ok(RiskLevel::Informational),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(format!(
                "invalid risk level: {s} (expected Informational|Low|Medium|High)"
            )),
        }
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code().to_string())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Number(n) => RiskLevel::from_code(n)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid risk code: {n}"))),
            StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
