//! Telemetry value types produced by field extractors

use serde::{Deserialize, Serialize};

/// A scalar request parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A single fan reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fan {
    /// Fan speed in RPM
    pub speed: Option<i64>,
}

/// Per-board hashing data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HashBoard {
    /// Board slot index
    pub slot: u8,
    /// Board hashrate in TH/s
    pub hashrate: Option<f64>,
    /// Board temperature in degrees C
    pub temp: Option<f64>,
    /// Chip temperature in degrees C
    pub chip_temp: Option<f64>,
    /// Chips reported by the board
    pub chips: Option<u32>,
    /// Chips the board should carry for this model
    pub expected_chips: u32,
    /// Board did not report at all
    pub missing: bool,
}

impl HashBoard {
    /// Create an empty board placeholder, marked missing until data arrives
    pub fn empty(slot: u8, expected_chips: u32) -> Self {
        Self {
            slot,
            expected_chips,
            missing: true,
            ..Default::default()
        }
    }
}

/// A configured stratum pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub url: String,
    pub user: String,
}

/// A group of pools sharing a quota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolGroup {
    pub quota: u32,
    pub pools: Vec<Pool>,
}

/// A typed telemetry value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Fans(Vec<Fan>),
    HashBoards(Vec<HashBoard>),
    Pools(Vec<PoolGroup>),
}

impl TelemetryValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for TelemetryValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TelemetryValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for TelemetryValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for TelemetryValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for TelemetryValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<Fan>> for TelemetryValue {
    fn from(v: Vec<Fan>) -> Self {
        Self::Fans(v)
    }
}

impl From<Vec<HashBoard>> for TelemetryValue {
    fn from(v: Vec<HashBoard>) -> Self {
        Self::HashBoards(v)
    }
}

impl From<Vec<PoolGroup>> for TelemetryValue {
    fn from(v: Vec<PoolGroup>) -> Self {
        Self::Pools(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_serializes_plain() {
        let json = serde_json::to_string(&Scalar::from("Autostart")).unwrap();
        assert_eq!(json, "\"Autostart\"");
        let json = serde_json::to_string(&Scalar::from(3)).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_telemetry_value_untagged() {
        let fans = TelemetryValue::from(vec![Fan { speed: Some(4200) }]);
        assert_eq!(serde_json::to_string(&fans).unwrap(), r#"[{"speed":4200}]"#);
        assert_eq!(TelemetryValue::from(12i64).as_f64(), Some(12.0));
        assert_eq!(TelemetryValue::from("host").as_str(), Some("host"));
    }

    #[test]
    fn test_empty_hashboard_is_missing() {
        let board = HashBoard::empty(2, 76);
        assert!(board.missing);
        assert_eq!(board.slot, 2);
        assert_eq!(board.expected_chips, 76);
        assert_eq!(board.hashrate, None);
    }
}
