//! Typed setting values for the configuration store.
//!
//! Settings rows persist as `(key, value, type, category)`. The type tag is
//! explicit, never inferred; reading a setting requires presenting the
//! expected type, and a mismatch is a `config_invalid` error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Declared type of a setting row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Json,
    String,
    Integer,
    Float,
    Boolean,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(Self::Json),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Json(serde_json::Value),
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl SettingValue {
    /// The type tag this value persists under.
    pub fn setting_type(&self) -> SettingType {
        match self {
            Self::Json(_) => SettingType::Json,
            Self::String(_) => SettingType::String,
            Self::Integer(_) => SettingType::Integer,
            Self::Float(_) => SettingType::Float,
            Self::Boolean(_) => SettingType::Boolean,
        }
    }

    /// Decode a raw stored string under its declared type tag.
    pub fn decode(ty: SettingType, raw: &str) -> Result<Self> {
        match ty {
            SettingType::Json => serde_json::from_str(raw)
                .map(Self::Json)
                .map_err(|e| Error::ConfigInvalid(format!("bad json setting: {e}"))),
            SettingType::String => Ok(Self::String(raw.to_string())),
            SettingType::Integer => raw
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|e| Error::ConfigInvalid(format!("bad integer setting '{raw}': {e}"))),
            SettingType::Float => raw
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|e| Error::ConfigInvalid(format!("bad float setting '{raw}': {e}"))),
            SettingType::Boolean => match raw {
                "true" | "1" => Ok(Self::Boolean(true)),
                "false" | "0" => Ok(Self::Boolean(false)),
                other => Err(Error::ConfigInvalid(format!(
                    "bad boolean setting '{other}'"
                ))),
            },
        }
    }

    /// Encode to the raw string stored in the database.
    pub fn encode(&self) -> String {
        match self {
            Self::Json(v) => v.to_string(),
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }

    /// Extract a string, or `config_invalid` if the type differs.
    pub fn expect_string(&self) -> Result<&str> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(type_mismatch(SettingType::String, other)),
        }
    }

    /// Extract an integer, or `config_invalid` if the type differs.
    pub fn expect_integer(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            other => Err(type_mismatch(SettingType::Integer, other)),
        }
    }

    /// Extract a float, or `config_invalid` if the type differs.
    pub fn expect_float(&self) -> Result<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Integer(i) => Ok(*i as f64),
            other => Err(type_mismatch(SettingType::Float, other)),
        }
    }

    /// Extract a boolean, or `config_invalid` if the type differs.
    pub fn expect_boolean(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(type_mismatch(SettingType::Boolean, other)),
        }
    }

    /// Extract a JSON value, or `config_invalid` if the type differs.
    pub fn expect_json(&self) -> Result<&serde_json::Value> {
        match self {
            Self::Json(v) => Ok(v),
            other => Err(type_mismatch(SettingType::Json, other)),
        }
    }
}

fn type_mismatch(wanted: SettingType, got: &SettingValue) -> Error {
    Error::ConfigInvalid(format!(
        "setting type mismatch: wanted {wanted}, stored {}",
        got.setting_type()
    ))
}
