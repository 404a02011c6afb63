//! Snapshot rows produced by each poll

use super::value::Value;
use serde::Serialize;
use std::fmt;

/// What a row shows: a display-map label, or the raw value when no label matched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Label(String),
    Raw(Value),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Label(label) => f.write_str(label),
            DisplayValue::Raw(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub label: String,
    pub value: DisplayValue,
}

impl fmt::Display for SnapshotRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}
