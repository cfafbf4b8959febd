use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Recognized provenance keys. Anything else goes in `Extra`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataKey {
    RunName,
    SteadyStateTimes,
    FillPressure,
    PeakField,
    Discharge,
    Extra(String),
}

impl MetadataKey {
    /// The attribute name used when the key is persisted
    pub fn label(&self) -> &str {
        match self {
            Self::RunName => "Run name",
            Self::SteadyStateTimes => "Steady state times",
            Self::FillPressure => "Fill pressure",
            Self::PeakField => "Peak field",
            Self::Discharge => "Discharge",
            Self::Extra(name) => name,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "Run name" => Self::RunName,
            "Steady state times" => Self::SteadyStateTimes,
            "Fill pressure" => Self::FillPressure,
            "Peak field" => Self::PeakField,
            "Discharge" => Self::Discharge,
            other => Self::Extra(other.to_string()),
        }
    }
}

impl Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Interval(f64, f64),
}

impl Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Interval(start, end) => write!(f, "[{start}, {end}]"),
        }
    }
}

/// Key-value side table attached to a result collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: BTreeMap<MetadataKey, MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: MetadataKey, value: MetadataValue) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &MetadataKey) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    /// Copy every entry of other into self, replacing existing keys
    pub fn extend(&mut self, other: &Metadata) {
        for (key, value) in other.iter() {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKey, &MetadataValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn run_name(&self) -> Option<&str> {
        match self.entries.get(&MetadataKey::RunName) {
            Some(MetadataValue::Text(name)) => Some(name),
            _ => None,
        }
    }

    pub fn steady_state_times(&self) -> Option<(f64, f64)> {
        match self.entries.get(&MetadataKey::SteadyStateTimes) {
            Some(MetadataValue::Interval(start, end)) => Some((*start, *end)),
            _ => None,
        }
    }
}
