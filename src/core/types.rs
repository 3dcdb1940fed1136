use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier handed out by the record manager. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u32);

impl From<u32> for RecordId {
    fn from(id: u32) -> Self {
        RecordId(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four roles the inverted layer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexedAttribute {
    /// Multi-valued text attribute; the pattern scanner runs over its keys.
    Text,
    /// Fractional count attribute, keyed by its canonical decimal form.
    Count,
    Lighting,
    Severity,
}

impl IndexedAttribute {
    pub const ALL: [IndexedAttribute; 4] = [
        IndexedAttribute::Text,
        IndexedAttribute::Count,
        IndexedAttribute::Lighting,
        IndexedAttribute::Severity,
    ];

    /// Suffix appended to the inverted store prefix to name this role's file.
    pub fn store_suffix(&self) -> &'static str {
        match self {
            IndexedAttribute::Text => "text",
            IndexedAttribute::Count => "count",
            IndexedAttribute::Lighting => "lighting",
            IndexedAttribute::Severity => "severity",
        }
    }
}

impl fmt::Display for IndexedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.store_suffix())
    }
}

/// Record field behind each indexed role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedAttributes {
    pub text: String,
    pub count: String,
    pub lighting: String,
    pub severity: String,
}

impl IndexedAttributes {
    pub fn field_for(&self, attribute: IndexedAttribute) -> &str {
        match attribute {
            IndexedAttribute::Text => &self.text,
            IndexedAttribute::Count => &self.count,
            IndexedAttribute::Lighting => &self.lighting,
            IndexedAttribute::Severity => &self.severity,
        }
    }
}

impl Default for IndexedAttributes {
    fn default() -> Self {
        IndexedAttributes {
            text: "crash_type".to_string(),
            count: "injuries_total".to_string(),
            lighting: "lighting_condition".to_string(),
            severity: "most_severe_injury".to_string(),
        }
    }
}

/// Durability level applied after each mutation of the log, the primary index
/// and the substores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Immediate, // fsync after every mutation
    Flush,     // hand bytes to the OS, let it decide
}
