use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a record manager for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStats {
    pub opened_at: DateTime<Utc>,

    // Primary storage
    pub next_id: u64,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub log_size_bytes: u64,
    pub primary_index_size_bytes: u64,

    // Distinct keys per inverted substore
    pub text_keys: usize,
    pub count_keys: usize,
    pub lighting_keys: usize,
    pub severity_keys: usize,
}

impl ManagerStats {
    /// Every id ever assigned that still has a primary-index slot.
    pub fn known_records(&self) -> usize {
        self.valid_records + self.invalid_records
    }
}
