//! Per-carrier configuration.

use crate::TimestampUnit;
use serde::{Deserialize, Serialize};

/// Configuration for one carrier, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierConfig {
    /// Backend key the carrier is persisted under
    pub name: String,
    /// Maximum number of entries; 0 means unlimited
    pub limit: usize,
    /// Unit of auto-generated timestamp keys
    pub timestamp_unit: TimestampUnit,
}

impl CarrierConfig {
    /// Unlimited carrier with millisecond timestamp keys.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit: 0,
            timestamp_unit: TimestampUnit::Millis,
        }
    }

    /// Cap the number of entries (0 = unlimited).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the unit of auto-generated keys.
    pub fn with_timestamp_unit(mut self, unit: TimestampUnit) -> Self {
        self.timestamp_unit = unit;
        self
    }

    /// Use second (`true`) or millisecond (`false`) timestamp keys.
    pub fn based_on_second(self, based_on_second: bool) -> Self {
        self.with_timestamp_unit(TimestampUnit::from_based_on_second(based_on_second))
    }

    /// Whether the carrier evicts entries.
    pub fn is_bounded(&self) -> bool {
        self.limit > 0
    }
}
