use serde::{Deserialize, Serialize};

/// The outcome of a single timeout sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    /// Ids of the orders that were moved from `pending` to `no_response` by this sweep.
    pub expired: Vec<i64>,
}

impl SweepResult {
    pub fn new(expired: Vec<i64>) -> Self {
        Self { expired }
    }

    pub fn count(&self) -> usize {
        self.expired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expired.is_empty()
    }
}
