//! Broadcast result types
//!
//! Defines the summary returned by a fan-out.

use crate::client::ClientKey;

/// Outcome of one fan-out call
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    /// Recipients in the snapshot after exclusion
    pub attempted: usize,
    pub delivered: usize,
    /// Recipients removed from the registry because delivery failed
    pub failed: Vec<ClientKey>,
}

impl FanOutReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
