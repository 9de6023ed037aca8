mod item;

pub use item::{Candidate, Item, UpsertOutcome};

/// Counts reported at the end of one ingest pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub new: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Counts reported at the end of one delivery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub total: usize,
}
