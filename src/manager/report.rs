//! Outcomes of invalidation sweeps.
//!
//! Invalidation never returns an error: a failure part-way through leaves the
//! keys deleted so far deleted and is recorded here instead.

use crate::error::StoreError;

/// Result of invalidating one pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    pub pattern: String,
    /// Keys actually removed
    pub deleted: u64,
    /// Error that stopped the sweep early, if any
    pub failure: Option<StoreError>,
}

impl InvalidationReport {
    pub(crate) fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            deleted: 0,
            failure: None,
        }
    }

    /// Whether every matching key was visited
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of invalidating every category of a namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceReport {
    /// One report per category, in namespace order
    pub categories: Vec<InvalidationReport>,
}

impl NamespaceReport {
    pub fn total_deleted(&self) -> u64 {
        self.categories.iter().map(|report| report.deleted).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.categories.iter().all(InvalidationReport::is_complete)
    }

    /// Reports of the categories that stopped early
    pub fn failures(&self) -> impl Iterator<Item = &InvalidationReport> {
        self.categories.iter().filter(|report| !report.is_complete())
    }
}
