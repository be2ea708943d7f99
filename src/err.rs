//! Fatal error taxonomy shared by the worker and aggregator roles.
//!
//! Recoverable per-line conditions are not errors; they are modeled as
//! `SkipReason` in `individuals::record` and tallied by the worker.

use crate::individuals::transport::TransportError;

/// Conditions that terminate the owning unit's contribution entirely.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Input or header file missing.
    #[error("file not found: {0}")]
    NotFound(String),
    /// Problem reading an input file that does exist.
    #[error("problem reading {path}: {reason}")]
    Read { path: String, reason: anyhow::Error },
    /// Header has too few columns to address any individual.
    #[error("malformed header: expected at least 9 columns, got {0}")]
    MalformedHeader(usize),
    /// Send/receive failed at the transport boundary.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The aggregator did not receive a contribution from every worker.
    #[error(
        "incomplete aggregation: no contribution from worker rank {rank} \
         ({received} of {expected} received)"
    )]
    IncompleteAggregation {
        rank: usize,
        received: usize,
        expected: usize,
    },
}
