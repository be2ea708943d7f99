//! Aggregator role: gather and merge every worker's contribution.

use indexmap::IndexMap;

use crate::err::Error;
use crate::individuals::record::VariantCore;
use crate::individuals::transport::{Tag, Transport, TransportError};
use crate::individuals::worker::WorkerContribution;

/// Merged result over all workers, in worker-rank order.
///
/// `identifiers` and `counts` are concatenated across workers. The
/// per-worker record mappings stay separate: each worker covers a disjoint
/// line range, so entries for the same individual index are range-disjoint
/// partial result sets that downstream consumers combine per individual.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct MergedResult {
    pub identifiers: Vec<String>,
    pub counts: Vec<usize>,
    pub contributions: Vec<IndexMap<usize, Vec<VariantCore>>>,
}

/// Merge contributions in worker-rank order.
pub fn merge(contributions: impl IntoIterator<Item = WorkerContribution>) -> MergedResult {
    let mut merged = MergedResult::default();
    for contribution in contributions {
        merged.identifiers.extend(contribution.identifiers);
        merged.counts.extend(contribution.counts);
        merged.contributions.push(contribution.records);
    }
    merged
}

/// Receive the ordered (identifiers, counts, records) triple of one worker.
fn receive_contribution(
    transport: &impl Transport,
    rank: usize,
) -> Result<WorkerContribution, TransportError> {
    let identifiers = transport.recv(rank, Tag::Identifiers)?;
    let counts = transport.recv(rank, Tag::Counts)?;
    let records = transport.recv(rank, Tag::Records)?;
    Ok(WorkerContribution {
        identifiers,
        counts,
        records,
    })
}

/// Receive one contribution from every worker of the group, in increasing
/// rank order, and merge them.
///
/// A worker that disconnects before completing its triple fails the whole
/// aggregation; no partial result is returned.
pub fn gather(transport: &impl Transport) -> Result<MergedResult, Error> {
    let expected = transport.group_size() - 1;
    tracing::info!("aggregator: waiting for {} workers", expected);

    let mut contributions = Vec::with_capacity(expected);
    for rank in 0..expected {
        let contribution = receive_contribution(transport, rank).map_err(|error| match error {
            TransportError::Disconnected(_) => Error::IncompleteAggregation {
                rank,
                received: rank,
                expected,
            },
            other => Error::Transport(other),
        })?;
        tracing::info!(
            "aggregator: received {} individuals from worker {}",
            contribution.identifiers.len(),
            rank
        );
        contributions.push(contribution);
    }

    tracing::info!("aggregator: all {} contributions received", expected);
    Ok(merge(contributions))
}
