//! Point-to-point transport between the members of a static process group.
//!
//! Captures the communication contract of the pipeline: reliable
//! send/receive between a worker and the aggregator, ordered per
//! `(source, tag)` pair, with one tag per payload kind of a contribution.
//! [`channel_group`] provides the in-process implementation; an external
//! orchestration runtime may substitute its own.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{de::DeserializeOwned, Serialize};

/// Role of a group member, decided once from its static rank and never
/// re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Role {
    /// Filters one line range and sends one contribution.
    #[strum(serialize = "worker")]
    Worker,
    /// Receives and merges all workers' contributions.
    #[strum(serialize = "aggregator")]
    Aggregator,
}

impl Role {
    /// The highest-ranked member aggregates; all others work.
    pub fn of(rank: usize, group_size: usize) -> Self {
        if rank + 1 == group_size {
            Role::Aggregator
        } else {
            Role::Worker
        }
    }
}

/// Message tags distinguishing the three payloads of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Tag {
    #[strum(serialize = "identifiers")]
    Identifiers,
    #[strum(serialize = "counts")]
    Counts,
    #[strum(serialize = "records")]
    Records,
}

/// Errors at the transport boundary; all of them are fatal to the unit
/// that observes them.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("no such rank in group: {0}")]
    UnknownRank(usize),
    #[error("peer {0} disconnected before sending")]
    Disconnected(usize),
    #[error("message from rank {rank} carries tag {actual}, expected {expected}")]
    TagMismatch {
        rank: usize,
        expected: Tag,
        actual: Tag,
    },
    #[error("could not encode payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not decode payload from rank {rank}: {reason}")]
    Decode {
        rank: usize,
        #[source]
        reason: serde_json::Error,
    },
}

/// Point-to-point send/receive between group members.
///
/// Implementations must deliver messages reliably and in order per
/// `(source, tag)` pair for the life of the group.
pub trait Transport {
    /// Rank of this member within the group.
    fn rank(&self) -> usize;

    /// Total number of group members, including the aggregator.
    fn group_size(&self) -> usize;

    /// Send one payload to `dest`.
    fn send<T: Serialize>(&self, payload: &T, dest: usize, tag: Tag) -> Result<(), TransportError>;

    /// Receive the next payload from `source`, which must carry `tag`.
    fn recv<T: DeserializeOwned>(&self, source: usize, tag: Tag) -> Result<T, TransportError>;
}

/// One serialized message in flight.
#[derive(Debug)]
struct Message {
    tag: Tag,
    payload: Vec<u8>,
}

/// In-process transport endpoint of one group member.
///
/// Holds one outgoing channel per destination and one incoming channel per
/// source. Dropping the endpoint disconnects all of its outgoing channels,
/// which peers observe as [`TransportError::Disconnected`].
#[derive(Debug)]
pub struct ChannelEndpoint {
    rank: usize,
    senders: Vec<Sender<Message>>,
    receivers: Vec<Receiver<Message>>,
}

/// Build a fully-connected in-process group of `group_size` endpoints,
/// indexed by rank.
pub fn channel_group(group_size: usize) -> Vec<ChannelEndpoint> {
    // matrix[src][dst] is the channel from src to dst
    let matrix: Vec<Vec<(Sender<Message>, Receiver<Message>)>> = (0..group_size)
        .map(|_| (0..group_size).map(|_| unbounded()).collect())
        .collect();

    (0..group_size)
        .map(|rank| ChannelEndpoint {
            rank,
            senders: (0..group_size).map(|dst| matrix[rank][dst].0.clone()).collect(),
            receivers: (0..group_size).map(|src| matrix[src][rank].1.clone()).collect(),
        })
        .collect()
}

impl Transport for ChannelEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn group_size(&self) -> usize {
        self.senders.len()
    }

    fn send<T: Serialize>(&self, payload: &T, dest: usize, tag: Tag) -> Result<(), TransportError> {
        let sender = self
            .senders
            .get(dest)
            .ok_or(TransportError::UnknownRank(dest))?;
        let payload = serde_json::to_vec(payload).map_err(TransportError::Encode)?;
        sender
            .send(Message { tag, payload })
            .map_err(|_| TransportError::Disconnected(dest))
    }

    fn recv<T: DeserializeOwned>(&self, source: usize, tag: Tag) -> Result<T, TransportError> {
        let receiver = self
            .receivers
            .get(source)
            .ok_or(TransportError::UnknownRank(source))?;
        let message = receiver
            .recv()
            .map_err(|_| TransportError::Disconnected(source))?;
        if message.tag != tag {
            return Err(TransportError::TagMismatch {
                rank: source,
                expected: tag,
                actual: message.tag,
            });
        }
        serde_json::from_slice(&message.payload)
            .map_err(|reason| TransportError::Decode { rank: source, reason })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{channel_group, Role, Tag, Transport, TransportError};

    #[rstest]
    #[case(0, 2, Role::Worker)]
    #[case(1, 2, Role::Aggregator)]
    #[case(2, 4, Role::Worker)]
    #[case(3, 4, Role::Aggregator)]
    fn role_from_rank(#[case] rank: usize, #[case] size: usize, #[case] expected: Role) {
        assert_eq!(Role::of(rank, size), expected);
    }

    #[test]
    fn send_and_recv_roundtrip() -> Result<(), anyhow::Error> {
        let mut group = channel_group(2);
        let receiver = group.pop().expect("group has two endpoints");
        let sender = group.pop().expect("group has two endpoints");

        let handle = std::thread::spawn(move || {
            sender.send(&vec!["chr1.ind1".to_string()], 1, Tag::Identifiers)
        });

        let payload: Vec<String> = receiver.recv(0, Tag::Identifiers)?;
        assert_eq!(payload, vec!["chr1.ind1".to_string()]);
        handle.join().expect("sender thread")?;

        Ok(())
    }

    #[test]
    fn recv_preserves_per_source_order() -> Result<(), anyhow::Error> {
        let mut group = channel_group(2);
        let receiver = group.pop().expect("group has two endpoints");
        let sender = group.pop().expect("group has two endpoints");

        sender.send(&vec!["id".to_string()], 1, Tag::Identifiers)?;
        sender.send(&vec![1usize, 2], 1, Tag::Counts)?;
        sender.send(&"records", 1, Tag::Records)?;

        let _: Vec<String> = receiver.recv(0, Tag::Identifiers)?;
        let counts: Vec<usize> = receiver.recv(0, Tag::Counts)?;
        let _: String = receiver.recv(0, Tag::Records)?;
        assert_eq!(counts, vec![1, 2]);

        Ok(())
    }

    #[test]
    fn recv_rejects_unexpected_tag() -> Result<(), anyhow::Error> {
        let mut group = channel_group(2);
        let receiver = group.pop().expect("group has two endpoints");
        let sender = group.pop().expect("group has two endpoints");

        sender.send(&vec![1usize], 1, Tag::Counts)?;

        let result: Result<Vec<String>, _> = receiver.recv(0, Tag::Identifiers);
        assert!(matches!(
            result,
            Err(TransportError::TagMismatch {
                rank: 0,
                expected: Tag::Identifiers,
                actual: Tag::Counts,
            })
        ));

        Ok(())
    }

    #[test]
    fn recv_from_dropped_peer_fails() {
        let mut group = channel_group(2);
        let receiver = group.pop().expect("group has two endpoints");
        drop(group); // worker endpoint goes away without sending

        let result: Result<Vec<String>, _> = receiver.recv(0, Tag::Identifiers);
        assert!(matches!(result, Err(TransportError::Disconnected(0))));
    }

    #[test]
    fn unknown_rank_is_rejected() {
        let group = channel_group(2);

        assert!(matches!(
            group[0].send(&1usize, 7, Tag::Counts),
            Err(TransportError::UnknownRank(7))
        ));
    }
}
