//! In-process SPMD world with blocking message passing.

use crate::traffic::TrafficAnalyzer;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use thiserror::Error;
use tracing::{debug, debug_span, trace};
use vnet_network::{CommError, Communicator, Tag};
use vnet_types::{Rank, RoutingContext};

/// Errors from building or running a world.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("world size must be at least 1")]
    EmptyWorld,

    #[error("rank {0} panicked")]
    RankPanicked(Rank),
}

/// Configuration for a [`MemoryWorld`].
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Number of ranks (one thread each).
    pub world_size: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { world_size: 4 }
    }
}

impl WorldConfig {
    /// Create a configuration for `world_size` ranks.
    pub fn new(world_size: u32) -> Self {
        Self { world_size }
    }
}

/// Which logical channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    /// Point-to-point traffic on a user tag.
    Direct(Tag),
    /// The n-th collective call of the world.
    Collective(u64),
}

#[derive(Debug)]
struct Envelope {
    from: Rank,
    channel: Channel,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Mailbox {
    /// Messages that arrived before anyone asked for them, in arrival order.
    unmatched: VecDeque<Envelope>,
    /// Number of collective calls this rank has entered.
    collective_seq: u64,
}

/// One rank's endpoint in a [`MemoryWorld`].
///
/// Each rank has a single inbound channel. Receives match on
/// `(sender, channel)`; anything else that arrives first is parked in the
/// mailbox in arrival order, which keeps each `(sender, receiver, tag)`
/// stream FIFO.
pub struct MemoryComm {
    rank: Rank,
    world_size: u32,
    inbox: Receiver<Envelope>,
    peers: Arc<Vec<Sender<Envelope>>>,
    barrier: Arc<Barrier>,
    traffic: Arc<TrafficAnalyzer>,
    mailbox: Mutex<Mailbox>,
}

impl std::fmt::Debug for MemoryComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryComm")
            .field("rank", &self.rank)
            .field("world_size", &self.world_size)
            .field("unmatched", &self.mailbox.lock().unmatched.len())
            .finish()
    }
}

impl MemoryComm {
    /// The routing context for this endpoint.
    pub fn context(&self) -> RoutingContext {
        RoutingContext::new(self.rank, self.world_size)
    }

    fn deliver(&self, to: Rank, channel: Channel, data: Vec<u8>) -> Result<(), CommError> {
        self.peers[to as usize]
            .send(Envelope {
                from: self.rank,
                channel,
                data,
            })
            .map_err(|_| CommError::Disconnected(to))
    }

    /// Block until a message from `from` on `channel` is available.
    fn take(&self, from: Rank, channel: Channel) -> Result<Vec<u8>, CommError> {
        let mut mailbox = self.mailbox.lock();
        if let Some(pos) = mailbox
            .unmatched
            .iter()
            .position(|env| env.from == from && env.channel == channel)
        {
            if let Some(env) = mailbox.unmatched.remove(pos) {
                return Ok(env.data);
            }
        }

        loop {
            let env = self
                .inbox
                .recv()
                .map_err(|_| CommError::Disconnected(from))?;
            if env.from == from && env.channel == channel {
                return Ok(env.data);
            }
            trace!(
                rank = self.rank,
                from = env.from,
                channel = ?env.channel,
                "Parking unmatched message"
            );
            mailbox.unmatched.push_back(env);
        }
    }

    fn next_collective(&self) -> u64 {
        let mut mailbox = self.mailbox.lock();
        mailbox.collective_seq += 1;
        mailbox.collective_seq
    }
}

impl Communicator for MemoryComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn send(&self, to: Rank, tag: Tag, data: &[u8]) -> Result<(), CommError> {
        self.check_peer(to)?;
        trace!(from = self.rank, to, tag, bytes = data.len(), "send");
        self.deliver(to, Channel::Direct(tag), data.to_vec())?;
        self.traffic
            .record_point_to_point(self.rank, to, tag, data.len());
        Ok(())
    }

    fn recv(&self, from: Rank, tag: Tag) -> Result<Vec<u8>, CommError> {
        self.check_peer(from)?;
        let data = self.take(from, Channel::Direct(tag))?;
        trace!(to = self.rank, from, tag, bytes = data.len(), "recv");
        Ok(data)
    }

    fn broadcast(&self, root: Rank, data: Vec<u8>) -> Result<Vec<u8>, CommError> {
        self.check_peer(root)?;
        let seq = self.next_collective();

        if self.rank == root {
            for to in (0..self.world_size).filter(|&r| r != root) {
                self.deliver(to, Channel::Collective(seq), data.clone())?;
            }
            self.traffic.record_broadcast(root, data.len());
            trace!(root, seq, bytes = data.len(), "broadcast sent");
            Ok(data)
        } else {
            self.take(root, Channel::Collective(seq))
        }
    }

    fn barrier(&self) -> Result<(), CommError> {
        // Barriers consume a collective sequence number too.
        self.next_collective();
        if self.barrier.wait().is_leader() {
            self.traffic.record_barrier();
        }
        Ok(())
    }
}

/// A set of ranks that talk to each other through in-memory channels.
///
/// The world itself holds no channels: every call to
/// [`communicators`](Self::communicators) or [`run`](Self::run) wires a fresh
/// set, so one world can host many independent routing operations. Traffic
/// counters accumulate across runs until [`TrafficAnalyzer::reset`].
#[derive(Debug)]
pub struct MemoryWorld {
    config: WorldConfig,
    traffic: Arc<TrafficAnalyzer>,
}

impl MemoryWorld {
    /// Create a world. Fails for an empty world.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        if config.world_size == 0 {
            return Err(WorldError::EmptyWorld);
        }
        Ok(Self {
            config,
            traffic: Arc::new(TrafficAnalyzer::new()),
        })
    }

    pub fn world_size(&self) -> u32 {
        self.config.world_size
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Traffic counters shared by every communicator of this world.
    pub fn traffic(&self) -> &Arc<TrafficAnalyzer> {
        &self.traffic
    }

    /// Wire up one communicator per rank, indexed by rank.
    pub fn communicators(&self) -> Vec<MemoryComm> {
        let n = self.config.world_size;
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..n).map(|_| unbounded()).unzip();
        let peers = Arc::new(senders);
        let barrier = Arc::new(Barrier::new(n as usize));

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| MemoryComm {
                rank: rank as Rank,
                world_size: n,
                inbox,
                peers: Arc::clone(&peers),
                barrier: Arc::clone(&barrier),
                traffic: Arc::clone(&self.traffic),
                mailbox: Mutex::new(Mailbox::default()),
            })
            .collect()
    }

    /// Run `f` once per rank, each on its own thread, and collect the return
    /// values in rank order.
    ///
    /// This is the SPMD entry point: every rank runs the same closure with
    /// its own communicator. If `f` deadlocks (for instance because one rank
    /// skipped a collective) this call never returns.
    pub fn run<T, F>(&self, f: F) -> Result<Vec<T>, WorldError>
    where
        F: Fn(MemoryComm) -> T + Sync,
        T: Send,
    {
        let comms = self.communicators();
        debug!(world_size = self.config.world_size, "Starting ranks");

        std::thread::scope(|scope| {
            let f = &f;
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let _span = debug_span!("rank", rank = comm.rank()).entered();
                        f(comm)
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| WorldError::RankPanicked(rank as Rank))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn world(n: u32) -> MemoryWorld {
        MemoryWorld::new(WorldConfig::new(n)).unwrap()
    }

    #[test]
    fn test_empty_world_rejected() {
        assert_eq!(
            MemoryWorld::new(WorldConfig::new(0)).unwrap_err(),
            WorldError::EmptyWorld
        );
    }

    #[test]
    fn test_communicators_know_their_rank() {
        let comms = world(3).communicators();
        let ctxs: Vec<_> = comms.iter().map(|c| c.context()).collect();
        assert_eq!(
            ctxs,
            vec![
                RoutingContext::new(0, 3),
                RoutingContext::new(1, 3),
                RoutingContext::new(2, 3)
            ]
        );
    }

    #[test]
    fn test_tag_matching_out_of_order() {
        let comms = world(2).communicators();
        comms[0].send(1, 1, b"data").unwrap();
        comms[0].send(1, 0, b"size").unwrap();

        // Asking for tag 0 first parks the tag-1 message.
        assert_eq!(comms[1].recv(0, 0).unwrap(), b"size");
        assert_eq!(comms[1].recv(0, 1).unwrap(), b"data");
    }

    #[test]
    fn test_channel_fifo_per_tag() {
        let comms = world(3).communicators();
        for i in 0..5u8 {
            comms[0].send(2, 7, &[i]).unwrap();
            comms[1].send(2, 7, &[100 + i]).unwrap();
        }
        for i in 0..5u8 {
            assert_eq!(comms[2].recv(1, 7).unwrap(), vec![100 + i]);
        }
        for i in 0..5u8 {
            assert_eq!(comms[2].recv(0, 7).unwrap(), vec![i]);
        }
    }

    #[test]
    fn test_send_out_of_bounds() {
        let comms = world(2).communicators();
        assert!(matches!(
            comms[0].send(2, 0, b"x"),
            Err(CommError::RankOutOfBounds {
                rank: 2,
                world_size: 2
            })
        ));
    }

    #[traced_test]
    #[test]
    fn test_broadcast_reaches_every_rank() {
        let w = world(5);
        let results = w
            .run(|comm| {
                let data = if comm.rank() == 2 { vec![9, 8, 7] } else { vec![] };
                comm.broadcast(2, data)
            })
            .unwrap();

        for result in results {
            assert_eq!(result.unwrap(), vec![9, 8, 7]);
        }
        let report = w.traffic().report();
        assert_eq!(report.broadcasts, 1);
        assert_eq!(report.point_to_point_messages, 0);
    }

    #[test]
    fn test_consecutive_broadcasts_do_not_mix() {
        let w = world(4);
        let results = w
            .run(|comm| -> Result<(Vec<u8>, Vec<u8>), CommError> {
                let first = comm.broadcast(0, vec![comm.rank() as u8])?;
                let second = comm.broadcast(3, vec![comm.rank() as u8 + 10])?;
                Ok((first, second))
            })
            .unwrap();

        for result in results {
            assert_eq!(result.unwrap(), (vec![0], vec![13]));
        }
    }

    #[test]
    fn test_point_to_point_and_barrier() {
        let w = world(4);
        let results = w
            .run(|comm| -> Result<Option<Vec<u8>>, CommError> {
                let out = match comm.rank() {
                    0 => {
                        comm.send(3, 4, b"hello")?;
                        None
                    }
                    3 => Some(comm.recv(0, 4)?),
                    _ => None,
                };
                comm.barrier()?;
                Ok(out)
            })
            .unwrap();

        assert_eq!(results[3].as_ref().unwrap(), &Some(b"hello".to_vec()));
        assert_eq!(results[1].as_ref().unwrap(), &None);

        let report = w.traffic().report();
        assert_eq!(report.point_to_point_messages, 1);
        assert_eq!(report.barriers, 1);
        assert_eq!(report.sent_by(0), 1);
        assert_eq!(report.received_by(3), 1);
    }

    #[test]
    fn test_world_is_reusable() {
        let w = world(2);
        for round in 0..3u8 {
            let results = w
                .run(|comm| comm.broadcast(1, vec![round]))
                .unwrap();
            assert!(results.into_iter().all(|r| r.unwrap() == vec![round]));
        }
        assert_eq!(w.traffic().broadcasts(), 3);
    }
}
