//! Message accounting for the in-process world.
//!
//! Every communicator in a [`MemoryWorld`](crate::MemoryWorld) shares one
//! [`TrafficAnalyzer`]. It counts point-to-point messages per tag and per
//! rank, and collective calls per root, so callers can assert things like
//! "a loopback route sends no point-to-point messages".
//!
//! # Example
//!
//! ```ignore
//! let world = MemoryWorld::new(WorldConfig::new(4))?;
//! world.run(|comm| router.route(&ctx, &comm, &request))?;
//!
//! let report = world.traffic().report();
//! assert_eq!(report.point_to_point_messages, 2);
//! report.print_summary();
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use vnet_network::Tag;
use vnet_types::Rank;

/// Shared traffic counters for one world.
///
/// Totals are atomics so recording from many rank threads does not contend
/// on a lock; breakdowns sit behind a `RwLock`.
#[derive(Debug, Default)]
pub struct TrafficAnalyzer {
    by_tag: RwLock<HashMap<Tag, TagStats>>,
    by_rank: RwLock<HashMap<Rank, RankTrafficStats>>,

    point_to_point_messages: AtomicU64,
    point_to_point_bytes: AtomicU64,
    broadcasts: AtomicU64,
    broadcast_bytes: AtomicU64,
    barriers: AtomicU64,
}

impl TrafficAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one point-to-point message.
    pub fn record_point_to_point(&self, from: Rank, to: Rank, tag: Tag, bytes: usize) {
        let bytes = bytes as u64;
        self.point_to_point_messages.fetch_add(1, Ordering::Relaxed);
        self.point_to_point_bytes.fetch_add(bytes, Ordering::Relaxed);

        self.by_tag.write().entry(tag).or_default().record(bytes);

        let mut by_rank = self.by_rank.write();
        by_rank.entry(from).or_default().record_sent(bytes);
        by_rank.entry(to).or_default().record_received(bytes);
    }

    /// Record one broadcast, counted once at its root.
    pub fn record_broadcast(&self, root: Rank, bytes: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.broadcast_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.by_rank.write().entry(root).or_default().broadcasts_rooted += 1;
    }

    /// Record one completed barrier, counted once for the whole world.
    pub fn record_barrier(&self) {
        self.barriers.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-to-point messages recorded so far.
    pub fn point_to_point_messages(&self) -> u64 {
        self.point_to_point_messages.load(Ordering::Relaxed)
    }

    /// Broadcasts recorded so far.
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    /// Clear every counter.
    pub fn reset(&self) {
        self.by_tag.write().clear();
        self.by_rank.write().clear();
        self.point_to_point_messages.store(0, Ordering::Relaxed);
        self.point_to_point_bytes.store(0, Ordering::Relaxed);
        self.broadcasts.store(0, Ordering::Relaxed);
        self.broadcast_bytes.store(0, Ordering::Relaxed);
        self.barriers.store(0, Ordering::Relaxed);
    }

    /// Snapshot the counters.
    pub fn report(&self) -> TrafficReport {
        let by_tag = self
            .by_tag
            .read()
            .iter()
            .map(|(&tag, stats)| (tag, stats.clone()))
            .collect();
        let by_rank = self
            .by_rank
            .read()
            .iter()
            .map(|(&rank, stats)| (rank, stats.clone()))
            .collect();

        TrafficReport {
            point_to_point_messages: self.point_to_point_messages.load(Ordering::Relaxed),
            point_to_point_bytes: self.point_to_point_bytes.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            broadcast_bytes: self.broadcast_bytes.load(Ordering::Relaxed),
            barriers: self.barriers.load(Ordering::Relaxed),
            by_tag,
            by_rank,
        }
    }
}

/// Statistics for one point-to-point tag.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TagStats {
    pub count: u64,
    pub bytes: u64,
    pub min_size: u64,
    pub max_size: u64,
}

impl TagStats {
    fn record(&mut self, size: u64) {
        self.count += 1;
        self.bytes += size;
        if self.count == 1 {
            self.min_size = size;
            self.max_size = size;
        } else {
            self.min_size = self.min_size.min(size);
            self.max_size = self.max_size.max(size);
        }
    }
}

/// Per-rank traffic statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RankTrafficStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Broadcasts this rank was the root of.
    pub broadcasts_rooted: u64,
}

impl RankTrafficStats {
    fn record_sent(&mut self, size: u64) {
        self.messages_sent += 1;
        self.bytes_sent += size;
    }

    fn record_received(&mut self, size: u64) {
        self.messages_received += 1;
        self.bytes_received += size;
    }
}

/// Snapshot of a [`TrafficAnalyzer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficReport {
    pub point_to_point_messages: u64,
    pub point_to_point_bytes: u64,
    pub broadcasts: u64,
    pub broadcast_bytes: u64,
    pub barriers: u64,
    pub by_tag: BTreeMap<Tag, TagStats>,
    pub by_rank: BTreeMap<Rank, RankTrafficStats>,
}

impl TrafficReport {
    /// Point-to-point messages sent by `rank`.
    pub fn sent_by(&self, rank: Rank) -> u64 {
        self.by_rank.get(&rank).map_or(0, |s| s.messages_sent)
    }

    /// Point-to-point messages received by `rank`.
    pub fn received_by(&self, rank: Rank) -> u64 {
        self.by_rank.get(&rank).map_or(0, |s| s.messages_received)
    }

    /// Print a summary of the traffic report.
    pub fn print_summary(&self) {
        println!();
        println!("====================== TRAFFIC SUMMARY =======================");
        println!(
            "Point-to-point:   {} messages, {} bytes",
            self.point_to_point_messages, self.point_to_point_bytes
        );
        println!(
            "Broadcasts:       {} calls, {} bytes",
            self.broadcasts, self.broadcast_bytes
        );
        println!("Barriers:         {}", self.barriers);

        if !self.by_tag.is_empty() {
            println!();
            println!("{:<6} {:>10} {:>12} {:>8} {:>8}", "Tag", "Count", "Bytes", "Min", "Max");
            for (tag, stats) in &self.by_tag {
                println!(
                    "{:<6} {:>10} {:>12} {:>8} {:>8}",
                    tag, stats.count, stats.bytes, stats.min_size, stats.max_size
                );
            }
        }

        let busy: Vec<_> = self
            .by_rank
            .iter()
            .filter(|(_, s)| s.messages_sent + s.messages_received > 0)
            .collect();
        if !busy.is_empty() {
            println!();
            println!("{:<6} {:>8} {:>8} {:>12} {:>12}", "Rank", "Sent", "Recv", "Bytes out", "Bytes in");
            for (rank, stats) in busy {
                println!(
                    "{:<6} {:>8} {:>8} {:>12} {:>12}",
                    rank,
                    stats.messages_sent,
                    stats.messages_received,
                    stats.bytes_sent,
                    stats.bytes_received
                );
            }
        }
        println!("==============================================================");
    }
}
