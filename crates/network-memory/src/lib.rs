//! In-process transport for the vnet routing layer.
//!
//! Provides [`MemoryWorld`], which spawns one thread per rank and hands each
//! a [`MemoryComm`] implementing [`vnet_network::Communicator`] over
//! `crossbeam` channels. Delivery is reliable and ordered; there is no
//! latency, loss or partitioning.
//!
//! [`TrafficAnalyzer`] counts point-to-point messages and collective calls
//! per rank and per tag.

mod traffic;
mod world;

pub use traffic::{RankTrafficStats, TagStats, TrafficAnalyzer, TrafficReport};
pub use world::{MemoryComm, MemoryWorld, WorldConfig, WorldError};
