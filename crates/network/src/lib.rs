//! Transport seam for the vnet routing layer.
//!
//! This crate contains transport-independent pieces:
//!
//! - [`traits`]: the [`Communicator`] trait (tagged point-to-point, broadcast,
//!   barrier) and a trivial single-rank implementation
//! - [`wire`]: little-endian encode/decode for payloads, paths and headers
//!
//! No threads and no runtime. Backends (e.g. `vnet-network-memory`) provide
//! the actual delivery.

pub mod traits;
pub mod wire;

pub use traits::{CommError, Communicator, SingleRankComm, Tag};
pub use wire::WireError;
