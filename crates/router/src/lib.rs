//! Virtual interconnection network routing.
//!
//! A [`Router`] moves an integer payload from a source rank to a destination
//! rank along the path an emulated topology would take, forwarding it hop by
//! hop through real point-to-point messages. The call is collective: every
//! rank of the world enters it and every rank leaves with the same
//! [`RouteOutcome`](vnet_types::RouteOutcome).
//!
//! # Protocol
//!
//! 1. The request owner checks the topology shape and the endpoints and
//!    broadcasts `{source, destination, verdict, payload length}`. A decline
//!    ends the call on every rank with that length as fallback value.
//! 2. The source broadcasts the payload length.
//! 3. Each hop `(a, b)` of the planned path sends a size message then a data
//!    message from `a` to `b`. Ranks off the path skip this phase.
//! 4. The destination makes the payload and path visible to every rank.
//!
//! Point-to-point messages use the tags in [`tags`].

mod config;
mod dissemination;
mod error;
mod phase;
mod relay;

pub use config::{Dissemination, RouterConfig};
pub use error::RouteError;
pub use phase::{RelayPhase, RelayState, Role, Verdict};
pub use relay::Router;

/// Message tags used on the world communicator.
pub mod tags {
    use vnet_network::Tag;

    /// Payload length ahead of a hop.
    pub const HOP_SIZE: Tag = 0;
    /// Payload data of a hop.
    pub const HOP_DATA: Tag = 1;
    /// Payload length ahead of a dimension exchange round.
    pub const EXCHANGE_SIZE: Tag = 2;
    /// Payload data of a dimension exchange round.
    pub const EXCHANGE_DATA: Tag = 3;
}
