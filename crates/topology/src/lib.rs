//! Virtual topology model and path planner.
//!
//! This crate is pure math with no communication:
//!
//! - [`model`]: rank ↔ coordinate mapping and neighbor sets for ring, 2-D
//!   torus and binary hypercube topologies
//! - [`planner`]: deterministic minimum-hop (ring, hypercube) and L-shaped
//!   (torus) hop paths between two ranks
//!
//! Every rank can evaluate these functions independently and is guaranteed
//! to reach the same answer, which is what lets the router skip a
//! broadcast of the planned path.

pub mod error;
pub mod model;
pub mod planner;

pub use error::TopologyError;
pub use model::{Coordinate, Topology, TopologySpec};
pub use planner::{route, validate_path};
