//! Core types for the vnet routing layer.
//!
//! This crate provides the values that flow between the topology model,
//! the router and whatever drives them:
//!
//! - **Identifiers**: [`Rank`] and the explicit [`RoutingContext`]
//! - **Requests**: [`RoutingRequest`]
//! - **Results**: [`Path`], [`RoutingResult`], [`RouteOutcome`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained and does not depend on any other workspace
//! crates, making it the foundation layer.

mod context;
mod routing;

pub use context::{Rank, RoutingContext};
pub use routing::{DeclineReason, Path, RouteOutcome, RoutingRequest, RoutingResult};
