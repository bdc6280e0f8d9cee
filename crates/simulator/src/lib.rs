//! vnet Simulator
//!
//! Runs seeded routing trials over an in-process [`MemoryWorld`] and checks
//! every outcome:
//!
//! - all ranks agree on the outcome
//! - delivered payloads match the input and paths match the planner
//! - invalid shapes and out-of-range endpoints decline with the requested
//!   length as fallback value
//!
//! # Example
//!
//! ```ignore
//! use vnet_simulator::{Simulator, SimulatorConfig};
//! use vnet_topology::TopologySpec;
//!
//! let config = SimulatorConfig::new(TopologySpec::Hypercube, 8)
//!     .with_trials(20)
//!     .with_seed(42);
//!
//! let report = Simulator::new(config)?.run()?;
//! assert!(report.all_verified());
//! report.print_summary();
//! ```
//!
//! [`MemoryWorld`]: vnet_network_memory::MemoryWorld

mod config;
mod error;
mod report;
mod runner;

pub use config::SimulatorConfig;
pub use error::SimulatorError;
pub use report::{SimulationReport, TrialReport};
pub use runner::Simulator;
