//! Seeded routing trials over a [`MemoryWorld`].

use crate::{SimulationReport, SimulatorConfig, SimulatorError, TrialReport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use vnet_network_memory::{MemoryWorld, TrafficReport, WorldConfig};
use vnet_router::Router;
use vnet_topology::{planner, TopologyError};
use vnet_types::{DeclineReason, Rank, RouteOutcome, RoutingRequest};

/// Drives routing operations over an in-process world and checks every
/// result against the planner.
///
/// Each trial draws its endpoints (unless fixed) and payload from a
/// `ChaCha8Rng` seeded from the config, so a seed reproduces a run.
pub struct Simulator {
    config: SimulatorConfig,
    world: MemoryWorld,
    router: Router,
    rng: ChaCha8Rng,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        let world = MemoryWorld::new(WorldConfig::new(config.world_size))?;
        let owner = config.router.request_owner;
        if owner >= config.world_size {
            return Err(SimulatorError::InvalidOwner {
                owner,
                world_size: config.world_size,
            });
        }
        let router = Router::new(config.topology, config.router.clone());
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            world,
            router,
            rng,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Traffic accumulated over every trial run so far.
    pub fn traffic_report(&self) -> TrafficReport {
        self.world.traffic().report()
    }

    /// Run all configured trials.
    pub fn run(&mut self) -> Result<SimulationReport, SimulatorError> {
        let topology = match self.config.topology.resolve(self.config.world_size) {
            Ok(topology) => topology.to_string(),
            Err(e) => {
                warn!(error = %e, "Topology does not fit the world; every trial will decline");
                self.config.topology.to_string()
            }
        };
        info!(
            %topology,
            world_size = self.config.world_size,
            trials = self.config.trials,
            seed = self.config.seed,
            "Starting simulation"
        );

        let mut trials = Vec::with_capacity(self.config.trials);
        for trial in 0..self.config.trials {
            trials.push(self.run_trial(trial)?);
        }

        let report = SimulationReport {
            topology,
            world_size: self.config.world_size,
            seed: self.config.seed,
            dissemination: self.config.router.dissemination,
            trials,
            traffic: self.traffic_report(),
        };
        info!(
            delivered = report.delivered(),
            declined = report.declined(),
            failures = report.failures().count(),
            "Simulation complete"
        );
        Ok(report)
    }

    /// Run one collective routing operation and verify it.
    pub fn run_trial(&mut self, trial: usize) -> Result<TrialReport, SimulatorError> {
        let request = self.next_request();
        let before = self.world.traffic().point_to_point_messages();

        let outcomes = self.world.run(|comm| {
            let ctx = comm.context();
            self.router.route(&ctx, &comm, &request)
        })?;
        let outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(rank, outcome)| {
                outcome.map_err(|source| SimulatorError::Route {
                    trial,
                    rank: rank as Rank,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let point_to_point_messages = self.world.traffic().point_to_point_messages() - before;
        let failure = self.verify(&request, &outcomes, point_to_point_messages);
        if let Some(failure) = &failure {
            warn!(trial, %failure, "Trial failed verification");
        }

        let outcome = outcomes
            .into_iter()
            .next()
            .ok_or(SimulatorError::World(vnet_network_memory::WorldError::EmptyWorld))?;
        debug!(
            trial,
            source = request.source,
            destination = request.destination,
            delivered = outcome.is_delivered(),
            point_to_point_messages,
            "Trial complete"
        );

        Ok(TrialReport {
            trial,
            source: request.source,
            destination: request.destination,
            payload_len: request.payload.len(),
            outcome,
            point_to_point_messages,
            failure,
        })
    }

    fn next_request(&mut self) -> RoutingRequest {
        let world_size = self.config.world_size;
        let source = match self.config.source {
            Some(rank) => rank,
            None => self.rng.gen_range(0..world_size),
        };
        let destination = match self.config.destination {
            Some(rank) => rank,
            None => self.rng.gen_range(0..world_size),
        };
        let payload = (0..self.config.payload_len).map(|_| self.rng.gen()).collect();
        RoutingRequest::new(source, destination, payload)
    }

    /// Check the outcomes of every rank. Returns a description of the first
    /// problem found.
    fn verify(
        &self,
        request: &RoutingRequest,
        outcomes: &[RouteOutcome],
        point_to_point_messages: u64,
    ) -> Option<String> {
        let first = outcomes.first()?;
        if let Some(rank) = outcomes.iter().position(|o| o != first) {
            return Some(format!("rank {rank} disagrees with rank 0"));
        }

        match (self.expected_decline(request), first) {
            (Some(expected), RouteOutcome::Declined { reason, requested_len }) => {
                if *reason != expected {
                    return Some(format!("declined as {reason}, expected {expected}"));
                }
                if *requested_len != request.payload.len() {
                    return Some(format!(
                        "fallback value {requested_len}, expected {}",
                        request.payload.len()
                    ));
                }
                None
            }
            (Some(expected), RouteOutcome::Delivered(_)) => {
                Some(format!("delivered a request that should decline as {expected}"))
            }
            (None, RouteOutcome::Declined { reason, .. }) => {
                Some(format!("declined a valid request: {reason}"))
            }
            (None, RouteOutcome::Delivered(result)) => {
                if result.delivered_payload != request.payload {
                    return Some("delivered payload differs from the input".to_string());
                }
                let topology = self.config.topology.resolve(self.config.world_size).ok()?;
                if let Err(e) =
                    planner::validate_path(&topology, &result.path, request.source, request.destination)
                {
                    return Some(format!("invalid path {}: {e}", result.path));
                }
                match planner::route(&topology, request.source, request.destination) {
                    Ok(planned) if planned == result.path => {}
                    Ok(planned) => {
                        return Some(format!("took {} instead of {planned}", result.path))
                    }
                    Err(e) => return Some(e.to_string()),
                }
                // Chain dissemination uses broadcasts only, so every
                // point-to-point message belongs to a hop.
                if self.config.router.dissemination == vnet_router::Dissemination::Chain
                    && point_to_point_messages != 2 * result.path.hops() as u64
                {
                    return Some(format!(
                        "{point_to_point_messages} point-to-point messages for {} hops",
                        result.path.hops()
                    ));
                }
                None
            }
        }
    }

    fn expected_decline(&self, request: &RoutingRequest) -> Option<DeclineReason> {
        let check = self
            .config
            .topology
            .resolve(self.config.world_size)
            .and_then(|topology| {
                topology.check_rank(request.source)?;
                topology.check_rank(request.destination)
            });
        check.err().as_ref().and_then(TopologyError::decline_reason)
    }
}
