//! The collective relay state machine.

use crate::dissemination;
use crate::phase::{RelayPhase, RelayState, Verdict};
use crate::{tags, RouteError, RouterConfig};
use tracing::{debug, trace, warn};
use vnet_network::{wire, Communicator};
use vnet_topology::{planner, Topology, TopologySpec};
use vnet_types::{Path, Rank, RouteOutcome, RoutingContext, RoutingRequest, RoutingResult};

/// Routes payloads over an emulated topology.
///
/// A `Router` is plain configuration; it holds no per-call state and can be
/// shared by reference across routing operations. Every rank of a world must
/// use an identical router and call [`route`](Self::route) the same number of
/// times, in the same order.
#[derive(Debug, Clone)]
pub struct Router {
    spec: TopologySpec,
    config: RouterConfig,
}

impl Router {
    pub fn new(spec: TopologySpec, config: RouterConfig) -> Self {
        Self { spec, config }
    }

    pub fn spec(&self) -> TopologySpec {
        self.spec
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Run one collective routing operation.
    ///
    /// Must be called by every rank. Returns the same [`RouteOutcome`] on
    /// every rank: either the delivered payload and its path, or a uniform
    /// decline when the request owner finds the world size or the endpoints
    /// invalid.
    ///
    /// Argument errors that are local to one rank (a context that disagrees
    /// with the communicator, an out-of-world owner) are reported before any
    /// communication. Since such a rank then skips the collectives, the
    /// other ranks of the world block.
    pub fn route<C: Communicator>(
        &self,
        ctx: &RoutingContext,
        comm: &C,
        request: &RoutingRequest,
    ) -> Result<RouteOutcome, RouteError> {
        if ctx.rank != comm.rank() || ctx.world_size != comm.world_size() {
            return Err(RouteError::ContextMismatch {
                ctx_rank: ctx.rank,
                ctx_world: ctx.world_size,
                comm_rank: comm.rank(),
                comm_world: comm.world_size(),
            });
        }
        if !ctx.contains(self.config.request_owner) {
            return Err(RouteError::InvalidOwner {
                owner: self.config.request_owner,
                world_size: ctx.world_size,
            });
        }

        let mut run = RelayRun::new(self, ctx, comm, request);
        let mut phase = RelayPhase::BroadcastMeta;
        while phase != RelayPhase::Done {
            trace!(rank = ctx.rank, %phase, "Entering phase");
            phase = match phase {
                RelayPhase::BroadcastMeta => run.broadcast_meta()?,
                RelayPhase::BroadcastSize => run.broadcast_size()?,
                RelayPhase::Relay => run.relay()?,
                RelayPhase::BroadcastResult => run.broadcast_result()?,
                RelayPhase::Done => RelayPhase::Done,
            };
        }
        run.finish()
    }

    /// The request owner's verdict on `(source, destination)`.
    ///
    /// Shape problems take precedence over range problems.
    fn judge(&self, world_size: u32, source: Rank, destination: Rank) -> Verdict {
        let topology = match self.spec.resolve(world_size) {
            Ok(topology) => topology,
            Err(e) => return Verdict::Declined(decline_reason(&e)),
        };
        match topology
            .check_rank(source)
            .and_then(|_| topology.check_rank(destination))
        {
            Ok(()) => Verdict::Accepted,
            Err(e) => Verdict::Declined(decline_reason(&e)),
        }
    }
}

fn decline_reason(e: &vnet_topology::TopologyError) -> vnet_types::DeclineReason {
    e.decline_reason()
        .unwrap_or(vnet_types::DeclineReason::InvalidTopologyShape)
}

/// State threaded through the phases of one call on one rank.
struct RelayRun<'a, C> {
    router: &'a Router,
    ctx: &'a RoutingContext,
    comm: &'a C,
    request: &'a RoutingRequest,

    source: Rank,
    destination: Rank,
    payload_len: usize,
    topology: Option<Topology>,
    path: Option<Path>,
    state: Option<RelayState>,
    outcome: Option<RouteOutcome>,
}

impl<'a, C: Communicator> RelayRun<'a, C> {
    fn new(
        router: &'a Router,
        ctx: &'a RoutingContext,
        comm: &'a C,
        request: &'a RoutingRequest,
    ) -> Self {
        Self {
            router,
            ctx,
            comm,
            request,
            source: request.source,
            destination: request.destination,
            payload_len: 0,
            topology: None,
            path: None,
            state: None,
            outcome: None,
        }
    }

    fn rank(&self) -> Rank {
        self.ctx.rank
    }

    fn path(&self) -> Result<&Path, RouteError> {
        self.path.as_ref().ok_or(RouteError::EmptyPath)
    }

    fn state_mut(&mut self) -> Result<&mut RelayState, RouteError> {
        self.state.as_mut().ok_or(RouteError::EmptyPath)
    }

    fn broadcast_meta(&mut self) -> Result<RelayPhase, RouteError> {
        let owner = self.router.config.request_owner;
        let header = if self.rank() == owner {
            let verdict = self.router.judge(
                self.ctx.world_size,
                self.request.source,
                self.request.destination,
            );
            wire::encode_header(&[
                u64::from(self.request.source),
                u64::from(self.request.destination),
                verdict.code(),
                self.request.payload.len() as u64,
            ])
        } else {
            Vec::new()
        };

        let header = self.comm.broadcast(owner, header)?;
        let [source, destination, code, requested_len] = wire::decode_header::<4>(&header)?;
        let verdict = Verdict::from_code(code).ok_or(RouteError::UnknownVerdict(code))?;

        if let Verdict::Declined(reason) = verdict {
            if self.rank() == owner {
                warn!(
                    spec = %self.router.spec,
                    world_size = self.ctx.world_size,
                    source,
                    destination,
                    %reason,
                    "Routing declined"
                );
            }
            self.outcome = Some(RouteOutcome::Declined {
                reason,
                requested_len: requested_len as usize,
            });
            return Ok(RelayPhase::Done);
        }

        // Accepted ranks fit in the world, which fits in a u32.
        self.source = source as Rank;
        self.destination = destination as Rank;

        let topology = self.router.spec.resolve(self.ctx.world_size)?;
        let path = planner::route(&topology, self.source, self.destination)?;
        let state = RelayState::for_rank(&path, self.rank());
        debug!(
            rank = self.rank(),
            %topology,
            %path,
            role = ?state.role,
            "Path planned"
        );

        self.topology = Some(topology);
        self.path = Some(path);
        self.state = Some(state);
        Ok(RelayPhase::BroadcastSize)
    }

    fn broadcast_size(&mut self) -> Result<RelayPhase, RouteError> {
        let source = self.source;
        let is_source = self.state_mut()?.is_source();
        let header = if is_source {
            wire::encode_header(&[self.request.payload.len() as u64])
        } else {
            Vec::new()
        };
        let [len] = wire::decode_header::<1>(&self.comm.broadcast(source, header)?)?;
        self.payload_len = len as usize;

        let payload_len = self.payload_len;
        let seed = if is_source {
            self.request.payload.clone()
        } else {
            vec![0; payload_len]
        };
        self.state_mut()?.received_payload = seed;
        Ok(RelayPhase::Relay)
    }

    fn relay(&mut self) -> Result<RelayPhase, RouteError> {
        let rank = self.rank();
        let destination = self.destination;
        let expected = self.payload_len;
        let hops: Vec<(Rank, Rank)> = self.path()?.hop_pairs().collect();

        if !self.state_mut()?.on_path {
            return Ok(RelayPhase::BroadcastResult);
        }

        for (from, to) in hops {
            if rank == from {
                let state = self.state_mut()?;
                let len_header = wire::encode_header(&[state.received_payload.len() as u64]);
                let data = wire::encode_payload(&state.received_payload);
                self.comm.send(to, tags::HOP_SIZE, &len_header)?;
                self.comm.send(to, tags::HOP_DATA, &data)?;
                trace!(from, to, len = expected, "Forwarded hop");
                if rank != destination {
                    self.state_mut()?.received_payload.clear();
                }
            } else if rank == to {
                let [size] = wire::decode_header::<1>(&self.comm.recv(from, tags::HOP_SIZE)?)?;
                if size as usize != expected {
                    return Err(RouteError::SizeMismatch {
                        expected,
                        actual: size as usize,
                    });
                }
                let payload = wire::decode_payload(&self.comm.recv(from, tags::HOP_DATA)?)?;
                if payload.len() != expected {
                    return Err(RouteError::SizeMismatch {
                        expected,
                        actual: payload.len(),
                    });
                }
                trace!(from, to, len = expected, "Received hop");
                self.state_mut()?.received_payload = payload;
            }
        }
        Ok(RelayPhase::BroadcastResult)
    }

    fn broadcast_result(&mut self) -> Result<RelayPhase, RouteError> {
        let path = self.path()?.clone();
        let topology = self.topology;
        let expected = self.payload_len;
        let dissemination = self.router.config.dissemination;
        let state = self.state.take().ok_or(RouteError::EmptyPath)?;

        let local = state.is_destination().then(|| RoutingResult {
            delivered_payload: state.received_payload,
            path: path.clone(),
        });

        let result = match topology {
            Some(Topology::Hypercube { dimensions })
                if dissemination == crate::Dissemination::DimensionExchange
                    && path.hops() > 0 =>
            {
                dissemination::dimension_exchange(
                    self.comm,
                    dimensions,
                    self.destination,
                    expected,
                    local,
                    path,
                )?
            }
            _ => dissemination::chain(self.comm, self.destination, expected, local)?,
        };

        debug!(
            rank = self.rank(),
            path = %result.path,
            len = result.delivered_payload.len(),
            "Result visible"
        );
        self.outcome = Some(RouteOutcome::Delivered(result));
        Ok(RelayPhase::Done)
    }

    fn finish(self) -> Result<RouteOutcome, RouteError> {
        self.outcome.ok_or(RouteError::EmptyPath)
    }
}
