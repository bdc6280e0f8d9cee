//! End-to-end routing over an in-process world.
//!
//! Every test runs the collective on all ranks and asserts outside the rank
//! closures, so a failed assertion never leaves a peer blocked.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_test::traced_test;
use vnet_network::{Communicator, SingleRankComm};
use vnet_network_memory::{MemoryWorld, TrafficReport, WorldConfig};
use vnet_router::{Dissemination, RouteError, Router, RouterConfig};
use vnet_topology::{planner, TopologySpec};
use vnet_types::{DeclineReason, Path, Rank, RouteOutcome, RoutingContext, RoutingRequest};

fn route_all<F>(
    world_size: u32,
    router: &Router,
    request_for: F,
) -> (Vec<RouteOutcome>, TrafficReport)
where
    F: Fn(Rank) -> RoutingRequest + Sync,
{
    let world = MemoryWorld::new(WorldConfig::new(world_size)).unwrap();
    let outcomes = world
        .run(|comm| {
            let ctx = comm.context();
            router.route(&ctx, &comm, &request_for(ctx.rank))
        })
        .unwrap()
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    (outcomes, world.traffic().report())
}

fn chain_router(spec: &str) -> Router {
    Router::new(spec.parse().unwrap(), RouterConfig::default())
}

fn same_request(source: Rank, destination: Rank, payload: Vec<i32>) -> impl Fn(Rank) -> RoutingRequest + Sync {
    move |_| RoutingRequest::new(source, destination, payload.clone())
}

fn assert_uniform(outcomes: &[RouteOutcome]) -> &RouteOutcome {
    let first = &outcomes[0];
    for (rank, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome, first, "rank {rank} disagrees");
    }
    first
}

#[traced_test]
#[test]
fn test_ring_neighbor_across_wraparound() {
    let (outcomes, traffic) = route_all(4, &chain_router("ring"), same_request(0, 3, vec![7]));

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path.as_slice(), &[0, 3]);
    assert_eq!(result.delivered_payload, vec![7]);
    assert_eq!(traffic.point_to_point_messages, 2);
}

#[traced_test]
#[test]
fn test_torus_steps_column_before_row() {
    let (outcomes, traffic) = route_all(4, &chain_router("torus"), same_request(0, 3, vec![1, 2, 3]));

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path.as_slice(), &[0, 1, 3]);
    assert_eq!(result.delivered_payload, vec![1, 2, 3]);
    assert_eq!(traffic.point_to_point_messages, 4);
}

#[traced_test]
#[test]
fn test_hypercube_flips_bits_in_increasing_order() {
    let (outcomes, _) = route_all(8, &chain_router("hypercube"), same_request(0, 5, vec![-1, i32::MAX]));

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path.as_slice(), &[0, 1, 5]);
    assert_eq!(result.delivered_payload, vec![-1, i32::MAX]);
}

#[traced_test]
#[test]
fn test_hypercube_on_non_power_of_two_declines_everywhere() {
    let (outcomes, traffic) = route_all(6, &chain_router("hypercube"), same_request(0, 5, vec![4, 4]));

    assert_eq!(
        assert_uniform(&outcomes),
        &RouteOutcome::Declined {
            reason: DeclineReason::InvalidTopologyShape,
            requested_len: 2,
        }
    );
    assert_eq!(outcomes[3].fallback_value(), 2);
    assert_eq!(traffic.point_to_point_messages, 0);
    assert_eq!(traffic.broadcasts, 1);
}

#[traced_test]
#[test]
fn test_single_rank_ring_sends_nothing() {
    let (outcomes, traffic) = route_all(1, &chain_router("ring"), same_request(0, 0, vec![42]));

    let result = outcomes[0].result().unwrap();
    assert_eq!(result.path, Path::single(0));
    assert_eq!(result.delivered_payload, vec![42]);
    assert_eq!(traffic.point_to_point_messages, 0);
}

#[test]
fn test_out_of_range_destination_declines() {
    let (outcomes, traffic) = route_all(4, &chain_router("ring"), same_request(1, 9, vec![1]));

    assert_eq!(
        assert_uniform(&outcomes),
        &RouteOutcome::Declined {
            reason: DeclineReason::OutOfRangeRank,
            requested_len: 1,
        }
    );
    assert_eq!(traffic.point_to_point_messages, 0);
}

#[test]
fn test_shape_checked_before_range() {
    let (outcomes, _) = route_all(4, &chain_router("torus:3x3"), same_request(0, 17, vec![]));

    assert_eq!(
        assert_uniform(&outcomes),
        &RouteOutcome::Declined {
            reason: DeclineReason::InvalidTopologyShape,
            requested_len: 0,
        }
    );
}

#[test]
fn test_loopback_on_larger_world() {
    let (outcomes, traffic) = route_all(6, &chain_router("ring"), same_request(4, 4, vec![9, 9]));

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path, Path::single(4));
    assert_eq!(result.delivered_payload, vec![9, 9]);
    assert_eq!(traffic.point_to_point_messages, 0);
}

#[test]
fn test_empty_payload_still_walks_the_path() {
    let (outcomes, traffic) = route_all(5, &chain_router("ring"), same_request(0, 2, vec![]));

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path.as_slice(), &[0, 1, 2]);
    assert!(result.delivered_payload.is_empty());
    assert_eq!(traffic.point_to_point_messages, 4);
}

#[traced_test]
#[test]
fn test_owner_endpoints_and_source_payload_are_authoritative() {
    let router = Router::new(
        TopologySpec::Ring,
        RouterConfig::new().with_request_owner(2),
    );
    let (outcomes, _) = route_all(4, &router, |rank| {
        // Only rank 2's endpoints count; only rank 1's payload counts.
        let (source, destination) = if rank == 2 { (1, 3) } else { (0, 0) };
        RoutingRequest::new(source, destination, vec![rank as i32 * 100])
    });

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path.as_slice(), &[1, 2, 3]);
    assert_eq!(result.delivered_payload, vec![100]);
}

#[test]
fn test_decline_reports_the_owner_request_length_everywhere() {
    let (outcomes, _) = route_all(6, &chain_router("hypercube"), |rank| {
        let payload = if rank == 0 { vec![1, 2, 3] } else { vec![] };
        RoutingRequest::new(0, 5, payload)
    });

    assert_eq!(
        assert_uniform(&outcomes),
        &RouteOutcome::Declined {
            reason: DeclineReason::InvalidTopologyShape,
            requested_len: 3,
        }
    );
}

#[test]
fn test_hop_messages_follow_the_path() {
    let (outcomes, traffic) = route_all(16, &chain_router("torus"), same_request(5, 14, vec![3]));

    let result = assert_uniform(&outcomes).result().unwrap();
    assert_eq!(result.path.as_slice(), &[5, 6, 10, 14]);
    for (from, to) in result.path.hop_pairs() {
        assert_eq!(traffic.sent_by(from), 2, "rank {from} should send one hop");
        assert_eq!(traffic.received_by(to), 2, "rank {to} should receive one hop");
    }
    assert_eq!(traffic.sent_by(14), 0);
    assert_eq!(traffic.received_by(5), 0);
    // Meta, size and the four result broadcasts.
    assert_eq!(traffic.broadcasts, 6);
}

#[traced_test]
#[test]
fn test_dimension_exchange_matches_chain() {
    let chain = chain_router("hypercube");
    let exchange = Router::new(
        TopologySpec::Hypercube,
        RouterConfig::new().with_dissemination(Dissemination::DimensionExchange),
    );

    for (source, destination) in [(0, 5), (7, 0), (3, 3), (6, 1)] {
        let payload = vec![source as i32, destination as i32, -7];
        let (by_chain, _) = route_all(8, &chain, same_request(source, destination, payload.clone()));
        let (by_exchange, traffic) =
            route_all(8, &exchange, same_request(source, destination, payload));

        assert_eq!(assert_uniform(&by_exchange), &by_chain[0]);

        let hops = by_chain[0].result().unwrap().path.hops() as u64;
        if hops > 0 {
            // Rounds of 1, 2 and 4 senders, two messages each.
            assert_eq!(traffic.point_to_point_messages, 2 * hops + 14);
            assert_eq!(traffic.broadcasts, 2);
        } else {
            assert_eq!(traffic.point_to_point_messages, 0);
        }
    }
}

#[test]
fn test_dimension_exchange_falls_back_off_hypercube() {
    let router = Router::new(
        TopologySpec::Ring,
        RouterConfig::new().with_dissemination(Dissemination::DimensionExchange),
    );
    let (outcomes, traffic) = route_all(5, &router, same_request(0, 2, vec![1]));

    assert_eq!(assert_uniform(&outcomes).result().unwrap().path.as_slice(), &[0, 1, 2]);
    assert_eq!(traffic.point_to_point_messages, 4);
    assert_eq!(traffic.broadcasts, 6);
}

#[test]
fn test_seeded_random_requests_deliver_on_every_topology() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);

    for (spec, world_size) in [
        (TopologySpec::Ring, 7),
        (TopologySpec::Torus, 12),
        (TopologySpec::TorusShape { rows: 3, cols: 2 }, 6),
        (TopologySpec::Hypercube, 16),
    ] {
        let topology = spec.resolve(world_size).unwrap();
        let router = Router::new(spec, RouterConfig::default());

        for _ in 0..8 {
            let source = rng.gen_range(0..world_size);
            let destination = rng.gen_range(0..world_size);
            let len = rng.gen_range(0..6);
            let payload: Vec<i32> = (0..len).map(|_| rng.gen()).collect();

            let (outcomes, traffic) =
                route_all(world_size, &router, same_request(source, destination, payload.clone()));

            let expected_path = planner::route(&topology, source, destination).unwrap();
            let result = assert_uniform(&outcomes).result().unwrap();
            assert_eq!(result.delivered_payload, payload, "{spec} {source}->{destination}");
            assert_eq!(result.path, expected_path);
            assert_eq!(
                traffic.point_to_point_messages,
                2 * expected_path.hops() as u64
            );
        }
    }
}

#[test]
fn test_consecutive_routes_on_one_world() {
    let router = chain_router("torus");
    let world = MemoryWorld::new(WorldConfig::new(9)).unwrap();

    let outcomes = world
        .run(|comm| -> Result<Vec<RouteOutcome>, RouteError> {
            let ctx = comm.context();
            let mut outcomes = Vec::new();
            for (source, destination) in [(0, 8), (8, 0), (4, 4), (2, 20)] {
                let request = RoutingRequest::new(source, destination, vec![source as i32]);
                outcomes.push(router.route(&ctx, &comm, &request)?);
            }
            Ok(outcomes)
        })
        .unwrap();

    let first = outcomes[0].as_ref().unwrap();
    for outcome in &outcomes {
        assert_eq!(outcome.as_ref().unwrap(), first);
    }
    assert_eq!(first[0].result().unwrap().delivered_payload, vec![0]);
    assert_eq!(first[1].result().unwrap().delivered_payload, vec![8]);
    assert_eq!(first[2].result().unwrap().path, Path::single(4));
    assert!(!first[3].is_delivered());
}

#[test]
fn test_single_rank_communicator() {
    let comm = SingleRankComm::new();
    let router = chain_router("hypercube");
    let ctx = RoutingContext::new(0, 1);

    // One rank is not a hypercube.
    let outcome = router
        .route(&ctx, &comm, &RoutingRequest::new(0, 0, vec![5]))
        .unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::Declined {
            reason: DeclineReason::InvalidTopologyShape,
            requested_len: 1,
        }
    );

    let outcome = chain_router("ring")
        .route(&ctx, &comm, &RoutingRequest::new(0, 0, vec![5]))
        .unwrap();
    assert_eq!(outcome.into_result().unwrap().delivered_payload, vec![5]);
}

#[test]
fn test_local_argument_errors_precede_communication() {
    let comm = SingleRankComm::new();
    let request = RoutingRequest::new(0, 0, vec![]);

    let err = chain_router("ring")
        .route(&RoutingContext::new(0, 2), &comm, &request)
        .unwrap_err();
    assert!(matches!(err, RouteError::ContextMismatch { ctx_world: 2, comm_world: 1, .. }));

    let router = Router::new(TopologySpec::Ring, RouterConfig::new().with_request_owner(1));
    let err = router
        .route(&RoutingContext::new(comm.rank(), 1), &comm, &request)
        .unwrap_err();
    assert!(matches!(err, RouteError::InvalidOwner { owner: 1, world_size: 1 }));
}
