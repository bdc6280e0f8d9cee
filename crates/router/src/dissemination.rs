//! Making the destination's result visible to every rank.

use crate::{tags, RouteError};
use tracing::trace;
use vnet_network::{wire, Communicator};
use vnet_types::{Path, Rank, RoutingResult};

/// Four broadcasts rooted at the destination: payload length, payload,
/// path length, path.
///
/// `local` is `Some` exactly on the destination.
pub(crate) fn chain<C: Communicator>(
    comm: &C,
    destination: Rank,
    expected_len: usize,
    local: Option<RoutingResult>,
) -> Result<RoutingResult, RouteError> {
    let (payload_len, payload, path_len, path) = match &local {
        Some(result) => (
            wire::encode_header(&[result.delivered_payload.len() as u64]),
            wire::encode_payload(&result.delivered_payload),
            wire::encode_header(&[result.path.len() as u64]),
            wire::encode_ranks(result.path.as_slice()),
        ),
        None => Default::default(),
    };

    let [payload_len] = wire::decode_header::<1>(&comm.broadcast(destination, payload_len)?)?;
    let payload = wire::decode_payload(&comm.broadcast(destination, payload)?)?;
    check_len(payload_len as usize, payload.len())?;
    if payload.len() != expected_len {
        return Err(RouteError::SizeMismatch {
            expected: expected_len,
            actual: payload.len(),
        });
    }

    let [path_len] = wire::decode_header::<1>(&comm.broadcast(destination, path_len)?)?;
    let ranks = wire::decode_ranks(&comm.broadcast(destination, path)?)?;
    check_len(path_len as usize, ranks.len())?;

    if let Some(result) = local {
        return Ok(result);
    }
    let path = Path::new(ranks).ok_or(RouteError::EmptyPath)?;
    Ok(RoutingResult {
        delivered_payload: payload,
        path,
    })
}

fn check_len(expected: usize, actual: usize) -> Result<(), RouteError> {
    if expected == actual {
        Ok(())
    } else {
        Err(RouteError::SizeMismatch { expected, actual })
    }
}

/// Recursive pairwise exchange over the hypercube dimensions.
///
/// Ranks are relabelled relative to the destination (`rel = rank ^
/// destination`). After round `b` every rank with `rel < 2^(b+1)` holds the
/// payload, so `dimensions` rounds cover the whole cube. Each round a holder
/// sends to its partner across bit `b`; the path is not sent since every rank
/// planned it already.
pub(crate) fn dimension_exchange<C: Communicator>(
    comm: &C,
    dimensions: u32,
    destination: Rank,
    expected_len: usize,
    local: Option<RoutingResult>,
    path: Path,
) -> Result<RoutingResult, RouteError> {
    let rank = comm.rank();
    let rel = rank ^ destination;
    let mut payload = local.map(|result| result.delivered_payload);

    for bit in 0..dimensions {
        let span = 1u32 << bit;
        let partner = rank ^ span;
        if rel < span {
            let data = payload.as_deref().ok_or(RouteError::EmptyPath)?;
            comm.send(
                partner,
                tags::EXCHANGE_SIZE,
                &wire::encode_header(&[data.len() as u64]),
            )?;
            comm.send(partner, tags::EXCHANGE_DATA, &wire::encode_payload(data))?;
            trace!(round = bit, from = rank, to = partner, "Exchange sent");
        } else if rel < span << 1 {
            let [size] =
                wire::decode_header::<1>(&comm.recv(partner, tags::EXCHANGE_SIZE)?)?;
            check_len(expected_len, size as usize)?;
            let data = wire::decode_payload(&comm.recv(partner, tags::EXCHANGE_DATA)?)?;
            check_len(expected_len, data.len())?;
            trace!(round = bit, from = partner, to = rank, "Exchange received");
            payload = Some(data);
        }
    }

    let delivered_payload = payload.ok_or(RouteError::EmptyPath)?;
    Ok(RoutingResult {
        delivered_payload,
        path,
    })
}
