//! Deterministic hop-path planning.
//!
//! Paths are a pure function of `(topology, source, destination)`, so every
//! rank computes the same path without communicating.
//!
//! - **Ring**: shorter rotational direction; ties go to `+1`.
//! - **Torus**: all column steps first, then all row steps (an L-shape).
//!   Each axis takes the shorter wraparound direction, ties go to `+1`.
//! - **Hypercube**: flip the differing bits in increasing bit order
//!   (dimension-ordered routing), giving a Hamming-distance path.

use crate::model::{torus_coords, torus_rank};
use crate::{Topology, TopologyError};
use vnet_types::{Path, Rank};

/// Plan the hop path from `source` to `destination`.
///
/// Fails with [`TopologyError::OutOfRangeRank`] if either rank is outside the
/// topology. `source == destination` yields the single-rank path.
pub fn route(topology: &Topology, source: Rank, destination: Rank) -> Result<Path, TopologyError> {
    topology.check_rank(source)?;
    topology.check_rank(destination)?;

    if source == destination {
        return Ok(Path::single(source));
    }

    let path = match *topology {
        Topology::Ring { size } => ring_path(size, source, destination),
        Topology::Torus { rows, cols } => torus_path(rows, cols, source, destination),
        Topology::Hypercube { .. } => hypercube_path(source, destination),
    };

    Ok(path)
}

/// Steps and direction along one wraparound axis of length `len`.
///
/// Returns `(steps, +1 | -1)`; on a tie the positive direction wins.
fn axis_walk(len: u32, from: u32, to: u32) -> (u32, i64) {
    let forward = (to + len - from) % len;
    let backward = len - forward;
    if forward <= backward {
        (forward, 1)
    } else {
        (backward, -1)
    }
}

fn ring_path(size: u32, source: Rank, destination: Rank) -> Path {
    let (steps, dir) = axis_walk(size, source, destination);
    let mut path = Path::single(source);
    let mut current = i64::from(source);
    let size = i64::from(size);
    for _ in 0..steps {
        current = (current + dir).rem_euclid(size);
        path.push(current as Rank);
    }
    path
}

fn torus_path(rows: u32, cols: u32, source: Rank, destination: Rank) -> Path {
    let (src_row, src_col) = torus_coords(cols, source);
    let (dst_row, dst_col) = torus_coords(cols, destination);

    let (col_steps, col_dir) = axis_walk(cols, src_col, dst_col);
    let (row_steps, row_dir) = axis_walk(rows, src_row, dst_row);

    let mut path = Path::single(source);

    let mut row = i64::from(src_row);
    let mut col = i64::from(src_col);

    // Columns first, then rows. Downstream consumers rely on this exact shape.
    for _ in 0..col_steps {
        col += col_dir;
        path.push(torus_rank(rows, cols, row, col));
    }
    for _ in 0..row_steps {
        row += row_dir;
        path.push(torus_rank(rows, cols, row, col));
    }
    path
}

fn hypercube_path(source: Rank, destination: Rank) -> Path {
    let mut diff = source ^ destination;
    let mut path = Path::single(source);
    let mut current = source;
    while diff != 0 {
        let bit = diff.trailing_zeros();
        current ^= 1 << bit;
        diff &= diff - 1;
        path.push(current);
    }
    path
}

/// Check that `path` is a well-formed route from `source` to `destination`.
///
/// Every rank must be in range and every consecutive pair must be
/// topology-neighbors.
pub fn validate_path(
    topology: &Topology,
    path: &Path,
    source: Rank,
    destination: Rank,
) -> Result<(), TopologyError> {
    for &rank in path.as_slice() {
        topology.check_rank(rank)?;
    }
    if path.source() != source || path.destination() != destination {
        return Err(TopologyError::WrongEndpoints {
            expected_source: source,
            expected_destination: destination,
            actual_source: path.source(),
            actual_destination: path.destination(),
        });
    }
    if let Some((from, to)) = path
        .hop_pairs()
        .find(|&(from, to)| !topology.is_neighbor(from, to))
    {
        return Err(TopologyError::BrokenPath { from, to });
    }
    Ok(())
}
