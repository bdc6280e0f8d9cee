//! Rank ↔ coordinate math for the emulated topologies.
//!
//! # Topologies
//!
//! ```text
//! Ring(4)          Torus(2x3)             Hypercube(3)
//!
//!  0 ── 1          0 ── 1 ── 2 ─┐         rank = b2 b1 b0
//!  │    │          │    │    │  │         neighbors differ in
//!  3 ── 2          3 ── 4 ── 5 ─┘         exactly one bit
//!                  (columns and rows wrap)
//! ```
//!
//! Ranks are laid out row-major on the torus and as plain binary numbers on
//! the hypercube.

use crate::TopologyError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use vnet_types::Rank;

/// A validated topology for a concrete world size.
///
/// Construction checks the shape invariants, so every method on an existing
/// `Topology` can assume `rows * cols == world_size` (torus) and
/// `2^dimensions == world_size` (hypercube).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    /// Bidirectional ring of `size` ranks.
    Ring { size: u32 },
    /// 2-D torus mesh with wraparound on both axes.
    Torus { rows: u32, cols: u32 },
    /// Binary hypercube of `2^dimensions` ranks.
    Hypercube { dimensions: u32 },
}

/// Topology-specific representation of a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coordinate {
    Ring { index: u32 },
    Torus { row: u32, col: u32 },
    /// Bit-vector: bit `b` of `bits` is the coordinate along dimension `b`.
    Hypercube { bits: u32, dimensions: u32 },
}

impl Coordinate {
    /// The hypercube coordinate along dimension `bit`, least significant first.
    pub fn bit(&self, bit: u32) -> Option<bool> {
        match *self {
            Coordinate::Hypercube { bits, dimensions } if bit < dimensions => {
                Some(bits & (1 << bit) != 0)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Coordinate::Ring { index } => write!(f, "{index}"),
            Coordinate::Torus { row, col } => write!(f, "({row},{col})"),
            Coordinate::Hypercube { bits, dimensions } => {
                write!(f, "{:0width$b}", bits, width = dimensions as usize)
            }
        }
    }
}

/// Row-major rank of a torus cell, wrapping both indices into range.
///
/// Accepts negative and oversized indices so callers can step off an edge
/// and land on the opposite side.
pub fn torus_rank(rows: u32, cols: u32, row: i64, col: i64) -> Rank {
    let rows = i64::from(rows);
    let cols = i64::from(cols);
    let row = ((row % rows) + rows) % rows;
    let col = ((col % cols) + cols) % cols;
    (row * cols + col) as Rank
}

/// `(row, col)` of a torus rank.
pub fn torus_coords(cols: u32, rank: Rank) -> (u32, u32) {
    (rank / cols, rank % cols)
}

/// Largest divisor of `world_size` that does not exceed its square root.
///
/// Returns 1 for primes (and for 1).
pub fn auto_torus_rows(world_size: u32) -> u32 {
    let n = u64::from(world_size);
    let mut root = (n as f64).sqrt() as u64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    (1..=root.max(1))
        .rev()
        .find(|d| n % d == 0)
        .unwrap_or(1) as u32
}

impl Topology {
    /// A ring of `world_size` ranks.
    pub fn ring(world_size: u32) -> Result<Self, TopologyError> {
        if world_size == 0 {
            return Err(TopologyError::InvalidTopologyShape {
                spec: "ring".to_string(),
                world_size,
                reason: "world size must be at least 1",
            });
        }
        Ok(Topology::Ring { size: world_size })
    }

    /// A torus with an explicit shape that must cover `world_size` exactly.
    pub fn torus(rows: u32, cols: u32, world_size: u32) -> Result<Self, TopologyError> {
        let spec = || format!("torus:{rows}x{cols}");
        if rows == 0 || cols == 0 {
            return Err(TopologyError::InvalidTopologyShape {
                spec: spec(),
                world_size,
                reason: "rows and columns must be positive",
            });
        }
        if u64::from(rows) * u64::from(cols) != u64::from(world_size) {
            return Err(TopologyError::InvalidTopologyShape {
                spec: spec(),
                world_size,
                reason: "rows * cols must equal the world size",
            });
        }
        Ok(Topology::Torus { rows, cols })
    }

    /// A torus whose shape is derived from the world size.
    ///
    /// `rows` is the largest divisor not above `sqrt(world_size)`, so a prime
    /// world size degenerates to a single-row torus (a ring).
    pub fn torus_auto(world_size: u32) -> Result<Self, TopologyError> {
        if world_size == 0 {
            return Err(TopologyError::InvalidTopologyShape {
                spec: "torus".to_string(),
                world_size,
                reason: "world size must be at least 1",
            });
        }
        let rows = auto_torus_rows(world_size);
        Self::torus(rows, world_size / rows, world_size)
    }

    /// A hypercube over `world_size` ranks; requires a power of two above 1.
    pub fn hypercube(world_size: u32) -> Result<Self, TopologyError> {
        if world_size < 2 || !world_size.is_power_of_two() {
            return Err(TopologyError::InvalidTopologyShape {
                spec: "hypercube".to_string(),
                world_size,
                reason: "world size must be a power of two greater than 1",
            });
        }
        Ok(Topology::Hypercube {
            dimensions: world_size.trailing_zeros(),
        })
    }

    /// Short lowercase name of the topology family.
    pub fn name(&self) -> &'static str {
        match self {
            Topology::Ring { .. } => "ring",
            Topology::Torus { .. } => "torus",
            Topology::Hypercube { .. } => "hypercube",
        }
    }

    /// Number of ranks the topology spans.
    pub fn world_size(&self) -> u32 {
        match *self {
            Topology::Ring { size } => size,
            Topology::Torus { rows, cols } => rows * cols,
            Topology::Hypercube { dimensions } => 1 << dimensions,
        }
    }

    pub fn contains(&self, rank: Rank) -> bool {
        rank < self.world_size()
    }

    /// Fail with [`TopologyError::OutOfRangeRank`] unless `rank` is in range.
    pub fn check_rank(&self, rank: Rank) -> Result<(), TopologyError> {
        if self.contains(rank) {
            Ok(())
        } else {
            Err(TopologyError::OutOfRangeRank {
                rank,
                world_size: self.world_size(),
            })
        }
    }

    /// Coordinate of `rank` in this topology.
    pub fn coordinate(&self, rank: Rank) -> Result<Coordinate, TopologyError> {
        self.check_rank(rank)?;
        Ok(match *self {
            Topology::Ring { .. } => Coordinate::Ring { index: rank },
            Topology::Torus { cols, .. } => {
                let (row, col) = torus_coords(cols, rank);
                Coordinate::Torus { row, col }
            }
            Topology::Hypercube { dimensions } => Coordinate::Hypercube {
                bits: rank,
                dimensions,
            },
        })
    }

    /// Rank at `coordinate`, or `None` if the coordinate belongs to another
    /// topology family or lies outside this one.
    pub fn rank_of(&self, coordinate: Coordinate) -> Option<Rank> {
        let rank = match (*self, coordinate) {
            (Topology::Ring { .. }, Coordinate::Ring { index }) => index,
            (Topology::Torus { rows, cols }, Coordinate::Torus { row, col }) => {
                if row >= rows || col >= cols {
                    return None;
                }
                row * cols + col
            }
            (
                Topology::Hypercube { dimensions },
                Coordinate::Hypercube {
                    bits,
                    dimensions: coord_dims,
                },
            ) => {
                if coord_dims != dimensions {
                    return None;
                }
                bits
            }
            _ => return None,
        };
        self.contains(rank).then_some(rank)
    }

    /// Topology-neighbors of `rank`, deduplicated, in a fixed order.
    ///
    /// - Ring: `[r-1, r+1]` (mod n). A single-rank ring is its own neighbor.
    /// - Torus: up, down, left, right with wraparound; self-links of a
    ///   length-1 axis are dropped.
    /// - Hypercube: one neighbor per dimension, lowest bit first.
    pub fn neighbors(&self, rank: Rank) -> Result<Vec<Rank>, TopologyError> {
        self.check_rank(rank)?;
        let mut out: Vec<Rank> = Vec::with_capacity(4);
        let mut push = |r: Rank| {
            if !out.contains(&r) {
                out.push(r);
            }
        };
        match *self {
            Topology::Ring { size } => {
                push((rank + size - 1) % size);
                push((rank + 1) % size);
            }
            Topology::Torus { rows, cols } => {
                let (row, col) = torus_coords(cols, rank);
                let (row, col) = (i64::from(row), i64::from(col));
                for (dr, dc) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let next = torus_rank(rows, cols, row + dr, col + dc);
                    if next != rank {
                        push(next);
                    }
                }
            }
            Topology::Hypercube { dimensions } => {
                for bit in 0..dimensions {
                    push(rank ^ (1 << bit));
                }
            }
        }
        Ok(out)
    }

    /// Whether `a` and `b` are directly linked.
    pub fn is_neighbor(&self, a: Rank, b: Rank) -> bool {
        self.neighbors(a)
            .map(|neighbors| neighbors.contains(&b))
            .unwrap_or(false)
    }

    /// Upper bound on the hop count of a planned path.
    pub fn diameter(&self) -> u32 {
        match *self {
            Topology::Ring { size } => size / 2,
            Topology::Torus { rows, cols } => rows / 2 + cols / 2,
            Topology::Hypercube { dimensions } => dimensions,
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Topology::Ring { size } => write!(f, "ring({size})"),
            Topology::Torus { rows, cols } => write!(f, "torus({rows}x{cols})"),
            Topology::Hypercube { dimensions } => write!(f, "hypercube({dimensions})"),
        }
    }
}

/// A requested topology, before a world size is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Ring,
    /// Torus shaped automatically from the world size.
    Torus,
    /// Torus with an explicit shape.
    TorusShape { rows: u32, cols: u32 },
    Hypercube,
}

impl TopologySpec {
    /// Build the concrete topology for `world_size`.
    ///
    /// Fails with [`TopologyError::InvalidTopologyShape`] when the world size
    /// does not fit the requested shape.
    pub fn resolve(&self, world_size: u32) -> Result<Topology, TopologyError> {
        match *self {
            TopologySpec::Ring => Topology::ring(world_size),
            TopologySpec::Torus => Topology::torus_auto(world_size),
            TopologySpec::TorusShape { rows, cols } => Topology::torus(rows, cols, world_size),
            TopologySpec::Hypercube => Topology::hypercube(world_size),
        }
    }
}

impl fmt::Display for TopologySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TopologySpec::Ring => write!(f, "ring"),
            TopologySpec::Torus => write!(f, "torus"),
            TopologySpec::TorusShape { rows, cols } => write!(f, "torus:{rows}x{cols}"),
            TopologySpec::Hypercube => write!(f, "hypercube"),
        }
    }
}

impl FromStr for TopologySpec {
    type Err = TopologyError;

    /// Parses `ring`, `torus`, `torus:RxC`, `hypercube` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "ring" => return Ok(TopologySpec::Ring),
            "torus" | "mesh" => return Ok(TopologySpec::Torus),
            "hypercube" | "cube" => return Ok(TopologySpec::Hypercube),
            _ => {}
        }
        let unknown = || TopologyError::UnknownTopology(s.to_string());
        let shape = lower.strip_prefix("torus:").ok_or_else(unknown)?;
        let (rows, cols) = shape.split_once('x').ok_or_else(unknown)?;
        let rows = rows.trim().parse().map_err(|_| unknown())?;
        let cols = cols.trim().parse().map_err(|_| unknown())?;
        Ok(TopologySpec::TorusShape { rows, cols })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_neighbors() {
        let ring = Topology::ring(5).unwrap();
        assert_eq!(ring.neighbors(0).unwrap(), vec![4, 1]);
        assert_eq!(ring.neighbors(4).unwrap(), vec![3, 0]);
        assert!(ring.is_neighbor(0, 4));
        assert!(!ring.is_neighbor(0, 2));
    }

    #[test]
    fn test_small_rings_deduplicate() {
        assert_eq!(Topology::ring(1).unwrap().neighbors(0).unwrap(), vec![0]);
        assert_eq!(Topology::ring(2).unwrap().neighbors(0).unwrap(), vec![1]);
    }

    #[test]
    fn test_ring_rejects_empty_world() {
        assert!(matches!(
            Topology::ring(0),
            Err(TopologyError::InvalidTopologyShape { world_size: 0, .. })
        ));
    }

    #[test]
    fn test_torus_wraparound() {
        assert_eq!(torus_rank(2, 3, -1, 0), 3);
        assert_eq!(torus_rank(2, 3, 0, -1), 2);
        assert_eq!(torus_rank(2, 3, 2, 3), 0);
        assert_eq!(torus_rank(2, 3, 1, 2), 5);
        assert_eq!(torus_rank(2, 3, -5, 7), 4);
    }

    #[test]
    fn test_torus_coordinate_roundtrip() {
        let torus = Topology::torus(3, 4, 12).unwrap();
        for rank in 0..12 {
            let coord = torus.coordinate(rank).unwrap();
            assert_eq!(torus.rank_of(coord), Some(rank));
        }
        assert_eq!(
            torus.coordinate(7).unwrap(),
            Coordinate::Torus { row: 1, col: 3 }
        );
        assert_eq!(torus.rank_of(Coordinate::Torus { row: 3, col: 0 }), None);
    }

    #[test]
    fn test_auto_torus_shape() {
        assert_eq!(Topology::torus_auto(4).unwrap(), Topology::Torus { rows: 2, cols: 2 });
        assert_eq!(Topology::torus_auto(6).unwrap(), Topology::Torus { rows: 2, cols: 3 });
        assert_eq!(Topology::torus_auto(12).unwrap(), Topology::Torus { rows: 3, cols: 4 });
        assert_eq!(Topology::torus_auto(16).unwrap(), Topology::Torus { rows: 4, cols: 4 });
        assert_eq!(Topology::torus_auto(7).unwrap(), Topology::Torus { rows: 1, cols: 7 });
        assert_eq!(Topology::torus_auto(1).unwrap(), Topology::Torus { rows: 1, cols: 1 });
        assert!(Topology::torus_auto(0).is_err());
    }

    #[test]
    fn test_torus_shape_mismatch() {
        assert!(Topology::torus(2, 3, 7).is_err());
        assert!(Topology::torus(0, 3, 0).is_err());
    }

    #[test]
    fn test_torus_neighbors() {
        let torus = Topology::torus(3, 3, 9).unwrap();
        // Center cell.
        assert_eq!(torus.neighbors(4).unwrap(), vec![1, 7, 3, 5]);
        // Corner wraps on both axes.
        assert_eq!(torus.neighbors(0).unwrap(), vec![6, 3, 2, 1]);
    }

    #[test]
    fn test_degenerate_torus_neighbors() {
        // A single row has no vertical links.
        let line = Topology::torus(1, 4, 4).unwrap();
        assert_eq!(line.neighbors(0).unwrap(), vec![3, 1]);
        // 2x2: up and down coincide.
        let square = Topology::torus(2, 2, 4).unwrap();
        assert_eq!(square.neighbors(0).unwrap(), vec![2, 1]);
    }

    #[test]
    fn test_hypercube_requires_power_of_two() {
        assert!(Topology::hypercube(6).is_err());
        assert!(Topology::hypercube(1).is_err());
        assert!(Topology::hypercube(0).is_err());
        assert_eq!(
            Topology::hypercube(8).unwrap(),
            Topology::Hypercube { dimensions: 3 }
        );
    }

    #[test]
    fn test_hypercube_neighbors_and_coordinates() {
        let cube = Topology::hypercube(8).unwrap();
        assert_eq!(cube.neighbors(5).unwrap(), vec![4, 7, 1]);
        let coord = cube.coordinate(5).unwrap();
        assert_eq!(coord.to_string(), "101");
        assert_eq!(coord.bit(0), Some(true));
        assert_eq!(coord.bit(1), Some(false));
        assert_eq!(coord.bit(3), None);
        assert_eq!(cube.rank_of(coord), Some(5));
    }

    #[test]
    fn test_out_of_range_rank() {
        let cube = Topology::hypercube(4).unwrap();
        assert_eq!(
            cube.neighbors(4),
            Err(TopologyError::OutOfRangeRank {
                rank: 4,
                world_size: 4
            })
        );
        assert!(!cube.is_neighbor(4, 0));
    }

    #[test]
    fn test_mismatched_coordinate_family() {
        let ring = Topology::ring(4).unwrap();
        assert_eq!(ring.rank_of(Coordinate::Torus { row: 0, col: 0 }), None);
        assert_eq!(ring.rank_of(Coordinate::Ring { index: 4 }), None);
    }

    #[test]
    fn test_spec_parsing() {
        assert_eq!("ring".parse::<TopologySpec>().unwrap(), TopologySpec::Ring);
        assert_eq!("Torus".parse::<TopologySpec>().unwrap(), TopologySpec::Torus);
        assert_eq!(
            "torus:2x3".parse::<TopologySpec>().unwrap(),
            TopologySpec::TorusShape { rows: 2, cols: 3 }
        );
        assert_eq!(
            "hypercube".parse::<TopologySpec>().unwrap(),
            TopologySpec::Hypercube
        );
        assert!("torus:2y3".parse::<TopologySpec>().is_err());
        assert!("star".parse::<TopologySpec>().is_err());
    }

    #[test]
    fn test_spec_display_roundtrips() {
        for spec in [
            TopologySpec::Ring,
            TopologySpec::Torus,
            TopologySpec::TorusShape { rows: 4, cols: 2 },
            TopologySpec::Hypercube,
        ] {
            assert_eq!(spec.to_string().parse::<TopologySpec>().unwrap(), spec);
        }
    }

    #[test]
    fn test_spec_resolve() {
        assert_eq!(
            TopologySpec::Hypercube.resolve(16).unwrap().world_size(),
            16
        );
        assert!(TopologySpec::Hypercube.resolve(6).is_err());
        assert!(TopologySpec::TorusShape { rows: 2, cols: 2 }
            .resolve(6)
            .is_err());
    }
}
