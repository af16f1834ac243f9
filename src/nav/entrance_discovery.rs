use rayon::prelude::*;
use std::ops::Range;

use super::config::{NavConfig, PortalDistribution};
use super::grid::GridField;
use super::models::{Cell, ClusterId};
use super::neighbor_policy::Offset;
use super::portal_graph::PortalGraph;

/// One portal pair to be registered: `positions` in `cluster`, facing
/// `sibling_positions` in `neighbor` index by index.
#[derive(Clone, Debug, PartialEq)]
pub struct GapSegment {
    pub cluster: ClusterId,
    pub neighbor: ClusterId,
    pub positions: Vec<Cell>,
    pub sibling_positions: Vec<Cell>,
    pub transition_index: usize,
    pub clearance: u8,
    pub sibling_clearance: u8,
    pub crossing_clearance: u8,
}

#[derive(Clone, Debug, Default)]
pub struct EntranceStats {
    pub clusters_scanned: usize,
    pub gaps_found: usize,
    pub segments_created: usize,
}

// Only the +x and +y sides are scanned so each shared edge is visited once.
const SIDES: [Offset; 2] = [Offset(1, 0), Offset(0, 1)];

/// Scans every cluster's right and top edges in parallel. The result is
/// ordered by cluster, then side, then position along the edge.
pub fn discover_gaps(graph: &PortalGraph, grid: &GridField, cfg: &NavConfig) -> (Vec<GapSegment>, EntranceStats) {
    let per_cluster: Vec<(Vec<GapSegment>, usize)> = graph
        .clusters()
        .par_iter()
        .map(|cluster| {
            let mut segments = Vec::new();
            let mut gaps = 0usize;
            for side in SIDES {
                let rect = cluster.rect;
                let edge: Vec<Cell> = if side.0 == 1 {
                    (rect.min_y..rect.max_y()).map(|y| Cell::new(rect.max_x() - 1, y)).collect()
                } else {
                    (rect.min_x..rect.max_x()).map(|x| Cell::new(x, rect.max_y() - 1)).collect()
                };
                let Some(neighbor) = edge.first().and_then(|c| graph.cluster_at(c.offset(side.0, side.1))) else {
                    continue;
                };
                for run in passable_runs(grid, &edge, side) {
                    gaps += 1;
                    let inner = &edge[run];
                    for part in split_gap(inner.len(), cfg.max_portal_size, cfg.portal_distribution) {
                        let positions = inner[part].to_vec();
                        let sibling_positions: Vec<Cell> = positions.iter().map(|c| c.offset(side.0, side.1)).collect();
                        segments.push(make_segment(grid, cluster.id, neighbor, positions, sibling_positions));
                    }
                }
            }
            log::debug!("entrances: cluster {:?} -> {} segments", cluster.id, segments.len());
            (segments, gaps)
        })
        .collect();

    let mut stats = EntranceStats { clusters_scanned: per_cluster.len(), ..EntranceStats::default() };
    let mut out = Vec::new();
    for (segments, gaps) in per_cluster {
        stats.gaps_found += gaps;
        stats.segments_created += segments.len();
        out.extend(segments);
    }
    log::info!(
        "entrances: scanned {} clusters, {} gaps -> {} portal pairs",
        stats.clusters_scanned,
        stats.gaps_found,
        stats.segments_created
    );
    (out, stats)
}

/// Maximal index ranges of `edge` where both the edge cell and the cell across
/// the boundary are passable.
fn passable_runs(grid: &GridField, edge: &[Cell], side: Offset) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &c) in edge.iter().enumerate() {
        let open = grid.is_passable(c) && grid.is_passable(c.offset(side.0, side.1));
        match (open, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..edge.len());
    }
    runs
}

/// Splits a gap of `len` cells into segments no longer than `max_size`.
pub fn split_gap(len: usize, max_size: usize, distribution: PortalDistribution) -> Vec<Range<usize>> {
    if len == 0 || max_size == 0 {
        return Vec::new();
    }
    let count = len.div_ceil(max_size);
    let mut out = Vec::with_capacity(count);
    match distribution {
        PortalDistribution::Uniform => {
            let base = len / count;
            let extra = len % count;
            let mut at = 0;
            for i in 0..count {
                let size = if i < extra { base + 1 } else { base };
                out.push(at..at + size);
                at += size;
            }
        }
        PortalDistribution::Greedy => {
            for i in 0..count {
                let at = i * max_size;
                out.push(at..(at + max_size).min(len));
            }
        }
    }
    out
}

fn make_segment(grid: &GridField, cluster: ClusterId, neighbor: ClusterId, positions: Vec<Cell>, sibling_positions: Vec<Cell>) -> GapSegment {
    let combined: Vec<u8> = positions
        .iter()
        .zip(&sibling_positions)
        .map(|(&a, &b)| grid.clearance(a).min(grid.clearance(b)))
        .collect();
    let transition_index = if grid.use_clearance() {
        representative_index(&combined)
    } else {
        positions.len() / 2
    };
    let min_of = |cells: &[Cell]| cells.iter().map(|&c| grid.clearance(c)).min().unwrap_or(0);
    GapSegment {
        cluster,
        neighbor,
        clearance: min_of(&positions),
        sibling_clearance: min_of(&sibling_positions),
        crossing_clearance: combined[transition_index],
        positions,
        sibling_positions,
        transition_index,
    }
}

/// Index with the largest combined clearance; ties go to the one nearest the
/// segment midpoint, earlier index first.
fn representative_index(combined: &[u8]) -> usize {
    let best = combined.iter().copied().max().unwrap_or(0);
    let mid = combined.len() as f32 / 2.0;
    let mut pick = 0;
    let mut pick_dist = f32::MAX;
    for (i, &c) in combined.iter().enumerate() {
        if c != best {
            continue;
        }
        let dist = (mid - i as f32).abs();
        if dist < pick_dist {
            pick = i;
            pick_dist = dist;
        }
    }
    pick
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::cluster_builder::build_clusters;
    use crate::nav::grid::IMPASSABLE;

    #[test]
    fn uniform_split_spreads_remainder_to_front() {
        let parts = split_gap(10, 4, PortalDistribution::Uniform);
        assert_eq!(parts, vec![0..4, 4..7, 7..10]);
        let parts = split_gap(8, 4, PortalDistribution::Uniform);
        assert_eq!(parts, vec![0..4, 4..8]);
    }

    #[test]
    fn greedy_split_leaves_short_tail() {
        let parts = split_gap(10, 4, PortalDistribution::Greedy);
        assert_eq!(parts, vec![0..4, 4..8, 8..10]);
        assert!(split_gap(0, 4, PortalDistribution::Greedy).is_empty());
    }

    #[test]
    fn representative_prefers_clear_cells_near_middle() {
        assert_eq!(representative_index(&[1, 2, 2, 2, 1]), 2);
        assert_eq!(representative_index(&[3, 1, 1, 1]), 0);
        // midpoint 2.0: indices 1 and 3 tie on distance, the earlier wins
        assert_eq!(representative_index(&[1, 2, 1, 2]), 1);
    }

    #[test]
    fn wall_with_one_gap_yields_one_pair() {
        // Two 5-wide clusters; column x=4 is wall except (4,2).
        let grid = GridField::from_fn(10, 5, 2, true, |x, y| if x == 4 && y != 2 { IMPASSABLE } else { 1 }).unwrap();
        let cfg = NavConfig { cluster_width: 5, cluster_height: 5, ..NavConfig::default() };
        let (graph, _) = build_clusters(&grid, &cfg).unwrap();
        let (segments, stats) = discover_gaps(&graph, &grid, &cfg);
        assert_eq!(stats.gaps_found, 1);
        assert_eq!(segments.len(), 1);
        let s = &segments[0];
        assert_eq!(s.positions, vec![Cell::new(4, 2)]);
        assert_eq!(s.sibling_positions, vec![Cell::new(5, 2)]);
        assert_eq!((s.cluster, s.neighbor), (ClusterId(0), ClusterId(1)));
    }

    #[test]
    fn long_open_edge_is_segmented() {
        let grid = GridField::from_fn(8, 16, 1, false, |_, _| 1).unwrap();
        let cfg = NavConfig { cluster_width: 4, cluster_height: 16, max_portal_size: 6, ..NavConfig::default() };
        let (graph, _) = build_clusters(&grid, &cfg).unwrap();
        let (segments, _) = discover_gaps(&graph, &grid, &cfg);
        let lens: Vec<usize> = segments.iter().map(|s| s.positions.len()).collect();
        assert_eq!(lens, vec![6, 5, 5]);
        assert_eq!(segments[0].transition_index, 3);
    }
}
