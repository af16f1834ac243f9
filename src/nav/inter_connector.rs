use super::entrance_discovery::GapSegment;
use super::error::NavResult;
use super::grid::GridField;
use super::portal_graph::{Portal, PortalGraph};

#[derive(Clone, Debug, Default)]
pub struct InterStats {
    pub pairs_created: usize,
    pub portals_created: usize,
}

/// Registers every segment as a sibling portal pair. Runs serially because
/// each pair writes into two clusters' portal lists.
pub fn register_pairs(graph: &mut PortalGraph, grid: &GridField, segments: Vec<GapSegment>) -> NavResult<InterStats> {
    let mut stats = InterStats::default();
    for seg in segments {
        let idx = seg.transition_index;
        let here = Portal::new(seg.cluster, seg.positions, idx, seg.clearance, seg.crossing_clearance);
        let there = Portal::new(seg.neighbor, seg.sibling_positions, idx, seg.sibling_clearance, seg.crossing_clearance);
        // Crossing costs the cost of the cell being stepped onto.
        let onto_there = grid.cost(there.representative()) as f32;
        let onto_here = grid.cost(here.representative()) as f32;
        let a = graph.insert(here);
        let b = graph.insert(there);
        graph.link_siblings(a, b, onto_there, onto_here)?;
        stats.pairs_created += 1;
        stats.portals_created += 2;
    }
    log::info!("inter: linked {} sibling pairs", stats.pairs_created);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::cluster_builder::build_clusters;
    use crate::nav::config::NavConfig;
    use crate::nav::entrance_discovery::discover_gaps;
    use crate::nav::models::Cell;

    #[test]
    fn siblings_are_mutual_and_priced_by_destination_cell() {
        let grid = GridField::from_fn(8, 8, 2, true, |x, _| if x < 4 { 1 } else { 7 }).unwrap();
        let cfg = NavConfig { cluster_width: 4, cluster_height: 4, max_portal_size: 4, ..NavConfig::default() };
        let (mut graph, _) = build_clusters(&grid, &cfg).unwrap();
        let (segments, _) = discover_gaps(&graph, &grid, &cfg);
        let stats = register_pairs(&mut graph, &grid, segments).unwrap();
        // 2 vertical edges + 2 horizontal edges, one segment each
        assert_eq!(stats.pairs_created, 4);
        assert_eq!(graph.portal_count(), 8);
        graph.verify().unwrap();
        for p in graph.portals() {
            let sib = graph.portal(p.sibling.unwrap()).unwrap();
            assert_eq!(sib.sibling, Some(p.id));
            assert_eq!(p.cross_cost, grid.cost(sib.representative()) as f32);
            assert_eq!(p.representative().chebyshev(sib.representative()), 1);
        }
        let left = graph.portals().find(|p| p.positions[0] == Cell::new(3, 0)).unwrap();
        assert_eq!(left.cross_cost, 7.0);
    }
}
