use rayon::prelude::*;

use super::error::NavResult;
use super::grid::GridField;
use super::grid_astar::GridPathfinder;
use super::models::{Cell, Path, PortalId, Rect};
use super::portal_graph::PortalGraph;
use super::search::{SearchOutcome, SearchScratch};

#[derive(Clone, Debug, Default)]
pub struct IntraStats {
    pub clusters_processed: usize,
    pub searches_run: usize,
    pub transitions_created: usize,
}

type Transition = (PortalId, usize, PortalId, Path<Cell>);

/// Computes, per transition layer, the cluster-bounded path between every
/// ordered pair of portal representatives in each cluster. Clusters are solved
/// in parallel with one scratch per worker; unreachable pairs get no entry.
pub fn build_transitions(graph: &mut PortalGraph, grid: &GridField, finder: &GridPathfinder) -> NavResult<IntraStats> {
    // Build-time searches are never cut short by the query budget.
    let finder = GridPathfinder { max_expansions: None, ..*finder };
    let layers = graph.layers() as usize;

    let jobs: Vec<(Rect, Vec<(PortalId, Cell)>)> = graph
        .clusters()
        .iter()
        .map(|c| {
            let reps = c
                .portals()
                .iter()
                .filter_map(|&id| graph.portal(id).ok().map(|p| (id, p.representative())))
                .collect();
            (c.rect, reps)
        })
        .collect();

    let results: Vec<NavResult<(usize, Vec<Transition>)>> = jobs
        .par_iter()
        .map_init(SearchScratch::<Cell>::default, |scratch, (rect, reps)| {
            let mut found = Vec::new();
            let mut searches = 0usize;
            for layer in 0..layers {
                let agent_size = (layer + 1) as u8;
                for &(from, from_cell) in reps {
                    for &(to, to_cell) in reps {
                        if from == to {
                            continue;
                        }
                        searches += 1;
                        if let SearchOutcome::Found(path) =
                            finder.find(grid, scratch, from_cell, to_cell, agent_size, Some(*rect))?
                        {
                            found.push((from, layer, to, path));
                        }
                    }
                }
            }
            Ok((searches, found))
        })
        .collect();

    let mut stats = IntraStats::default();
    for r in results {
        let (searches, found) = r?;
        stats.clusters_processed += 1;
        stats.searches_run += searches;
        stats.transitions_created += found.len();
        for (from, layer, to, path) in found {
            graph.set_transition(from, layer, to, path)?;
        }
    }
    log::info!(
        "intra: {} clusters, {} searches, {} transitions over {} layer(s)",
        stats.clusters_processed,
        stats.searches_run,
        stats.transitions_created,
        layers
    );
    Ok(stats)
}
