use serde::Serialize;

use super::cluster_builder::{self, ClusterStats};
use super::config::NavConfig;
use super::entrance_discovery::{self, EntranceStats};
use super::error::{NavError, NavResult};
use super::flow;
use super::grid::GridField;
use super::grid_astar::GridPathfinder;
use super::inter_connector::{self, InterStats};
use super::intra_connector::{self, IntraStats};
use super::neighbor_policy::MovementPolicy;
use super::portal_graph::PortalGraph;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    Clusters,
    Portals,
    Transitions,
    Fields,
}

impl Stage {
    pub fn key(self) -> &'static str {
        match self {
            Stage::Clusters => "clusters",
            Stage::Portals => "portals",
            Stage::Transitions => "transitions",
            Stage::Fields => "fields",
        }
    }

    pub fn all() -> &'static [Stage] {
        &[Stage::Clusters, Stage::Portals, Stage::Transitions, Stage::Fields]
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ExecStats {
    pub ran_clusters: bool,
    pub ran_portals: bool,
    pub ran_transitions: bool,
    pub ran_fields: bool,
    pub clusters: usize,
    pub gaps: usize,
    pub portal_pairs: usize,
    pub transitions: usize,
    pub fields: usize,
}

impl ExecStats {
    fn absorb_clusters(&mut self, s: &ClusterStats) {
        self.clusters = s.clusters_created;
    }

    fn absorb_portals(&mut self, e: &EntranceStats, i: &InterStats) {
        self.gaps = e.gaps_found;
        self.portal_pairs = i.pairs_created;
    }

    fn absorb_transitions(&mut self, s: &IntraStats) {
        self.transitions = s.transitions_created;
    }
}

/// Builds the portal graph for `grid`, validating after every stage. The
/// field stage only runs when `precompute_fields` is set.
pub fn run_pipeline(grid: &GridField, cfg: &NavConfig) -> NavResult<(PortalGraph, ExecStats)> {
    if grid.max_agent_size() != cfg.max_agent_size || grid.use_clearance() != cfg.use_clearance {
        return Err(NavError::invalid(format!(
            "grid built for max agent size {} (clearance {}), config says {} ({})",
            grid.max_agent_size(),
            grid.use_clearance(),
            cfg.max_agent_size,
            cfg.use_clearance
        )));
    }
    let finder = GridPathfinder::new(MovementPolicy::new(cfg.diagonal), cfg.heuristic, cfg.max_expansions);
    let mut stats = ExecStats::default();
    let mut graph: Option<PortalGraph> = None;

    for &stage in Stage::all() {
        log::debug!("exec: stage {}", stage.key());
        match stage {
            Stage::Clusters => {
                let (g, s) = cluster_builder::build_clusters(grid, cfg)?;
                validate_clusters(&g, grid)?;
                stats.absorb_clusters(&s);
                stats.ran_clusters = true;
                graph = Some(g);
            }
            Stage::Portals => {
                let g = stage_graph(&mut graph, stage)?;
                let (segments, es) = entrance_discovery::discover_gaps(g, grid, cfg);
                let is = inter_connector::register_pairs(g, grid, segments)?;
                validate_portals(g)?;
                stats.absorb_portals(&es, &is);
                stats.ran_portals = true;
            }
            Stage::Transitions => {
                let g = stage_graph(&mut graph, stage)?;
                let s = intra_connector::build_transitions(g, grid, &finder)?;
                g.verify()?;
                stats.absorb_transitions(&s);
                stats.ran_transitions = true;
            }
            Stage::Fields => {
                if !cfg.precompute_fields {
                    continue;
                }
                let g = stage_graph(&mut graph, stage)?;
                stats.fields = flow::precompute_portal_fields(g, grid, cfg.flow_backend)?;
                stats.ran_fields = true;
            }
        }
    }

    let graph = graph.ok_or_else(|| NavError::inconsistent("pipeline finished without a graph"))?;
    log::info!(
        "exec: {} clusters, {} portal pairs, {} transitions, {} fields",
        stats.clusters,
        stats.portal_pairs,
        stats.transitions,
        stats.fields
    );
    Ok((graph, stats))
}

fn stage_graph(graph: &mut Option<PortalGraph>, stage: Stage) -> NavResult<&mut PortalGraph> {
    graph
        .as_mut()
        .ok_or_else(|| NavError::inconsistent(format!("stage {} ran before clusters", stage.key())))
}

// ---- Validations ----

fn validate_clusters(graph: &PortalGraph, grid: &GridField) -> NavResult<()> {
    let area: usize = graph.clusters().iter().map(|c| c.rect.area()).sum();
    if area != grid.bounds().area() {
        return Err(NavError::inconsistent(format!(
            "validate_clusters: clusters cover {} cells, grid has {}",
            area,
            grid.bounds().area()
        )));
    }
    for c in graph.clusters() {
        if !grid.bounds().encloses(&c.rect) {
            return Err(NavError::inconsistent(format!("validate_clusters: {:?} leaves the grid", c.id)));
        }
    }
    Ok(())
}

fn validate_portals(graph: &PortalGraph) -> NavResult<()> {
    for p in graph.portals() {
        let sib = p
            .sibling
            .ok_or_else(|| NavError::inconsistent(format!("validate_portals: {:?} has no sibling", p.id)))?;
        let s = graph.portal(sib)?;
        if s.positions.len() != p.positions.len() || s.transition_index != p.transition_index {
            return Err(NavError::inconsistent(format!(
                "validate_portals: {:?} and {:?} do not face each other",
                p.id, sib
            )));
        }
        if p.representative().chebyshev(s.representative()) != 1 {
            return Err(NavError::inconsistent(format!(
                "validate_portals: representatives of {:?} and {:?} are not adjacent",
                p.id, sib
            )));
        }
    }
    graph.verify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::grid::IMPASSABLE;

    #[test]
    fn full_pipeline_runs_every_stage() {
        let grid = GridField::from_fn(16, 16, 2, true, |x, y| if x == 8 && y < 12 { IMPASSABLE } else { 1 }).unwrap();
        let cfg = NavConfig {
            cluster_width: 8,
            cluster_height: 8,
            max_agent_size: 2,
            precompute_fields: true,
            ..NavConfig::default()
        };
        let (graph, stats) = run_pipeline(&grid, &cfg).unwrap();
        assert!(stats.ran_clusters && stats.ran_portals && stats.ran_transitions && stats.ran_fields);
        assert_eq!(stats.clusters, 4);
        assert_eq!(graph.portal_count(), stats.portal_pairs * 2);
        assert_eq!(graph.transition_count(), stats.transitions);
        assert_eq!(stats.fields, graph.portal_count() * 2);
        let cached: usize = graph.clusters().iter().map(|c| c.fields().len()).sum();
        assert_eq!(cached, stats.fields);
    }

    #[test]
    fn field_stage_is_opt_in() {
        let grid = GridField::from_fn(8, 8, 1, true, |_, _| 1).unwrap();
        let cfg = NavConfig { cluster_width: 4, cluster_height: 4, max_agent_size: 1, ..NavConfig::default() };
        let (graph, stats) = run_pipeline(&grid, &cfg).unwrap();
        assert!(!stats.ran_fields);
        assert!(graph.clusters().iter().all(|c| c.fields().is_empty()));
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let grid = GridField::from_fn(8, 8, 3, true, |_, _| 1).unwrap();
        let cfg = NavConfig { cluster_width: 4, cluster_height: 4, max_agent_size: 2, ..NavConfig::default() };
        assert!(matches!(run_pipeline(&grid, &cfg), Err(NavError::InvalidArgument(_))));
    }
}
