use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;

use super::config::NavConfig;
use super::error::{NavError, NavResult};
use super::executor::{self, ExecStats};
use super::fictive;
use super::flow;
use super::grid::GridField;
use super::grid_astar::GridPathfinder;
use super::models::{Cell, ClusterId, Destination, FlowDirection, Path, PortalId, PortalWaypoint, Rect};
use super::neighbor_policy::MovementPolicy;
use super::portal_astar::{self, PortalPathfinder};
use super::portal_graph::PortalGraph;
use super::search::{ScratchPool, SearchOutcome};

/// One member of a group move request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AgentRequest {
    pub position: Cell,
    pub agent_size: u8,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NavStats {
    pub width: i32,
    pub height: i32,
    pub clusters: usize,
    pub portals: usize,
    pub transitions: usize,
    pub cached_fields: usize,
}

/// Owns the grid, the portal graph built from it and the query scratch pools.
/// Queries that touch the graph structure (`pathfind_hpa`, `pathfind_portals`,
/// `plan_group`) take `&mut self`; the rest can run concurrently.
pub struct NavMap {
    cfg: NavConfig,
    grid: GridField,
    graph: PortalGraph,
    policy: MovementPolicy,
    finder: GridPathfinder,
    portal_finder: PortalPathfinder,
    cell_scratch: ScratchPool<Cell>,
    portal_scratch: ScratchPool<PortalId>,
    build_stats: ExecStats,
}

impl NavMap {
    /// Builds clearance, clusters, portals and transitions for a row-major cost grid.
    pub fn build(cost: Vec<u8>, width: i32, height: i32, cfg: NavConfig) -> NavResult<Self> {
        cfg.validate(width, height)?;
        let grid = GridField::new(width, height, cost, cfg.max_agent_size, cfg.use_clearance)?;
        let (graph, build_stats) = executor::run_pipeline(&grid, &cfg)?;
        let policy = MovementPolicy::new(cfg.diagonal);
        Ok(Self {
            finder: GridPathfinder::new(policy, cfg.heuristic, cfg.max_expansions),
            portal_finder: PortalPathfinder { max_expansions: cfg.max_expansions },
            policy,
            cfg,
            grid,
            graph,
            cell_scratch: ScratchPool::default(),
            portal_scratch: ScratchPool::default(),
            build_stats,
        })
    }

    /// Replaces the cost grid and rebuilds everything derived from it,
    /// dropping every cached field.
    pub fn rebuild(&mut self, cost: Vec<u8>, width: i32, height: i32) -> NavResult<()> {
        *self = Self::build(cost, width, height, self.cfg.clone())?;
        Ok(())
    }

    pub fn config(&self) -> &NavConfig {
        &self.cfg
    }

    pub fn grid(&self) -> &GridField {
        &self.grid
    }

    pub fn graph(&self) -> &PortalGraph {
        &self.graph
    }

    pub fn build_stats(&self) -> &ExecStats {
        &self.build_stats
    }

    pub fn stats(&self) -> NavStats {
        NavStats {
            width: self.grid.width(),
            height: self.grid.height(),
            clusters: self.graph.clusters().len(),
            portals: self.graph.portals().filter(|p| !p.fictive).count(),
            transitions: self.graph.transition_count(),
            cached_fields: self.graph.clusters().iter().map(|c| c.fields().len()).sum(),
        }
    }

    /// Direct A* over cells, optionally confined to `bounds`.
    pub fn pathfind_astar(&self, start: Cell, target: Cell, agent_size: u8, bounds: Option<Rect>) -> NavResult<Option<Path<Cell>>> {
        self.grid.check_cell(start, "start")?;
        self.grid.check_cell(target, "target")?;
        let mut scratch = self.cell_scratch.checkout();
        let outcome = self.finder.find(&self.grid, &mut scratch, start, target, agent_size, bounds)?;
        Ok(outcome.into_path())
    }

    /// Hierarchical search, expanded back into grid cells.
    pub fn pathfind_hpa(&mut self, start: Cell, target: Cell, agent_size: u8) -> NavResult<Option<Path<Cell>>> {
        let layer = self.graph.layer_for(agent_size);
        self.abstract_query(start, target, agent_size, |graph, route| portal_astar::stitch(graph, layer, route))
    }

    /// Hierarchical search returning the portal route itself.
    pub fn pathfind_portals(&mut self, start: Cell, target: Cell, agent_size: u8) -> NavResult<Option<Path<PortalWaypoint>>> {
        self.abstract_query(start, target, agent_size, portal_astar::waypoints)
    }

    fn abstract_query<T>(
        &mut self,
        start: Cell,
        target: Cell,
        agent_size: u8,
        finish: impl FnOnce(&PortalGraph, &Path<PortalId>) -> NavResult<T>,
    ) -> NavResult<Option<T>> {
        self.grid.check_cell(start, "start")?;
        self.grid.check_cell(target, "target")?;
        self.grid.check_agent_size(agent_size)?;
        if self.grid.use_clearance() && !self.grid.fits(target, agent_size) {
            return Ok(None);
        }

        let Self { grid, graph, finder, portal_finder, cell_scratch, portal_scratch, cfg, .. } = self;
        let use_clearance = cfg.use_clearance;
        let mut cells = cell_scratch.checkout();
        let mut portals = portal_scratch.checkout();
        fictive::with_endpoints(graph, grid, finder, &mut cells, start, target, agent_size, |g, s, t| {
            match portal_finder.find(g, &mut portals, s, t, agent_size, use_clearance)? {
                SearchOutcome::Found(route) => finish(g, &route).map(Some),
                SearchOutcome::NoPath | SearchOutcome::BudgetExhausted => Ok(None),
            }
        })
    }

    /// Steering direction at `position` toward `destination`, which must be a
    /// boundary portal or a cell of the same cluster as `position`.
    pub fn flow_direction(&self, position: Cell, destination: Destination, agent_size: u8) -> NavResult<Option<FlowDirection>> {
        self.grid.check_cell(position, "position")?;
        self.grid.check_agent_size(agent_size)?;
        let cluster = self.cluster_of(position)?;
        match destination {
            Destination::Portal(id) => {
                let p = self.graph.portal(id)?;
                if p.fictive {
                    return Err(NavError::invalid(format!("{:?} is a query endpoint, not a flow destination", id)));
                }
                if p.cluster != cluster {
                    return Err(NavError::invalid(format!(
                        "portal {:?} is in {:?}, position {:?} is in {:?}",
                        id, p.cluster, position, cluster
                    )));
                }
            }
            Destination::Cell(c) => {
                self.grid.check_cell(c, "destination")?;
                let owner = self.cluster_of(c)?;
                if owner != cluster {
                    return Err(NavError::invalid(format!(
                        "destination {:?} is in {:?}, position {:?} is in {:?}",
                        c, owner, position, cluster
                    )));
                }
            }
        }
        let field = flow::field_for(&self.graph, &self.grid, self.cfg.flow_backend, cluster, destination, agent_size)?;
        Ok(field.direction(&self.grid, &self.policy, position, agent_size))
    }

    /// Solves every boundary portal's field for every agent size up front.
    pub fn precompute_portal_fields(&self) -> NavResult<usize> {
        flow::precompute_portal_fields(&self.graph, &self.grid, self.cfg.flow_backend)
    }

    /// Plans portal routes for a group heading to `target`. Agents are grouped
    /// by cluster and size; an agent that can walk to an already planned agent
    /// of its group inside their cluster shares that agent's route. Results
    /// come back in input order.
    pub fn plan_group(&mut self, agents: &[AgentRequest], target: Cell) -> NavResult<Vec<Option<Arc<Path<PortalWaypoint>>>>> {
        self.grid.check_cell(target, "target")?;
        let mut groups: FxHashMap<(ClusterId, u8), Vec<usize>> = FxHashMap::default();
        let mut order: Vec<(ClusterId, u8)> = Vec::new();
        for (i, a) in agents.iter().enumerate() {
            self.grid.check_cell(a.position, "agent position")?;
            self.grid.check_agent_size(a.agent_size)?;
            let key = (self.cluster_of(a.position)?, a.agent_size);
            let members = groups.entry(key).or_default();
            if members.is_empty() {
                order.push(key);
            }
            members.push(i);
        }

        let mut out: Vec<Option<Arc<Path<PortalWaypoint>>>> = vec![None; agents.len()];
        let mut individual = 0usize;
        for key in order {
            let (cluster, size) = key;
            let rect = self.graph.cluster(cluster).rect;
            let mut leaders: Vec<(Cell, Option<Arc<Path<PortalWaypoint>>>)> = Vec::new();
            for &i in &groups[&key] {
                let pos = agents[i].position;
                let mut shared = None;
                for (leader_pos, route) in &leaders {
                    if self.pathfind_astar(pos, *leader_pos, size, Some(rect))?.is_some() {
                        shared = Some(route.clone());
                        break;
                    }
                }
                let route = match shared {
                    Some(r) => r,
                    None => {
                        individual += 1;
                        let r = self.pathfind_portals(pos, target, size)?.map(Arc::new);
                        leaders.push((pos, r.clone()));
                        r
                    }
                };
                out[i] = route;
            }
        }
        log::debug!("group: {} agents, {} individual plans", agents.len(), individual);
        Ok(out)
    }

    fn cluster_of(&self, c: Cell) -> NavResult<ClusterId> {
        self.graph
            .cluster_at(c)
            .ok_or_else(|| NavError::invalid(format!("{:?} is not covered by any cluster", c)))
    }
}

impl std::fmt::Debug for NavMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavMap")
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("portals", &self.graph.portal_count())
            .finish()
    }
}
