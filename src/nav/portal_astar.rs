use super::error::{NavError, NavResult};
use super::grid_astar::octile;
use super::models::{Cell, Path, PortalId, PortalWaypoint};
use super::portal_graph::PortalGraph;
use super::search::{self, NeighborBuf, SearchOutcome, SearchScratch, SearchSpace};

/// The abstract graph as seen by one agent size: transitions of its layer plus
/// sibling crossings wide enough for the agent.
struct PortalSpace<'a> {
    graph: &'a PortalGraph,
    layer: usize,
    agent_size: u8,
    use_clearance: bool,
}

impl SearchSpace for PortalSpace<'_> {
    type Node = PortalId;

    fn neighbors(&self, id: PortalId, out: &mut NeighborBuf<PortalId>) -> NavResult<()> {
        let p = self.graph.portal(id)?;
        for (to, path) in p.transitions(self.layer) {
            out.push((to, path.total_cost()));
        }
        if let Some(s) = p.sibling {
            if !self.use_clearance || p.crossing_clearance >= self.agent_size {
                out.push((s, p.cross_cost));
            }
        }
        Ok(())
    }

    fn heuristic(&self, from: PortalId, to: PortalId) -> f32 {
        match (self.graph.portal(from), self.graph.portal(to)) {
            (Ok(a), Ok(b)) => octile(a.representative(), b.representative()),
            _ => 0.0,
        }
    }
}

/// A* over portals. Stateless apart from the budget; the graph and scratch are
/// passed per call.
#[derive(Copy, Clone, Debug, Default)]
pub struct PortalPathfinder {
    pub max_expansions: Option<usize>,
}

impl PortalPathfinder {
    pub fn find(
        &self,
        graph: &PortalGraph,
        scratch: &mut SearchScratch<PortalId>,
        start: PortalId,
        target: PortalId,
        agent_size: u8,
        use_clearance: bool,
    ) -> NavResult<SearchOutcome<PortalId>> {
        graph.portal(start)?;
        graph.portal(target)?;
        let space = PortalSpace { graph, layer: graph.layer_for(agent_size), agent_size, use_clearance };
        let outcome = search::astar(&space, scratch, start, target, self.max_expansions)?;
        log::debug!(
            "hpa: {:?} -> {:?} size={} found={} expansions={}",
            start,
            target,
            agent_size,
            outcome.is_found(),
            scratch.expansions
        );
        Ok(outcome)
    }
}

/// Expands a portal route into grid cells: same-cluster hops replay the cached
/// transition, sibling hops add one step onto the sibling's representative.
pub fn stitch(graph: &PortalGraph, layer: usize, route: &Path<PortalId>) -> NavResult<Path<Cell>> {
    let ids = route.route();
    let Some(&first) = ids.first() else {
        return Ok(Path::new(Vec::new(), 0.0));
    };
    let mut cells = vec![graph.portal(first)?.representative()];
    let mut cost = 0.0f32;
    for pair in ids.windows(2) {
        let a = graph.portal(pair[0])?;
        let b = graph.portal(pair[1])?;
        if a.cluster == b.cluster {
            let hop = a.transition(layer, b.id).ok_or_else(|| {
                NavError::inconsistent(format!("no cached transition {:?} -> {:?} on layer {}", a.id, b.id, layer))
            })?;
            cells.extend_from_slice(&hop.route()[1..]);
            cost += hop.total_cost();
        } else if a.sibling == Some(b.id) {
            cells.push(b.representative());
            cost += a.cross_cost;
        } else {
            return Err(NavError::inconsistent(format!(
                "route step {:?} -> {:?} is neither a transition nor a sibling crossing",
                a.id, b.id
            )));
        }
    }
    Ok(Path::new(cells, cost))
}

/// Describes a portal route for callers; fictive endpoints lose their handle.
pub fn waypoints(graph: &PortalGraph, route: &Path<PortalId>) -> NavResult<Path<PortalWaypoint>> {
    let mut out = Vec::with_capacity(route.len());
    for &id in route.route() {
        let p = graph.portal(id)?;
        out.push(PortalWaypoint {
            portal: if p.fictive { None } else { Some(id) },
            cluster: p.cluster,
            cell: p.representative(),
        });
    }
    Ok(Path::new(out, route.total_cost()))
}
