use super::error::{NavError, NavResult};
use super::grid::GridField;
use super::grid_astar::{route_cost, GridPathfinder};
use super::models::{Cell, Path, PortalId, Rect};
use super::portal_graph::{Portal, PortalGraph};
use super::search::{SearchOutcome, SearchScratch};

/// Adds a single-cell portal at `cell` and connects it both ways to every
/// portal of its cluster reachable for `agent_size`. On error nothing is left
/// behind.
pub fn insert(
    graph: &mut PortalGraph,
    grid: &GridField,
    finder: &GridPathfinder,
    scratch: &mut SearchScratch<Cell>,
    cell: Cell,
    agent_size: u8,
) -> NavResult<PortalId> {
    grid.check_cell(cell, "fictive portal")?;
    let cluster_id = graph
        .cluster_at(cell)
        .ok_or_else(|| NavError::invalid(format!("{:?} is not covered by any cluster", cell)))?;
    let cluster = graph.cluster(cluster_id);
    let rect = cluster.rect;
    let mut peers = Vec::with_capacity(cluster.portals().len());
    for &id in cluster.portals() {
        peers.push((id, graph.portal(id)?.representative()));
    }

    let id = graph.insert(Portal::fictive(cluster_id, cell, grid.max_agent_size()));
    if let Err(e) = connect(graph, grid, finder, scratch, id, cell, agent_size, rect, &peers) {
        remove(graph, id)?;
        return Err(e);
    }
    log::debug!("fictive: inserted {:?} at {:?} in {:?} ({} peers)", id, cell, cluster_id, peers.len());
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn connect(
    graph: &mut PortalGraph,
    grid: &GridField,
    finder: &GridPathfinder,
    scratch: &mut SearchScratch<Cell>,
    id: PortalId,
    cell: Cell,
    agent_size: u8,
    rect: Rect,
    peers: &[(PortalId, Cell)],
) -> NavResult<()> {
    let finder = GridPathfinder { max_expansions: None, ..*finder };
    let layer = graph.layer_for(agent_size);
    for &(peer, peer_cell) in peers {
        if let SearchOutcome::Found(path) = finder.find(grid, scratch, cell, peer_cell, agent_size, Some(rect))? {
            let mut back: Vec<Cell> = path.route().to_vec();
            back.reverse();
            let back_cost = route_cost(grid, &back);
            graph.set_transition(id, layer, peer, path)?;
            graph.set_transition(peer, layer, id, Path::new(back, back_cost))?;
        }
    }
    Ok(())
}

/// Removes a fictive portal and every transition pointing at it, then checks
/// that no reference survived.
pub fn remove(graph: &mut PortalGraph, id: PortalId) -> NavResult<()> {
    if !graph.portal(id)?.fictive {
        return Err(NavError::invalid(format!("{:?} is a boundary portal and cannot be removed", id)));
    }
    let removed = graph.remove(id)?;
    graph.ensure_unreferenced(&removed)?;
    log::debug!("fictive: removed {:?}", id);
    Ok(())
}

/// Runs `query` with fictive portals at `start` and `target`, removing both
/// afterwards whatever the outcome.
#[allow(clippy::too_many_arguments)]
pub fn with_endpoints<T>(
    graph: &mut PortalGraph,
    grid: &GridField,
    finder: &GridPathfinder,
    scratch: &mut SearchScratch<Cell>,
    start: Cell,
    target: Cell,
    agent_size: u8,
    query: impl FnOnce(&PortalGraph, PortalId, PortalId) -> NavResult<T>,
) -> NavResult<T> {
    let s = insert(graph, grid, finder, scratch, start, agent_size)?;
    let t = match insert(graph, grid, finder, scratch, target, agent_size) {
        Ok(t) => t,
        Err(e) => {
            remove(graph, s)?;
            return Err(e);
        }
    };
    let result = query(graph, s, t);
    let cleanup = remove(graph, t).and_then(|_| remove(graph, s));
    match (result, cleanup) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(v), Ok(())) => Ok(v),
    }
}
