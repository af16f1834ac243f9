use super::config::Heuristic;
use super::error::{NavError, NavResult};
use super::grid::GridField;
use super::models::{Cell, Rect};
use super::neighbor_policy::{MovementPolicy, DIAGONAL_COST};
use super::search::{self, NeighborBuf, SearchOutcome, SearchScratch, SearchSpace};

/// Octile distance: diagonal moves for the shorter axis, straight for the rest.
pub fn octile(a: Cell, b: Cell) -> f32 {
    let dx = (a.x - b.x).abs() as f32;
    let dy = (a.y - b.y).abs() as f32;
    dx.max(dy) + (DIAGONAL_COST - 1.0) * dx.min(dy)
}

pub fn manhattan(a: Cell, b: Cell) -> f32 {
    ((a.x - b.x).abs() + (a.y - b.y).abs()) as f32
}

/// Cost of entering `to` from an adjacent `from`.
pub fn step_cost(grid: &GridField, from: Cell, to: Cell) -> f32 {
    let base = grid.cost(to) as f32;
    if from.x != to.x && from.y != to.y { base * DIAGONAL_COST } else { base }
}

/// Sums step costs along an existing route; used to price reversed paths,
/// whose cost differs from the forward one on non-uniform grids.
pub fn route_cost(grid: &GridField, route: &[Cell]) -> f32 {
    route.windows(2).map(|w| step_cost(grid, w[0], w[1])).sum()
}

struct GridSpace<'a> {
    grid: &'a GridField,
    bounds: Rect,
    agent_size: u8,
    policy: MovementPolicy,
    heuristic: Heuristic,
}

impl SearchSpace for GridSpace<'_> {
    type Node = Cell;

    fn neighbors(&self, c: Cell, out: &mut NeighborBuf<Cell>) -> NavResult<()> {
        for off in self.policy.neighbor_offsets() {
            let n = c.offset(off.0, off.1);
            if !self.bounds.contains(n) || !self.grid.admits(n, self.agent_size) {
                continue;
            }
            if off.is_diagonal() {
                let corner_a = self.grid.is_blocked(c.offset(off.0, 0));
                let corner_b = self.grid.is_blocked(c.offset(0, off.1));
                if !self.policy.diagonal_permitted(corner_a, corner_b) {
                    continue;
                }
            }
            out.push((n, step_cost(self.grid, c, n)));
        }
        Ok(())
    }

    fn heuristic(&self, from: Cell, to: Cell) -> f32 {
        match self.heuristic {
            Heuristic::Octile => octile(from, to),
            Heuristic::Manhattan => manhattan(from, to),
        }
    }
}

/// Point-to-point A* over raw cells, optionally confined to a sub-rectangle.
#[derive(Copy, Clone, Debug)]
pub struct GridPathfinder {
    pub policy: MovementPolicy,
    pub heuristic: Heuristic,
    pub max_expansions: Option<usize>,
}

impl GridPathfinder {
    pub fn new(policy: MovementPolicy, heuristic: Heuristic, max_expansions: Option<usize>) -> Self {
        Self { policy, heuristic, max_expansions }
    }

    /// Validates the query, then searches. `bounds` defaults to the whole grid
    /// and must lie inside it; both endpoints must lie inside `bounds`.
    pub fn find(
        &self,
        grid: &GridField,
        scratch: &mut SearchScratch<Cell>,
        start: Cell,
        target: Cell,
        agent_size: u8,
        bounds: Option<Rect>,
    ) -> NavResult<SearchOutcome<Cell>> {
        grid.check_agent_size(agent_size)?;
        let bounds = bounds.unwrap_or_else(|| grid.bounds());
        if !grid.bounds().encloses(&bounds) {
            return Err(NavError::invalid(format!(
                "bounds {:?} not inside {}x{} grid",
                bounds,
                grid.width(),
                grid.height()
            )));
        }
        for (what, c) in [("start", start), ("target", target)] {
            if !bounds.contains(c) {
                return Err(NavError::invalid(format!("{} {:?} outside bounds {:?}", what, c, bounds)));
            }
        }
        if !grid.admits(start, agent_size) || !grid.admits(target, agent_size) {
            return Ok(SearchOutcome::NoPath);
        }

        let space = GridSpace { grid, bounds, agent_size, policy: self.policy, heuristic: self.heuristic };
        let outcome = search::astar(&space, scratch, start, target, self.max_expansions)?;
        log::debug!(
            "astar: {:?} -> {:?} size={} found={} expansions={}",
            start,
            target,
            agent_size,
            outcome.is_found(),
            scratch.expansions
        );
        Ok(outcome)
    }
}
