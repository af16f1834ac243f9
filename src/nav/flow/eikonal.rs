use fixedbitset::FixedBitSet;
use glam::Vec2;

use crate::nav::grid::GridField;
use crate::nav::models::{Cell, FlowDirection, Rect};
use crate::nav::neighbor_policy::CARDINALS;

/// Local cost of a cell the agent cannot occupy. Such cells never feed an
/// upwind update and read as unreachable once the solve is done.
pub const OBSTACLE_COST: f32 = 1000.0;
pub const EPSILON: f32 = 1e-4;
/// Added to the local potential in place of a missing neighbor when taking the
/// gradient, so directions bend away from walls and edges.
pub const BORDER_REPULSION: f32 = 0.1;

const UNREACHED: f32 = f32::INFINITY;
// Upper bound on sweeps over the active list, as a multiple of the cell count.
const SWEEP_FACTOR: usize = 64;

/// Continuous potentials over one cluster rectangle, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct EikonalField {
    rect: Rect,
    values: Vec<f32>,
}

impl EikonalField {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Value at `c`; infinite outside the rectangle or where nothing arrived.
    pub fn value(&self, c: Cell) -> f32 {
        if self.rect.contains(c) { self.values[self.rect.local_index(c)] } else { UNREACHED }
    }

    /// Fast Iterative Method. The active list starts as the seeds' neighbors;
    /// a converged cell leaves the list and pushes every neighbor it improves
    /// just ahead of its own slot, so the front keeps its order.
    pub fn solve(grid: &GridField, rect: Rect, seeds: &[Cell], agent_size: u8) -> Self {
        let area = rect.area();
        let mut field = Self { rect, values: vec![UNREACHED; area] };
        let mut is_seed = FixedBitSet::with_capacity(area);
        for &s in seeds {
            if rect.contains(s) {
                let i = rect.local_index(s);
                field.values[i] = 0.0;
                is_seed.insert(i);
            }
        }

        let mut in_active = FixedBitSet::with_capacity(area);
        let mut active = Vec::new();
        for &s in seeds {
            for off in CARDINALS {
                let n = s.offset(off.0, off.1);
                if !rect.contains(n) {
                    continue;
                }
                let i = rect.local_index(n);
                if !is_seed.contains(i) && !in_active.put(i) {
                    active.push(n);
                }
            }
        }

        let cap = area.saturating_mul(SWEEP_FACTOR).max(1);
        let mut sweeps = 0usize;
        let mut next = Vec::with_capacity(active.len());
        while !active.is_empty() {
            sweeps += 1;
            if sweeps > cap {
                log::warn!("eikonal: {:?} still has {} active cells after {} sweeps", rect, active.len(), cap);
                break;
            }
            for &cur in &active {
                let ci = rect.local_index(cur);
                let p = field.values[ci];
                let q = field.update(grid, cur, agent_size);
                field.values[ci] = q;
                if !converged(p, q) {
                    next.push(cur);
                    continue;
                }
                for off in CARDINALS {
                    let n = cur.offset(off.0, off.1);
                    if !rect.contains(n) {
                        continue;
                    }
                    let ni = rect.local_index(n);
                    if in_active.contains(ni) {
                        continue;
                    }
                    let before = field.values[ni];
                    let after = field.update(grid, n, agent_size);
                    if before > after {
                        field.values[ni] = after;
                        in_active.insert(ni);
                        next.push(n);
                    }
                }
                in_active.set(ci, false);
            }
            std::mem::swap(&mut active, &mut next);
            next.clear();
        }
        // Blocked cells carry obstacle potentials; only admitted cells are reached.
        for (i, v) in field.values.iter_mut().enumerate() {
            let c = Cell::new(rect.min_x + (i as i32 % rect.width), rect.min_y + (i as i32 / rect.width));
            if !grid.admits(c, agent_size) {
                *v = UNREACHED;
            }
        }
        log::debug!("eikonal: {:?} converged in {} sweeps", rect, sweeps);
        field
    }

    /// Neighbor potential as seen by the upwind update. Cells the agent cannot
    /// occupy contribute nothing, so potentials of any size never leak through
    /// walls or grid edges.
    fn upwind(&self, grid: &GridField, c: Cell, agent_size: u8) -> f32 {
        if self.rect.contains(c) && grid.admits(c, agent_size) {
            self.values[self.rect.local_index(c)]
        } else {
            UNREACHED
        }
    }

    fn update(&self, grid: &GridField, c: Cell, agent_size: u8) -> f32 {
        let a = self
            .upwind(grid, c.offset(-1, 0), agent_size)
            .min(self.upwind(grid, c.offset(1, 0), agent_size))
            .max(0.0);
        let b = self
            .upwind(grid, c.offset(0, -1), agent_size)
            .min(self.upwind(grid, c.offset(0, 1), agent_size))
            .max(0.0);
        let t = if grid.admits(c, agent_size) { grid.cost(c) as f32 } else { OBSTACLE_COST };
        solve_local(a, b, t)
    }

    /// Normalized negative central-difference gradient. Unusable neighbors are
    /// replaced by the local value plus `BORDER_REPULSION`.
    pub fn direction(&self, grid: &GridField, position: Cell, agent_size: u8) -> Option<FlowDirection> {
        let center = self.value(position);
        if !center.is_finite() || !grid.admits(position, agent_size) {
            return None;
        }
        if center == 0.0 {
            return Some(FlowDirection::Arrived);
        }
        let sample = |dx: i32, dy: i32| {
            let n = position.offset(dx, dy);
            if self.rect.contains(n) && grid.admits(n, agent_size) && self.value(n).is_finite() {
                self.value(n)
            } else {
                center + BORDER_REPULSION
            }
        };
        let hor = difference(center, sample(-1, 0), sample(1, 0));
        let ver = difference(center, sample(0, -1), sample(0, 1));
        let g = Vec2::new(-hor, -ver);
        if g.length_squared() == 0.0 {
            return None;
        }
        Some(FlowDirection::Toward(g.normalize()))
    }
}

/// Derivative along one axis. When one side is the destination itself the
/// one-sided difference away from it is used.
fn difference(center: f32, low: f32, high: f32) -> f32 {
    match (low == 0.0, high == 0.0) {
        (true, true) => 0.0,
        (true, false) => high - center,
        (false, true) => center - low,
        (false, false) => ((center - low) + (high - center)) / 2.0,
    }
}

fn converged(p: f32, q: f32) -> bool {
    p == q || (p - q).abs() < EPSILON
}

/// Upwind update from the two axis minima `a`, `b` and local cost `t`.
fn solve_local(a: f32, b: f32, t: f32) -> f32 {
    let min = a.min(b);
    if !min.is_finite() {
        return UNREACHED;
    }
    let max = a.max(b).min(min + 1.0);
    let direct = min + t;
    if direct < min {
        return direct;
    }
    let disc = (-min * min - max * max + 2.0 * min * max + 2.0 * t * t).max(0.0);
    (min + max + disc.sqrt()) / 2.0
}
