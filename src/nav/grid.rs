use super::clearance;
use super::error::{NavError, NavResult};
use super::models::{Cell, Rect};

pub const IMPASSABLE: u8 = 255;

/// Cost grid plus the clearance grid derived from it. Owned by the map and
/// handed to every stage by reference.
#[derive(Clone, Debug)]
pub struct GridField {
    width: i32,
    height: i32,
    cost: Vec<u8>,
    clearance: Vec<u8>,
    max_agent_size: u8,
    use_clearance: bool,
}

impl GridField {
    pub fn new(width: i32, height: i32, cost: Vec<u8>, max_agent_size: u8, use_clearance: bool) -> NavResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(NavError::invalid(format!("grid must be non-empty, got {}x{}", width, height)));
        }
        if cost.len() != (width as usize) * (height as usize) {
            return Err(NavError::invalid(format!(
                "cost grid has {} cells, expected {}x{}",
                cost.len(), width, height
            )));
        }
        let clearance = clearance::compute_clearance(&cost, width, height, max_agent_size);
        Ok(Self { width, height, cost, clearance, max_agent_size, use_clearance })
    }

    /// Builds a grid from a closure over coordinates; handy for synthetic maps.
    pub fn from_fn(
        width: i32,
        height: i32,
        max_agent_size: u8,
        use_clearance: bool,
        f: impl Fn(i32, i32) -> u8,
    ) -> NavResult<Self> {
        let mut cost = Vec::with_capacity((width.max(0) * height.max(0)) as usize);
        for y in 0..height {
            for x in 0..width {
                cost.push(f(x, y));
            }
        }
        Self::new(width, height, cost, max_agent_size, use_clearance)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn max_agent_size(&self) -> u8 {
        self.max_agent_size
    }

    pub fn use_clearance(&self) -> bool {
        self.use_clearance
    }

    pub fn in_bounds(&self, c: Cell) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }

    fn idx(&self, c: Cell) -> usize {
        (c.y * self.width + c.x) as usize
    }

    /// Traversal cost of an in-bounds cell.
    pub fn cost(&self, c: Cell) -> u8 {
        self.cost[self.idx(c)]
    }

    pub fn clearance(&self, c: Cell) -> u8 {
        self.clearance[self.idx(c)]
    }

    pub fn is_passable(&self, c: Cell) -> bool {
        self.in_bounds(c) && self.cost(c) != IMPASSABLE
    }

    /// Out of bounds counts as blocked.
    pub fn is_blocked(&self, c: Cell) -> bool {
        !self.is_passable(c)
    }

    /// True when an agent of `agent_size` fits at `c`, independent of the clearance toggle.
    pub fn fits(&self, c: Cell, agent_size: u8) -> bool {
        self.in_bounds(c) && self.clearance(c) >= agent_size
    }

    /// Whether an agent of `agent_size` may stand on `c` under the current settings.
    pub fn admits(&self, c: Cell, agent_size: u8) -> bool {
        if !self.is_passable(c) {
            return false;
        }
        !self.use_clearance || self.clearance(c) >= agent_size
    }

    pub fn check_cell(&self, c: Cell, what: &str) -> NavResult<()> {
        if self.in_bounds(c) {
            Ok(())
        } else {
            Err(NavError::invalid(format!(
                "{} {:?} outside {}x{} grid",
                what, c, self.width, self.height
            )))
        }
    }

    pub fn check_agent_size(&self, agent_size: u8) -> NavResult<()> {
        if agent_size == 0 || agent_size > self.max_agent_size {
            return Err(NavError::invalid(format!(
                "agent size {} outside 1..={}",
                agent_size, self.max_agent_size
            )));
        }
        Ok(())
    }
}
