use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    /// Chebyshev distance, the number of king moves between two cells.
    pub fn chebyshev(self, other: Cell) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Axis-aligned rectangle in cell coordinates, max edges exclusive.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(min_x: i32, min_y: i32, width: i32, height: i32) -> Self {
        Self { min_x, min_y, width, height }
    }

    pub fn max_x(&self) -> i32 {
        self.min_x + self.width
    }

    pub fn max_y(&self) -> i32 {
        self.min_y + self.height
    }

    pub fn contains(&self, c: Cell) -> bool {
        c.x >= self.min_x && c.x < self.max_x() && c.y >= self.min_y && c.y < self.max_y()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn encloses(&self, other: &Rect) -> bool {
        other.width > 0
            && other.height > 0
            && other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    /// Row-major index of `c` relative to this rectangle. Caller checks `contains`.
    pub fn local_index(&self, c: Cell) -> usize {
        ((c.y - self.min_y) * self.width + (c.x - self.min_x)) as usize
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle into the portal arena owned by `PortalGraph`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PortalId(pub u32);

impl PortalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Immutable ordered route plus its total cost.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Path<T> {
    route: Vec<T>,
    total_cost: f32,
}

impl<T> Path<T> {
    pub fn new(route: Vec<T>, total_cost: f32) -> Self {
        Self { route, total_cost }
    }

    pub fn route(&self) -> &[T] {
        &self.route
    }

    pub fn total_cost(&self) -> f32 {
        self.total_cost
    }

    pub fn len(&self) -> usize {
        self.route.len()
    }

    pub fn is_empty(&self) -> bool {
        self.route.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.route.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.route.last()
    }
}

/// One node of an abstract route. Endpoints synthesized for the query carry no
/// portal handle since their slots are recycled once the query returns.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct PortalWaypoint {
    pub portal: Option<PortalId>,
    pub cluster: ClusterId,
    pub cell: Cell,
}

/// Target of an integration field.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Portal(PortalId),
    Cell(Cell),
}

/// Result of a flow-direction lookup at a reachable position.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub enum FlowDirection {
    Arrived,
    Toward(Vec2),
}

impl FlowDirection {
    pub fn vector(&self) -> Vec2 {
        match self {
            FlowDirection::Arrived => Vec2::ZERO,
            FlowDirection::Toward(v) => *v,
        }
    }
}
