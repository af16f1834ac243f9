use fixedbitset::FixedBitSet;
use glam::Vec2;
use std::collections::VecDeque;

use crate::nav::grid::GridField;
use crate::nav::models::{Cell, FlowDirection, Rect};
use crate::nav::neighbor_policy::{MovementPolicy, CARDINALS, DIAGONALS};

pub const UNREACHABLE: u32 = u32::MAX;

/// Integer potentials over one cluster rectangle, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct WavefrontField {
    rect: Rect,
    values: Vec<u32>,
}

impl WavefrontField {
    pub fn unreachable(rect: Rect) -> Self {
        Self { rect, values: vec![UNREACHABLE; rect.area()] }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Raw value at `c`; `UNREACHABLE` outside the rectangle.
    pub fn value(&self, c: Cell) -> u32 {
        if self.rect.contains(c) { self.values[self.rect.local_index(c)] } else { UNREACHABLE }
    }

    /// Multi-source relaxation from `seeds` with 4-neighbor steps. A cell is
    /// queued again whenever a neighbor lowers its value, so uneven costs settle
    /// correctly without a priority queue.
    pub fn solve(grid: &GridField, rect: Rect, seeds: &[Cell], agent_size: u8) -> Self {
        let mut field = Self::unreachable(rect);
        let mut queued = FixedBitSet::with_capacity(rect.area());
        let mut work = VecDeque::new();
        for &s in seeds {
            if rect.contains(s) && grid.admits(s, agent_size) {
                let i = rect.local_index(s);
                field.values[i] = 0;
                if !queued.put(i) {
                    work.push_back(s);
                }
            }
        }

        let mut pops = 0usize;
        while let Some(cur) = work.pop_front() {
            pops += 1;
            let ci = rect.local_index(cur);
            queued.set(ci, false);
            let base = field.values[ci];
            for off in CARDINALS {
                let n = cur.offset(off.0, off.1);
                if !rect.contains(n) || !grid.admits(n, agent_size) {
                    continue;
                }
                let ni = rect.local_index(n);
                let candidate = base.saturating_add(grid.cost(n) as u32);
                if candidate < field.values[ni] {
                    field.values[ni] = candidate;
                    if !queued.put(ni) {
                        work.push_back(n);
                    }
                }
            }
        }
        log::debug!("wavefront: {:?} settled after {} pops", rect, pops);
        field
    }

    /// Steps toward the lowest neighbor. Cardinals are tried before diagonals
    /// and only a strictly lower value replaces the current pick.
    pub fn direction(&self, policy: &MovementPolicy, position: Cell) -> Option<FlowDirection> {
        let here = self.value(position);
        if here == UNREACHABLE {
            return None;
        }
        if here == 0 {
            return Some(FlowDirection::Arrived);
        }
        let mut best = UNREACHABLE;
        let mut pick = None;
        for off in CARDINALS {
            let v = self.value(position.offset(off.0, off.1));
            if v < best {
                best = v;
                pick = Some(off);
            }
        }
        if policy.allows_diagonals() {
            for off in DIAGONALS {
                let v = self.value(position.offset(off.0, off.1));
                if v == UNREACHABLE {
                    continue;
                }
                let corner_a = self.value(position.offset(off.0, 0)) == UNREACHABLE;
                let corner_b = self.value(position.offset(0, off.1)) == UNREACHABLE;
                if !policy.diagonal_permitted(corner_a, corner_b) {
                    continue;
                }
                if v < best {
                    best = v;
                    pick = Some(off);
                }
            }
        }
        pick.map(|off| FlowDirection::Toward(Vec2::new(off.0 as f32, off.1 as f32).normalize()))
    }
}
