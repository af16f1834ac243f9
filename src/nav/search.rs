use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use super::error::NavResult;
use super::models::Path;

pub type NeighborBuf<N> = SmallVec<[(N, f32); 8]>;

/// A graph A* can walk: grid cells or portals.
pub trait SearchSpace {
    type Node: Copy + Eq + Ord + Hash;

    /// Appends every reachable neighbor of `node` with its step cost.
    fn neighbors(&self, node: Self::Node, out: &mut NeighborBuf<Self::Node>) -> NavResult<()>;

    fn heuristic(&self, from: Self::Node, to: Self::Node) -> f32;
}

#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome<N> {
    Found(Path<N>),
    NoPath,
    /// The expansion budget ran out before the target was popped.
    BudgetExhausted,
}

impl<N> SearchOutcome<N> {
    pub fn into_path(self) -> Option<Path<N>> {
        match self {
            SearchOutcome::Found(p) => Some(p),
            SearchOutcome::NoPath | SearchOutcome::BudgetExhausted => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }
}

// (f, insertion order, g, node); the sequence number keeps equal-f pops FIFO.
type OpenEntry<N> = Reverse<(OrderedFloat<f32>, u64, OrderedFloat<f32>, N)>;

/// Per-query working memory. Not shareable between concurrent searches.
pub struct SearchScratch<N> {
    open: BinaryHeap<OpenEntry<N>>,
    best: FxHashMap<N, f32>,
    parent: FxHashMap<N, N>,
    neighbors: NeighborBuf<N>,
    seq: u64,
    pub expansions: usize,
}

impl<N: Copy + Eq + Ord + Hash> Default for SearchScratch<N> {
    fn default() -> Self {
        Self {
            open: BinaryHeap::new(),
            best: FxHashMap::default(),
            parent: FxHashMap::default(),
            neighbors: SmallVec::new(),
            seq: 0,
            expansions: 0,
        }
    }
}

impl<N: Copy + Eq + Ord + Hash> SearchScratch<N> {
    pub fn clear(&mut self) {
        self.open.clear();
        self.best.clear();
        self.parent.clear();
        self.neighbors.clear();
        self.seq = 0;
        self.expansions = 0;
    }

    fn push(&mut self, node: N, g: f32, f: f32) {
        self.seq += 1;
        self.open.push(Reverse((OrderedFloat(f), self.seq, OrderedFloat(g), node)));
    }

    fn reconstruct(&self, target: N, cost: f32) -> Path<N> {
        let mut route = vec![target];
        let mut cur = target;
        while let Some(&p) = self.parent.get(&cur) {
            route.push(p);
            cur = p;
        }
        route.reverse();
        Path::new(route, cost)
    }
}

/// Best-first search with lazy deletion: improved nodes are pushed again and
/// stale heap entries are skipped on pop.
pub fn astar<S: SearchSpace>(
    space: &S,
    scratch: &mut SearchScratch<S::Node>,
    start: S::Node,
    target: S::Node,
    max_expansions: Option<usize>,
) -> NavResult<SearchOutcome<S::Node>> {
    scratch.clear();
    scratch.best.insert(start, 0.0);
    scratch.push(start, 0.0, space.heuristic(start, target));

    while let Some(Reverse((_f, _seq, OrderedFloat(g), node))) = scratch.open.pop() {
        match scratch.best.get(&node) {
            Some(&known) if g > known => continue,
            _ => {}
        }
        if node == target {
            return Ok(SearchOutcome::Found(scratch.reconstruct(node, g)));
        }
        scratch.expansions += 1;
        if let Some(limit) = max_expansions {
            if scratch.expansions > limit {
                log::warn!("search: expansion budget {} exhausted", limit);
                return Ok(SearchOutcome::BudgetExhausted);
            }
        }

        let mut buf = std::mem::take(&mut scratch.neighbors);
        buf.clear();
        space.neighbors(node, &mut buf)?;
        for &(next, step) in buf.iter() {
            let tentative = g + step;
            let improves = match scratch.best.get(&next) {
                Some(&old) => tentative < old,
                None => true,
            };
            if improves {
                scratch.best.insert(next, tentative);
                scratch.parent.insert(next, node);
                scratch.push(next, tentative, tentative + space.heuristic(next, target));
            }
        }
        scratch.neighbors = buf;
    }
    Ok(SearchOutcome::NoPath)
}

/// Free list of scratch contexts so `&self` queries can run concurrently.
pub struct ScratchPool<N> {
    free: Mutex<Vec<SearchScratch<N>>>,
}

impl<N> Default for ScratchPool<N> {
    fn default() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }
}

impl<N: Copy + Eq + Ord + Hash> ScratchPool<N> {
    pub fn checkout(&self) -> PooledScratch<'_, N> {
        let scratch = self
            .free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_default();
        PooledScratch { pool: self, scratch }
    }

    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub struct PooledScratch<'a, N: Copy + Eq + Ord + Hash> {
    pool: &'a ScratchPool<N>,
    scratch: SearchScratch<N>,
}

impl<N: Copy + Eq + Ord + Hash> Deref for PooledScratch<'_, N> {
    type Target = SearchScratch<N>;

    fn deref(&self) -> &Self::Target {
        &self.scratch
    }
}

impl<N: Copy + Eq + Ord + Hash> DerefMut for PooledScratch<'_, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.scratch
    }
}

impl<N: Copy + Eq + Ord + Hash> Drop for PooledScratch<'_, N> {
    fn drop(&mut self) {
        let mut s = std::mem::take(&mut self.scratch);
        s.clear();
        self.pool.free.lock().unwrap_or_else(|e| e.into_inner()).push(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Line graph 0..n with unit steps and a shortcut 0 -> n-1 costing `shortcut`.
    struct Line {
        n: u32,
        shortcut: f32,
    }

    impl SearchSpace for Line {
        type Node = u32;

        fn neighbors(&self, node: u32, out: &mut NeighborBuf<u32>) -> NavResult<()> {
            if node + 1 < self.n {
                out.push((node + 1, 1.0));
            }
            if node > 0 {
                out.push((node - 1, 1.0));
            }
            if node == 0 {
                out.push((self.n - 1, self.shortcut));
            }
            Ok(())
        }

        fn heuristic(&self, _from: u32, _to: u32) -> f32 {
            0.0
        }
    }

    #[test]
    fn picks_cheaper_of_two_routes() {
        let mut scratch = SearchScratch::default();
        let long = astar(&Line { n: 6, shortcut: 10.0 }, &mut scratch, 0, 5, None).unwrap();
        let p = long.into_path().unwrap();
        assert_eq!(p.route(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(p.total_cost(), 5.0);

        let short = astar(&Line { n: 6, shortcut: 2.0 }, &mut scratch, 0, 5, None).unwrap();
        let p = short.into_path().unwrap();
        assert_eq!(p.route(), &[0, 5]);
        assert_eq!(p.total_cost(), 2.0);
    }

    #[test]
    fn start_equals_target() {
        let mut scratch = SearchScratch::default();
        let p = astar(&Line { n: 3, shortcut: 9.0 }, &mut scratch, 1, 1, None).unwrap().into_path().unwrap();
        assert_eq!(p.route(), &[1]);
        assert_eq!(p.total_cost(), 0.0);
    }

    #[test]
    fn budget_cuts_search_short() {
        let mut scratch = SearchScratch::default();
        let out = astar(&Line { n: 100, shortcut: 1000.0 }, &mut scratch, 0, 99, Some(10)).unwrap();
        assert_eq!(out, SearchOutcome::BudgetExhausted);
        assert!(out.into_path().is_none());
    }

    #[test]
    fn pool_recycles_scratch() {
        let pool: ScratchPool<u32> = ScratchPool::default();
        {
            let mut a = pool.checkout();
            let _b = pool.checkout();
            astar(&Line { n: 4, shortcut: 9.0 }, &mut a, 0, 3, None).unwrap();
        }
        assert_eq!(pool.idle(), 2);
        let c = pool.checkout();
        assert_eq!(c.expansions, 0);
        assert_eq!(pool.idle(), 1);
    }
}
