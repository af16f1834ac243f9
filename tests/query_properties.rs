use anyhow::Result;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use gridnav::nav::config::{FlowBackend, NavConfig};
use gridnav::nav::executor::run_pipeline;
use gridnav::nav::fictive;
use gridnav::nav::grid::{GridField, IMPASSABLE};
use gridnav::nav::grid_astar::GridPathfinder;
use gridnav::nav::flow;
use gridnav::nav::models::{Cell, ClusterId, Destination, FlowDirection};
use gridnav::nav::neighbor_policy::{DiagonalPassing, MovementPolicy, DIAGONAL_COST};
use gridnav::nav::search::SearchScratch;
use gridnav::nav::NavMap;
use ordered_float::OrderedFloat;

// Deterministic cost pattern in 1..=5.
fn noise(x: i32, y: i32, seed: u32) -> u8 {
    let mut h = (x as u32).wrapping_mul(73_856_093) ^ (y as u32).wrapping_mul(19_349_663) ^ seed;
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    (h % 5) as u8 + 1
}

fn costs(w: i32, h: i32, seed: u32, wall: impl Fn(i32, i32) -> bool) -> Vec<u8> {
    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            out.push(if wall(x, y) { IMPASSABLE } else { noise(x, y, seed) });
        }
    }
    out
}

/// Plain Dijkstra with the same step rules as the grid search, no corner checks.
fn reference_cost(grid: &GridField, start: Cell, target: Cell, diagonals: bool) -> Option<f32> {
    let w = grid.width();
    let idx = |c: Cell| (c.y * w + c.x) as usize;
    let mut dist = vec![f32::INFINITY; (w * grid.height()) as usize];
    let mut heap = BinaryHeap::new();
    dist[idx(start)] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0f32), start.x, start.y)));
    while let Some(Reverse((OrderedFloat(d), x, y))) = heap.pop() {
        let cur = Cell::new(x, y);
        if cur == target {
            return Some(d);
        }
        if d > dist[idx(cur)] {
            continue;
        }
        for dy in -1..=1 {
            for dx in -1..=1 {
                let diagonal = dx != 0 && dy != 0;
                if (dx == 0 && dy == 0) || (diagonal && !diagonals) {
                    continue;
                }
                let n = cur.offset(dx, dy);
                if !grid.is_passable(n) {
                    continue;
                }
                let step = grid.cost(n) as f32 * if diagonal { DIAGONAL_COST } else { 1.0 };
                let nd = d + step;
                if nd < dist[idx(n)] {
                    dist[idx(n)] = nd;
                    heap.push(Reverse((OrderedFloat(nd), n.x, n.y)));
                }
            }
        }
    }
    None
}

fn config(cluster: i32, max_agent_size: u8, diagonal: DiagonalPassing) -> NavConfig {
    NavConfig {
        cluster_width: cluster,
        cluster_height: cluster,
        max_portal_size: 4,
        max_agent_size,
        diagonal,
        ..NavConfig::default()
    }
}

#[test]
fn astar_matches_brute_force_reference() -> Result<()> {
    for (diagonal, allows) in [(DiagonalPassing::Always, true), (DiagonalPassing::None, false)] {
        let map = NavMap::build(costs(12, 12, 7, |_, _| false), 12, 12, config(6, 1, diagonal))?;
        let pairs = [((0, 0), (11, 11)), ((3, 9), (10, 1)), ((5, 5), (5, 6)), ((11, 0), (0, 7))];
        for ((sx, sy), (tx, ty)) in pairs {
            let (s, t) = (Cell::new(sx, sy), Cell::new(tx, ty));
            let got = map.pathfind_astar(s, t, 1, None)?.expect("open grid is connected");
            let want = reference_cost(map.grid(), s, t, allows).expect("reference path");
            assert!((got.total_cost() - want).abs() < 1e-3, "{:?}->{:?} {:?}: {} vs {}", s, t, diagonal, got.total_cost(), want);
        }
    }
    Ok(())
}

#[test]
fn hpa_cost_is_never_below_astar() -> Result<()> {
    let wall = |x: i32, y: i32| (x == 9 && y != 4 && y != 13) || (y == 10 && (2..14).contains(&x));
    let mut map = NavMap::build(costs(18, 18, 3, wall), 18, 18, config(6, 2, DiagonalPassing::NoCornerCut))?;
    let cells = [(0, 0), (17, 17), (2, 15), (16, 1), (8, 8), (12, 12)];
    for &(sx, sy) in &cells {
        for &(tx, ty) in &cells {
            if (sx, sy) == (tx, ty) {
                continue;
            }
            let (s, t) = (Cell::new(sx, sy), Cell::new(tx, ty));
            let direct = map.pathfind_astar(s, t, 1, None)?;
            let hpa = map.pathfind_hpa(s, t, 1)?;
            match (direct, hpa) {
                (Some(d), Some(h)) => assert!(h.total_cost() + 1e-3 >= d.total_cost(), "{:?}->{:?}", s, t),
                (None, Some(_)) => panic!("hpa found a path A* could not: {:?}->{:?}", s, t),
                _ => {}
            }
        }
    }
    Ok(())
}

#[test]
fn siblings_stay_mutual_across_queries() -> Result<()> {
    let mut map = NavMap::build(costs(16, 16, 11, |x, y| x == 8 && y % 3 == 0), 16, 16, config(8, 2, DiagonalPassing::Always))?;
    let before = map.graph().snapshot();
    for (s, t) in [((1, 1), (14, 14)), ((14, 1), (1, 14)), ((7, 7), (8, 8))] {
        map.pathfind_hpa(Cell::new(s.0, s.1), Cell::new(t.0, t.1), 1)?;
        map.pathfind_portals(Cell::new(s.0, s.1), Cell::new(t.0, t.1), 2)?;
    }
    for p in map.graph().portals() {
        let sib = p.sibling.expect("boundary portal has a sibling");
        assert_eq!(map.graph().portal(sib)?.sibling, Some(p.id));
    }
    assert_eq!(map.graph().snapshot(), before);
    Ok(())
}

#[test]
fn fictive_round_trip_restores_graph() -> Result<()> {
    let grid = GridField::new(16, 16, costs(16, 16, 5, |x, y| y == 8 && x % 4 == 1), 2, true)?;
    let cfg = config(8, 2, DiagonalPassing::NoCornerCut);
    let (mut graph, _) = run_pipeline(&grid, &cfg)?;
    let finder = GridPathfinder::new(MovementPolicy::new(cfg.diagonal), cfg.heuristic, None);
    let mut scratch = SearchScratch::default();
    let before = graph.snapshot();
    for cell in [Cell::new(0, 0), Cell::new(7, 7), Cell::new(12, 3)] {
        for size in 1..=2 {
            let id = fictive::insert(&mut graph, &grid, &finder, &mut scratch, cell, size)?;
            assert!(graph.portal(id)?.transition_count() > 0);
            fictive::remove(&mut graph, id)?;
            assert_eq!(graph.snapshot(), before);
        }
    }
    graph.verify()?;
    Ok(())
}

#[test]
fn clearance_shrinks_with_agent_size() -> Result<()> {
    let grid = GridField::new(12, 12, costs(12, 12, 9, |x, y| (x * 7 + y * 3) % 11 == 0), 4, true)?;
    for y in 0..12 {
        for x in 0..12 {
            let c = Cell::new(x, y);
            assert!(grid.clearance(c) <= 4);
            for size in 1..4u8 {
                if grid.fits(c, size + 1) {
                    assert!(grid.fits(c, size), "{:?} fits {} but not {}", c, size + 1, size);
                }
            }
        }
    }
    Ok(())
}

fn step_of(dir: FlowDirection) -> (i32, i32) {
    let v = dir.vector();
    let axis = |f: f32| if f > 0.3 { 1 } else if f < -0.3 { -1 } else { 0 };
    (axis(v.x), axis(v.y))
}

#[test]
fn following_the_flow_reaches_the_destination() -> Result<()> {
    let mut cfg = config(10, 1, DiagonalPassing::Always);
    cfg.flow_backend = FlowBackend::Wavefront;
    let map = NavMap::build(vec![1; 100], 10, 10, cfg)?;
    let target = Cell::new(6, 3);
    for y in 0..10 {
        for x in 0..10 {
            let mut at = Cell::new(x, y);
            let mut steps = 0;
            loop {
                match map.flow_direction(at, Destination::Cell(target), 1)? {
                    Some(FlowDirection::Arrived) => break,
                    Some(dir) => {
                        let (dx, dy) = step_of(dir);
                        at = at.offset(dx, dy);
                        steps += 1;
                    }
                    None => panic!("no direction at reachable {:?}", at),
                }
                assert!(steps <= 9, "from ({}, {}) still walking at {:?}", x, y, at);
            }
            assert_eq!(at, target);
        }
    }
    Ok(())
}

#[test]
fn following_the_flow_around_walls_terminates() -> Result<()> {
    let wall = |x: i32, y: i32| x == 4 && y < 7;
    let map = NavMap::build(costs(10, 10, 1, wall), 10, 10, config(10, 1, DiagonalPassing::NoCornerCut))?;
    let target = Cell::new(8, 1);
    let mut at = Cell::new(1, 1);
    let mut steps = 0;
    while map.flow_direction(at, Destination::Cell(target), 1)? != Some(FlowDirection::Arrived) {
        let dir = map.flow_direction(at, Destination::Cell(target), 1)?.expect("reachable");
        let (dx, dy) = step_of(dir);
        at = at.offset(dx, dy);
        assert!(map.grid().is_passable(at), "stepped into {:?}", at);
        steps += 1;
        assert!(steps < 100);
    }
    assert_eq!(at, target);
    Ok(())
}

#[test]
fn open_ten_by_ten_diagonal_cost() -> Result<()> {
    let map = NavMap::build(vec![1; 100], 10, 10, config(10, 1, DiagonalPassing::Always))?;
    let path = map.pathfind_astar(Cell::new(0, 0), Cell::new(9, 9), 1, None)?.expect("path");
    assert!((path.total_cost() - 9.0 * DIAGONAL_COST).abs() < 1e-4);
    assert_eq!(path.len(), 10);
    Ok(())
}

#[test]
fn single_gap_yields_one_portal_pair() -> Result<()> {
    let mut cost = vec![1u8; 10 * 5];
    for y in 0..5 {
        if y != 2 {
            cost[y * 10 + 5] = IMPASSABLE;
        }
    }
    let mut cfg = config(5, 1, DiagonalPassing::NoCornerCut);
    cfg.max_portal_size = 8;
    let map = NavMap::build(cost, 10, 5, cfg)?;
    let portals: Vec<_> = map.graph().portals().collect();
    assert_eq!(portals.len(), 2);
    let (a, b) = (portals[0], portals[1]);
    assert_eq!(a.sibling, Some(b.id));
    assert_eq!(b.sibling, Some(a.id));
    assert_ne!(a.cluster, b.cluster);
    let mut reps = [a.representative(), b.representative()];
    reps.sort();
    assert_eq!(reps, [Cell::new(4, 2), Cell::new(5, 2)]);
    Ok(())
}

#[test]
fn oversized_agent_cannot_use_narrow_gap() -> Result<()> {
    let wall = |x: i32, y: i32| x == 8 && y != 5;
    let mut map = NavMap::build(costs(16, 16, 2, wall), 16, 16, config(8, 3, DiagonalPassing::NoCornerCut))?;
    let (s, t) = (Cell::new(1, 1), Cell::new(12, 12));
    assert!(map.pathfind_hpa(s, t, 1)?.is_some());
    assert!(map.pathfind_hpa(s, t, 2)?.is_none());
    assert!(map.pathfind_hpa(s, t, 3)?.is_none());
    Ok(())
}

#[test]
fn eikonal_backend_points_downhill() -> Result<()> {
    let mut cfg = config(9, 1, DiagonalPassing::NoCornerCut);
    cfg.flow_backend = FlowBackend::Eikonal;
    let map = NavMap::build(vec![1; 81], 9, 9, cfg)?;
    let target = Cell::new(2, 4);
    assert_eq!(map.flow_direction(target, Destination::Cell(target), 1)?, Some(FlowDirection::Arrived));
    let v = map.flow_direction(Cell::new(6, 4), Destination::Cell(target), 1)?.expect("direction").vector();
    assert!(v.x < 0.0 && v.y.abs() < 1e-3, "{:?}", v);
    assert!((v.length() - 1.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn expensive_open_cluster_steers_with_both_backends() -> Result<()> {
    for backend in [FlowBackend::Wavefront, FlowBackend::Eikonal] {
        let mut cfg = config(16, 1, DiagonalPassing::NoCornerCut);
        cfg.flow_backend = backend;
        let map = NavMap::build(vec![200; 256], 16, 16, cfg)?;
        let target = Cell::new(0, 0);
        for x in 1..16 {
            let dir = map.flow_direction(Cell::new(x, 0), Destination::Cell(target), 1)?;
            let v = dir.unwrap_or_else(|| panic!("{:?}: no direction at x={}", backend, x)).vector();
            assert!(v.x < 0.0, "{:?}: x={} {:?}", backend, x, v);
        }
    }
    Ok(())
}

#[test]
fn eikonal_descent_on_mixed_costs_reaches_the_destination() -> Result<()> {
    // Costs 50..=250 with a wall at x = 5 open at both ends.
    let wall = |x: i32, y: i32| x == 5 && (2..10).contains(&y);
    let cost: Vec<u8> = costs(12, 12, 17, wall).into_iter().map(|c| if c == IMPASSABLE { c } else { c * 50 }).collect();
    let mut cfg = config(12, 1, DiagonalPassing::NoCornerCut);
    cfg.flow_backend = FlowBackend::Eikonal;
    let map = NavMap::build(cost, 12, 12, cfg)?;
    let target = Cell::new(2, 6);
    let field = flow::field_for(map.graph(), map.grid(), FlowBackend::Eikonal, ClusterId(0), Destination::Cell(target), 1)?;

    for y in 0..12 {
        for x in 0..12 {
            let start = Cell::new(x, y);
            if wall(x, y) {
                assert_eq!(map.flow_direction(start, Destination::Cell(target), 1)?, None);
                continue;
            }
            let dir = map.flow_direction(start, Destination::Cell(target), 1)?;
            match dir {
                Some(FlowDirection::Arrived) => assert_eq!(start, target),
                Some(d) => assert!((d.vector().length() - 1.0).abs() < 1e-4, "{:?} {:?}", start, d),
                None => panic!("no direction at admitted {:?}", start),
            }

            // walk to the lowest 4-neighbor until the zero cell
            let mut at = start;
            let mut steps = 0;
            while field.value(at) != Some(0.0) {
                let here = field.value(at).expect("reachable");
                let next = [(0, 1), (0, -1), (1, 0), (-1, 0)]
                    .iter()
                    .map(|&(dx, dy)| at.offset(dx, dy))
                    .filter_map(|n| field.value(n).map(|v| (v, n)))
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .expect("a reachable neighbor");
                assert!(next.0 < here, "{:?} is a local minimum ({})", at, here);
                at = next.1;
                steps += 1;
                assert!(steps <= 144, "descent from {:?} did not end", start);
            }
            assert_eq!(at, target);
        }
    }
    Ok(())
}
