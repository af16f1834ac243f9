pub mod cache;
pub mod eikonal;
pub mod wavefront;

use rayon::prelude::*;
use std::sync::Arc;

use super::config::FlowBackend;
use super::error::NavResult;
use super::grid::GridField;
use super::models::{Cell, ClusterId, Destination, FlowDirection, Rect};
use super::neighbor_policy::MovementPolicy;
use super::portal_graph::PortalGraph;
use cache::FieldKey;
use eikonal::EikonalField;
use wavefront::WavefrontField;

/// Potential field over one cluster toward one destination, from either backend.
#[derive(Clone, Debug, PartialEq)]
pub enum IntegrationField {
    Discrete(WavefrontField),
    Continuous(EikonalField),
}

impl IntegrationField {
    /// Solves a field over `rect`. Seeds the agent cannot occupy are dropped;
    /// with no seed left the whole field is unreachable.
    pub fn solve(backend: FlowBackend, grid: &GridField, rect: Rect, seeds: &[Cell], agent_size: u8) -> Self {
        let seeds: Vec<Cell> = seeds
            .iter()
            .copied()
            .filter(|&c| rect.contains(c) && grid.admits(c, agent_size))
            .collect();
        match backend {
            FlowBackend::Wavefront => IntegrationField::Discrete(WavefrontField::solve(grid, rect, &seeds, agent_size)),
            FlowBackend::Eikonal => IntegrationField::Continuous(EikonalField::solve(grid, rect, &seeds, agent_size)),
        }
    }

    pub fn rect(&self) -> Rect {
        match self {
            IntegrationField::Discrete(f) => f.rect(),
            IntegrationField::Continuous(f) => f.rect(),
        }
    }

    /// Potential at `c` as a float, `None` where the destination is unreachable.
    pub fn value(&self, c: Cell) -> Option<f32> {
        match self {
            IntegrationField::Discrete(f) => {
                let v = f.value(c);
                (v != wavefront::UNREACHABLE).then_some(v as f32)
            }
            IntegrationField::Continuous(f) => {
                let v = f.value(c);
                v.is_finite().then_some(v)
            }
        }
    }

    pub fn direction(&self, grid: &GridField, policy: &MovementPolicy, position: Cell, agent_size: u8) -> Option<FlowDirection> {
        match self {
            IntegrationField::Discrete(f) => f.direction(policy, position),
            IntegrationField::Continuous(f) => f.direction(grid, position, agent_size),
        }
    }
}

/// Cached field of `destination` over `cluster`, solved on first use. Callers
/// check that the destination lies in that cluster.
pub fn field_for(
    graph: &PortalGraph,
    grid: &GridField,
    backend: FlowBackend,
    cluster: ClusterId,
    destination: Destination,
    agent_size: u8,
) -> NavResult<Arc<IntegrationField>> {
    let seeds = match destination {
        Destination::Portal(id) => graph.destination_cells(grid, id, agent_size)?,
        Destination::Cell(c) => vec![c],
    };
    let c = graph.cluster(cluster);
    let key = FieldKey { agent_size, destination };
    Ok(c.fields().get_or_compute(key, || IntegrationField::solve(backend, grid, c.rect, &seeds, agent_size)))
}

/// Solves the field of every boundary portal for every agent size, clusters in
/// parallel. Returns the number of fields now cached.
pub fn precompute_portal_fields(graph: &PortalGraph, grid: &GridField, backend: FlowBackend) -> NavResult<usize> {
    let sizes: Vec<u8> = (1..=grid.max_agent_size()).collect();
    let counts: Vec<NavResult<usize>> = graph
        .clusters()
        .par_iter()
        .map(|cluster| {
            let mut n = 0usize;
            for &id in cluster.portals() {
                if graph.portal(id)?.fictive {
                    continue;
                }
                for &size in &sizes {
                    field_for(graph, grid, backend, cluster.id, Destination::Portal(id), size)?;
                    n += 1;
                }
            }
            Ok(n)
        })
        .collect();
    let mut total = 0;
    for c in counts {
        total += c?;
    }
    log::info!("flow: precomputed {} portal fields ({:?})", total, backend);
    Ok(total)
}
