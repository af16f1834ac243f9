use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

use super::error::{NavError, NavResult};
use super::flow::cache::FieldCache;
use super::grid::GridField;
use super::models::{Cell, ClusterId, Path, PortalId, Rect};

/// A boundary segment shared with a sibling in the neighboring cluster, or a
/// single-cell fictive portal that lives for one query.
#[derive(Clone, Debug)]
pub struct Portal {
    pub id: PortalId,
    pub cluster: ClusterId,
    pub positions: Vec<Cell>,
    pub transition_index: usize,
    pub sibling: Option<PortalId>,
    /// Cost of stepping onto the sibling's representative cell.
    pub cross_cost: f32,
    /// Minimum grid clearance over `positions`.
    pub clearance: u8,
    /// Clearance at the representative, combined with the sibling's side.
    pub crossing_clearance: u8,
    pub fictive: bool,
    // One map per transition layer: target portal -> cluster-bounded path.
    transitions: Vec<FxHashMap<PortalId, Path<Cell>>>,
}

impl Portal {
    pub fn new(cluster: ClusterId, positions: Vec<Cell>, transition_index: usize, clearance: u8, crossing_clearance: u8) -> Self {
        Self {
            id: PortalId(u32::MAX),
            cluster,
            positions,
            transition_index,
            sibling: None,
            cross_cost: 0.0,
            clearance,
            crossing_clearance,
            fictive: false,
            transitions: Vec::new(),
        }
    }

    pub fn fictive(cluster: ClusterId, cell: Cell, clearance: u8) -> Self {
        Self { fictive: true, ..Self::new(cluster, vec![cell], 0, clearance, clearance) }
    }

    pub fn representative(&self) -> Cell {
        self.positions[self.transition_index]
    }

    pub fn transitions(&self, layer: usize) -> impl Iterator<Item = (PortalId, &Path<Cell>)> {
        self.transitions.get(layer).into_iter().flat_map(|m| m.iter().map(|(k, v)| (*k, v)))
    }

    pub fn transition(&self, layer: usize, to: PortalId) -> Option<&Path<Cell>> {
        self.transitions.get(layer).and_then(|m| m.get(&to))
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.iter().map(|m| m.len()).sum()
    }

    fn transition_keys(&self) -> Vec<BTreeSet<PortalId>> {
        self.transitions.iter().map(|m| m.keys().copied().collect()).collect()
    }
}

#[derive(Debug)]
pub struct Cluster {
    pub id: ClusterId,
    pub rect: Rect,
    portals: Vec<PortalId>,
    fields: FieldCache,
}

impl Cluster {
    pub fn new(id: ClusterId, rect: Rect) -> Self {
        Self { id, rect, portals: Vec::new(), fields: FieldCache::default() }
    }

    pub fn portals(&self) -> &[PortalId] {
        &self.portals
    }

    pub fn fields(&self) -> &FieldCache {
        &self.fields
    }
}

/// Cluster portal sets and transition key sets, for before/after comparisons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub cluster_portals: Vec<BTreeSet<PortalId>>,
    pub transition_keys: BTreeMap<PortalId, Vec<BTreeSet<PortalId>>>,
}

/// Owns every cluster and every portal. Portals live in an arena addressed by
/// `PortalId`; sibling links and transition keys are handles into it.
#[derive(Debug)]
pub struct PortalGraph {
    cluster_width: i32,
    cluster_height: i32,
    clusters_x: i32,
    clusters_y: i32,
    layers: u8,
    clusters: Vec<Cluster>,
    portals: Vec<Option<Portal>>,
    free: Vec<PortalId>,
}

impl PortalGraph {
    /// `clusters` must be in row-major order over the cluster grid.
    pub fn new(clusters: Vec<Cluster>, cluster_width: i32, cluster_height: i32, clusters_x: i32, clusters_y: i32, layers: u8) -> Self {
        Self {
            cluster_width,
            cluster_height,
            clusters_x,
            clusters_y,
            layers: layers.max(1),
            clusters,
            portals: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn layers(&self) -> u8 {
        self.layers
    }

    /// Transition layer serving `agent_size`. With a single layer every size shares it.
    pub fn layer_for(&self, agent_size: u8) -> usize {
        (agent_size.clamp(1, self.layers) - 1) as usize
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id.index()]
    }

    pub fn cluster_grid(&self) -> (i32, i32) {
        (self.clusters_x, self.clusters_y)
    }

    pub fn cluster_at(&self, c: Cell) -> Option<ClusterId> {
        if c.x < 0 || c.y < 0 {
            return None;
        }
        let (cx, cy) = (c.x / self.cluster_width, c.y / self.cluster_height);
        if cx >= self.clusters_x || cy >= self.clusters_y {
            return None;
        }
        Some(ClusterId((cy * self.clusters_x + cx) as u32))
    }

    pub fn portal(&self, id: PortalId) -> NavResult<&Portal> {
        self.portals
            .get(id.index())
            .and_then(|p| p.as_ref())
            .ok_or_else(|| NavError::invalid(format!("unknown portal {:?}", id)))
    }

    fn portal_mut(&mut self, id: PortalId) -> NavResult<&mut Portal> {
        self.portals
            .get_mut(id.index())
            .and_then(|p| p.as_mut())
            .ok_or_else(|| NavError::invalid(format!("unknown portal {:?}", id)))
    }

    pub fn portals(&self) -> impl Iterator<Item = &Portal> {
        self.portals.iter().flatten()
    }

    pub fn portal_count(&self) -> usize {
        self.portals().count()
    }

    pub fn transition_count(&self) -> usize {
        self.portals().map(|p| p.transition_count()).sum()
    }

    /// Places `portal` in a free arena slot and registers it with its cluster.
    pub fn insert(&mut self, mut portal: Portal) -> PortalId {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.portals.push(None);
                PortalId((self.portals.len() - 1) as u32)
            }
        };
        portal.id = id;
        portal.transitions = vec![FxHashMap::default(); self.layers as usize];
        self.clusters[portal.cluster.index()].portals.push(id);
        self.portals[id.index()] = Some(portal);
        id
    }

    pub fn link_siblings(&mut self, a: PortalId, b: PortalId, cost_onto_b: f32, cost_onto_a: f32) -> NavResult<()> {
        let pa = self.portal_mut(a)?;
        pa.sibling = Some(b);
        pa.cross_cost = cost_onto_b;
        let pb = self.portal_mut(b)?;
        pb.sibling = Some(a);
        pb.cross_cost = cost_onto_a;
        Ok(())
    }

    pub fn set_transition(&mut self, from: PortalId, layer: usize, to: PortalId, path: Path<Cell>) -> NavResult<()> {
        let p = self.portal_mut(from)?;
        let slot = p
            .transitions
            .get_mut(layer)
            .ok_or_else(|| NavError::invalid(format!("transition layer {} out of range", layer)))?;
        slot.insert(to, path);
        Ok(())
    }

    /// Detaches `id` from its cluster and drops every transition that points at
    /// it. Returns the removed portal.
    pub fn remove(&mut self, id: PortalId) -> NavResult<Portal> {
        let portal = self
            .portals
            .get_mut(id.index())
            .and_then(|p| p.take())
            .ok_or_else(|| NavError::invalid(format!("unknown portal {:?}", id)))?;
        let cluster = &mut self.clusters[portal.cluster.index()];
        cluster.portals.retain(|&p| p != id);
        let peers = cluster.portals.clone();
        for peer in peers {
            if let Some(Some(p)) = self.portals.get_mut(peer.index()) {
                for layer in p.transitions.iter_mut() {
                    layer.remove(&id);
                }
            }
        }
        self.free.push(id);
        Ok(portal)
    }

    /// Errors when a portal that could point at `removed` still does. Only its
    /// cluster and its sibling can hold such references.
    pub fn ensure_unreferenced(&self, removed: &Portal) -> NavResult<()> {
        let id = removed.id;
        let cluster = &self.clusters[removed.cluster.index()];
        if cluster.portals.contains(&id) {
            return Err(NavError::inconsistent(format!("removed portal {:?} still listed by {:?}", id, cluster.id)));
        }
        let holders = cluster.portals.iter().chain(removed.sibling.iter());
        for &peer in holders {
            let Some(Some(p)) = self.portals.get(peer.index()) else {
                continue;
            };
            if p.sibling == Some(id) || p.transitions.iter().any(|m| m.contains_key(&id)) {
                return Err(NavError::inconsistent(format!("portal {:?} still references removed {:?}", p.id, id)));
            }
        }
        Ok(())
    }

    /// Cells of `id` that seed its integration field for `agent_size`. A
    /// position qualifies when the smaller clearance of it and the facing
    /// sibling cell admits the agent.
    pub fn destination_cells(&self, grid: &GridField, id: PortalId, agent_size: u8) -> NavResult<Vec<Cell>> {
        let portal = self.portal(id)?;
        let sibling = match portal.sibling {
            Some(s) => Some(self.portal(s)?),
            None => None,
        };
        let mut out = Vec::with_capacity(portal.positions.len());
        for (i, &cell) in portal.positions.iter().enumerate() {
            if !grid.is_passable(cell) {
                continue;
            }
            let mut clearance = grid.clearance(cell);
            if let Some(s) = sibling {
                let facing = s.positions.get(i).copied().ok_or_else(|| {
                    NavError::inconsistent(format!("portal {:?} and sibling {:?} differ in length", portal.id, s.id))
                })?;
                clearance = clearance.min(grid.clearance(facing));
            }
            if !grid.use_clearance() || clearance >= agent_size {
                out.push(cell);
            }
        }
        Ok(out)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            cluster_portals: self.clusters.iter().map(|c| c.portals.iter().copied().collect()).collect(),
            transition_keys: self.portals().map(|p| (p.id, p.transition_keys())).collect(),
        }
    }

    /// Checks sibling symmetry, cluster ownership and that every transition key
    /// names a live portal in the same cluster.
    pub fn verify(&self) -> NavResult<()> {
        for cluster in &self.clusters {
            for &id in &cluster.portals {
                let p = self.portal(id).map_err(|_| {
                    NavError::inconsistent(format!("cluster {:?} lists dead portal {:?}", cluster.id, id))
                })?;
                if p.cluster != cluster.id {
                    return Err(NavError::inconsistent(format!(
                        "portal {:?} listed by {:?} but owned by {:?}",
                        id, cluster.id, p.cluster
                    )));
                }
            }
        }
        for p in self.portals() {
            let listed = self.clusters[p.cluster.index()].portals.iter().filter(|&&q| q == p.id).count();
            if listed != 1 {
                return Err(NavError::inconsistent(format!("portal {:?} listed {} times by its cluster", p.id, listed)));
            }
            let rect = self.clusters[p.cluster.index()].rect;
            if !p.positions.iter().all(|&c| rect.contains(c)) {
                return Err(NavError::inconsistent(format!("portal {:?} has cells outside its cluster", p.id)));
            }
            if let Some(s) = p.sibling {
                let sib = self
                    .portal(s)
                    .map_err(|_| NavError::inconsistent(format!("portal {:?} has dead sibling {:?}", p.id, s)))?;
                if sib.sibling != Some(p.id) {
                    return Err(NavError::inconsistent(format!("sibling link {:?} -> {:?} is not mutual", p.id, s)));
                }
                if sib.cluster == p.cluster {
                    return Err(NavError::inconsistent(format!("siblings {:?} and {:?} share a cluster", p.id, s)));
                }
            } else if !p.fictive {
                return Err(NavError::inconsistent(format!("boundary portal {:?} has no sibling", p.id)));
            }
            for layer in &p.transitions {
                for to in layer.keys() {
                    match self.portal(*to) {
                        Ok(t) if t.cluster == p.cluster => {}
                        Ok(_) => {
                            return Err(NavError::inconsistent(format!(
                                "transition {:?} -> {:?} crosses clusters",
                                p.id, to
                            )))
                        }
                        Err(_) => {
                            return Err(NavError::inconsistent(format!(
                                "transition {:?} -> {:?} is dangling",
                                p.id, to
                            )))
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
