use super::config::NavConfig;
use super::error::NavResult;
use super::grid::GridField;
use super::models::{Cell, ClusterId, Rect};
use super::portal_graph::{Cluster, PortalGraph};

#[derive(Clone, Debug, Default)]
pub struct ClusterStats {
    pub clusters_created: usize,
    /// Clusters without a single passable cell.
    pub solid_clusters: usize,
}

/// Tiles the grid into `cluster_width x cluster_height` rectangles in row-major
/// order and returns an empty portal graph over them.
pub fn build_clusters(grid: &GridField, cfg: &NavConfig) -> NavResult<(PortalGraph, ClusterStats)> {
    cfg.validate(grid.width(), grid.height())?;
    let clusters_x = grid.width() / cfg.cluster_width;
    let clusters_y = grid.height() / cfg.cluster_height;

    let mut stats = ClusterStats::default();
    let mut clusters = Vec::with_capacity((clusters_x * clusters_y) as usize);
    for cy in 0..clusters_y {
        for cx in 0..clusters_x {
            let id = ClusterId((cy * clusters_x + cx) as u32);
            let rect = Rect::new(cx * cfg.cluster_width, cy * cfg.cluster_height, cfg.cluster_width, cfg.cluster_height);
            if is_solid(grid, &rect) {
                stats.solid_clusters += 1;
            }
            clusters.push(Cluster::new(id, rect));
        }
    }
    stats.clusters_created = clusters.len();
    log::info!(
        "clusters: {}x{} grid of {}x{} clusters ({} solid)",
        clusters_x,
        clusters_y,
        cfg.cluster_width,
        cfg.cluster_height,
        stats.solid_clusters
    );

    let graph = PortalGraph::new(
        clusters,
        cfg.cluster_width,
        cfg.cluster_height,
        clusters_x,
        clusters_y,
        cfg.transition_layers(),
    );
    Ok((graph, stats))
}

fn is_solid(grid: &GridField, rect: &Rect) -> bool {
    (rect.min_y..rect.max_y()).all(|y| (rect.min_x..rect.max_x()).all(|x| grid.is_blocked(Cell::new(x, y))))
}
