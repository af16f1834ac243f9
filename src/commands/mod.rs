use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::nav::config::{self, NavConfig};
use crate::nav::executor::ExecStats;
use crate::nav::logging;
use crate::nav::models::{Destination, PortalId};
use crate::nav::{NavMap, NavStats};
use crate::util::{parse_cell, parse_rect};

pub mod map_text;

#[derive(Args, Debug, Clone)]
pub struct CommonOpts {
    /// Text map file, one character per cell
    #[arg(long = "map", global = true)]
    pub map: Option<PathBuf>,
    /// JSON file mapping single characters to costs, merged over the defaults
    #[arg(long = "aliases", global = true)]
    pub aliases: Option<PathBuf>,
    /// JSON config file (NavConfig fields)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,
    #[arg(long = "cluster-width", global = true)]
    pub cluster_width: Option<i32>,
    #[arg(long = "cluster-height", global = true)]
    pub cluster_height: Option<i32>,
    #[arg(long = "max-agent-size", global = true)]
    pub max_agent_size: Option<u8>,
    #[arg(long = "max-portal-size", global = true)]
    pub max_portal_size: Option<usize>,
    /// uniform|greedy
    #[arg(long = "distribution", global = true)]
    pub distribution: Option<String>,
    /// none|always|no-corner-cut|allow-one-corner-obstacle
    #[arg(long = "diagonal", global = true)]
    pub diagonal: Option<String>,
    /// wavefront|eikonal
    #[arg(long = "backend", global = true)]
    pub backend: Option<String>,
    /// octile|manhattan
    #[arg(long = "heuristic", global = true)]
    pub heuristic: Option<String>,
    /// Disable clearance-aware search
    #[arg(long = "no-clearance", global = true)]
    pub no_clearance: bool,
    /// Stop searches after this many expansions
    #[arg(long = "max-expansions", global = true)]
    pub max_expansions: Option<usize>,
    /// Number of worker threads (rayon)
    #[arg(long = "threads", global = true)]
    pub threads: Option<usize>,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum QueryCommand {
    /// Direct grid A*
    Astar {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 1)]
        size: u8,
        /// Restrict the search to x,y,width,height
        #[arg(long)]
        bounds: Option<String>,
    },
    /// Hierarchical search expanded to grid cells
    Hpa {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 1)]
        size: u8,
    },
    /// Hierarchical search, portal waypoints only
    Portals {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 1)]
        size: u8,
    },
    /// Flow direction at a cell toward a cell or portal of the same cluster
    Flow {
        #[arg(long)]
        at: String,
        #[arg(long = "to-cell", conflicts_with = "to_portal")]
        to_cell: Option<String>,
        #[arg(long = "to-portal")]
        to_portal: Option<u32>,
        #[arg(long, default_value_t = 1)]
        size: u8,
    },
    /// Build the graph and print counts
    Stats,
}

/// Merges file config, CLI options and `NAV_*` variables (env wins).
pub fn resolve_config(common: &CommonOpts) -> Result<NavConfig> {
    let mut cfg = match &common.config {
        Some(path) => NavConfig::from_json_file(path)?,
        None => NavConfig::default(),
    };
    if let Some(v) = common.cluster_width { cfg.cluster_width = v; }
    if let Some(v) = common.cluster_height { cfg.cluster_height = v; }
    if let Some(v) = common.max_agent_size { cfg.max_agent_size = v; }
    if let Some(v) = common.max_portal_size { cfg.max_portal_size = v; }
    if let Some(s) = common.distribution.as_deref() {
        match config::parse_distribution(s) {
            Some(v) => cfg.portal_distribution = v,
            None => bail!("unknown portal distribution {:?}", s),
        }
    }
    if let Some(s) = common.diagonal.as_deref() {
        match config::parse_diagonal(s) {
            Some(v) => cfg.diagonal = v,
            None => bail!("unknown diagonal mode {:?}", s),
        }
    }
    if let Some(s) = common.backend.as_deref() {
        match config::parse_backend(s) {
            Some(v) => cfg.flow_backend = v,
            None => bail!("unknown flow backend {:?}", s),
        }
    }
    if let Some(s) = common.heuristic.as_deref() {
        match config::parse_heuristic(s) {
            Some(v) => cfg.heuristic = v,
            None => bail!("unknown heuristic {:?}", s),
        }
    }
    if common.no_clearance { cfg.use_clearance = false; }
    if common.max_expansions.is_some() { cfg.max_expansions = common.max_expansions; }
    if common.threads.is_some() { cfg.threads = common.threads; }
    if common.log_level.is_some() { cfg.log_level = common.log_level.clone(); }
    Ok(cfg.overlay_env())
}

/// Loads the map named by `--map` and builds a `NavMap` over it.
pub fn load_map(common: &CommonOpts, cfg: &NavConfig) -> Result<NavMap> {
    let Some(path) = common.map.as_deref() else {
        bail!("--map is required");
    };
    let aliases = match common.aliases.as_deref() {
        Some(p) => map_text::AliasTable::from_json_file(p)?,
        None => map_text::AliasTable::default(),
    };
    let map = map_text::load(path, &aliases, cfg.cluster_width, cfg.cluster_height)?;
    Ok(NavMap::build(map.cost, map.width, map.height, cfg.clone())?)
}

pub fn cmd_query(common: CommonOpts, sub: QueryCommand) -> Result<()> {
    let cfg = resolve_config(&common)?;

    // Init logging and thread pool
    logging::init(cfg.log_level.as_deref());
    if let Some(n) = cfg.threads {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    }

    let mut nav = load_map(&common, &cfg)?;
    match sub {
        QueryCommand::Astar { from, to, size, bounds } => {
            let bounds = bounds.as_deref().map(parse_rect).transpose()?;
            let path = nav.pathfind_astar(parse_cell(&from)?, parse_cell(&to)?, size, bounds)?;
            print_json(&path)
        }
        QueryCommand::Hpa { from, to, size } => {
            let path = nav.pathfind_hpa(parse_cell(&from)?, parse_cell(&to)?, size)?;
            print_json(&path)
        }
        QueryCommand::Portals { from, to, size } => {
            let path = nav.pathfind_portals(parse_cell(&from)?, parse_cell(&to)?, size)?;
            print_json(&path)
        }
        QueryCommand::Flow { at, to_cell, to_portal, size } => {
            let destination = match (to_cell, to_portal) {
                (Some(c), None) => Destination::Cell(parse_cell(&c)?),
                (None, Some(p)) => Destination::Portal(PortalId(p)),
                _ => bail!("flow needs exactly one of --to-cell or --to-portal"),
            };
            let dir = nav.flow_direction(parse_cell(&at)?, destination, size)?;
            print_json(&dir)
        }
        QueryCommand::Stats => print_json(&StatsReport { graph: nav.stats(), build: nav.build_stats().clone() }),
    }
}

#[derive(Serialize)]
struct StatsReport {
    graph: NavStats,
    build: ExecStats,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
