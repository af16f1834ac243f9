use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use super::error::{NavError, NavResult};
use super::neighbor_policy::DiagonalPassing;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalDistribution {
    /// Split a gap into equally sized segments, remainder cells go to the first ones.
    Uniform,
    /// Cut fixed `max_portal_size` chunks, the last one takes what is left.
    Greedy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowBackend {
    Wavefront,
    Eikonal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    Octile,
    Manhattan,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub cluster_width: i32,
    pub cluster_height: i32,
    pub max_portal_size: usize,
    pub portal_distribution: PortalDistribution,
    pub max_agent_size: u8,
    pub use_clearance: bool,
    pub diagonal: DiagonalPassing,
    pub flow_backend: FlowBackend,
    pub heuristic: Heuristic,
    pub max_expansions: Option<usize>,
    pub precompute_fields: bool,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            cluster_width: 16,
            cluster_height: 16,
            max_portal_size: 8,
            portal_distribution: PortalDistribution::Uniform,
            max_agent_size: 4,
            use_clearance: true,
            diagonal: DiagonalPassing::NoCornerCut,
            flow_backend: FlowBackend::Wavefront,
            heuristic: Heuristic::Octile,
            max_expansions: None,
            precompute_fields: false,
            threads: None,
            log_level: None,
        }
    }
}

impl NavConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: NavConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Overlay `NAV_*` environment variables; set variables win.
    pub fn overlay_env(mut self) -> Self {
        if let Some(v) = env_parse::<i32>("NAV_CLUSTER_WIDTH") { self.cluster_width = v; }
        if let Some(v) = env_parse::<i32>("NAV_CLUSTER_HEIGHT") { self.cluster_height = v; }
        if let Some(v) = env_parse::<usize>("NAV_MAX_PORTAL_SIZE") { self.max_portal_size = v; }
        if let Some(v) = env::var("NAV_PORTAL_DISTRIBUTION").ok().and_then(|s| parse_distribution(&s)) {
            self.portal_distribution = v;
        }
        if let Some(v) = env_parse::<u8>("NAV_MAX_AGENT_SIZE") { self.max_agent_size = v; }
        if let Some(v) = env_flag("NAV_USE_CLEARANCE") { self.use_clearance = v; }
        if let Some(v) = env::var("NAV_DIAGONAL").ok().and_then(|s| parse_diagonal(&s)) { self.diagonal = v; }
        if let Some(v) = env::var("NAV_FLOW_BACKEND").ok().and_then(|s| parse_backend(&s)) { self.flow_backend = v; }
        if let Some(v) = env::var("NAV_HEURISTIC").ok().and_then(|s| parse_heuristic(&s)) { self.heuristic = v; }
        if let Some(v) = env_parse::<usize>("NAV_MAX_EXPANSIONS") { self.max_expansions = Some(v); }
        if let Some(v) = env_flag("NAV_PRECOMPUTE_FIELDS") { self.precompute_fields = v; }
        if let Some(v) = env_parse::<usize>("NAV_THREADS") { self.threads = Some(v); }
        if let Ok(v) = env::var("NAV_LOG_LEVEL") { self.log_level = Some(v); }
        self
    }

    /// Checks the config against a grid of the given size.
    pub fn validate(&self, width: i32, height: i32) -> NavResult<()> {
        if width <= 0 || height <= 0 {
            return Err(NavError::invalid(format!("grid must be non-empty, got {}x{}", width, height)));
        }
        if self.cluster_width <= 0 || self.cluster_height <= 0 {
            return Err(NavError::invalid(format!(
                "cluster dimensions must be positive, got {}x{}",
                self.cluster_width, self.cluster_height
            )));
        }
        if width % self.cluster_width != 0 || height % self.cluster_height != 0 {
            return Err(NavError::invalid(format!(
                "cluster size {}x{} does not divide grid {}x{}",
                self.cluster_width, self.cluster_height, width, height
            )));
        }
        if self.max_portal_size == 0 {
            return Err(NavError::invalid("max_portal_size must be at least 1"));
        }
        if self.max_agent_size == 0 {
            return Err(NavError::invalid("max_agent_size must be at least 1"));
        }
        Ok(())
    }

    /// Agent sizes that get their own intro-transition layer.
    pub fn transition_layers(&self) -> u8 {
        if self.use_clearance { self.max_agent_size } else { 1 }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn parse_distribution(input: &str) -> Option<PortalDistribution> {
    match input.trim().to_ascii_lowercase().as_str() {
        "uniform" => Some(PortalDistribution::Uniform),
        "greedy" => Some(PortalDistribution::Greedy),
        _ => None,
    }
}

pub fn parse_diagonal(input: &str) -> Option<DiagonalPassing> {
    match input.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "none" => Some(DiagonalPassing::None),
        "always" => Some(DiagonalPassing::Always),
        "no_corner_cut" => Some(DiagonalPassing::NoCornerCut),
        "allow_one_corner_obstacle" => Some(DiagonalPassing::AllowOneCornerObstacle),
        _ => None,
    }
}

pub fn parse_backend(input: &str) -> Option<FlowBackend> {
    match input.trim().to_ascii_lowercase().as_str() {
        "wavefront" | "discrete" => Some(FlowBackend::Wavefront),
        "eikonal" | "fim" => Some(FlowBackend::Eikonal),
        _ => None,
    }
}

pub fn parse_heuristic(input: &str) -> Option<Heuristic> {
    match input.trim().to_ascii_lowercase().as_str() {
        "octile" => Some(Heuristic::Octile),
        "manhattan" => Some(Heuristic::Manhattan),
        _ => None,
    }
}
