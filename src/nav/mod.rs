pub mod clearance;
pub mod cluster_builder;
pub mod config;
pub mod entrance_discovery;
pub mod error;
pub mod executor;
pub mod facade;
pub mod fictive;
pub mod flow;
pub mod grid;
pub mod grid_astar;
pub mod inter_connector;
pub mod intra_connector;
pub mod logging;
pub mod models;
pub mod neighbor_policy;
pub mod portal_astar;
pub mod portal_graph;
pub mod search;

pub use config::NavConfig;
pub use error::{NavError, NavResult};
pub use facade::{AgentRequest, NavMap, NavStats};
pub use models::{Cell, Destination, FlowDirection, Path, PortalId, PortalWaypoint, Rect};
