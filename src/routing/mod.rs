//! 路由层：本地预路由 + API 编排器

pub mod local;
pub mod orchestrator;

pub use local::local_pre_route;
pub use orchestrator::{Complexity, Orchestrator, RoutingDecision};
