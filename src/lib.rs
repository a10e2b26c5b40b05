//! Runtime-reconfigurable ingestion gateway library

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod reload;
pub mod routing;
pub mod sink;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use reload::{ReloadCoordinator, ReloadHandle};
pub use routing::{LiveRoutes, RouteTable};
