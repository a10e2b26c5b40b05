//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, headers, body)
//!     → live.rs (one RouteTable snapshot per request)
//!     → table.rs (cleaned path → RouteKey → Handler)
//!     → handler.rs (authorize → chain → sink)
//!
//! Route compilation (per configuration generation):
//!     GatewayConfig [listeners.*]
//!     → listeners.rs (fresh chains per listener)
//!     → RouteTableBuilder
//!     → frozen RouteTable, published by the reload coordinator
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once built; reload publishes a new one
//! - A path belongs to exactly one protocol family
//! - Deterministic: same input always resolves to the same handler

pub mod error;
pub mod handler;
pub mod listeners;
pub mod live;
pub mod table;

pub use error::BuildError;
pub use handler::{AuthError, AuthRequirement, HandleError, Handler};
pub use listeners::build_route_table;
pub use live::LiveRoutes;
pub use table::{clean_path, Protocol, RouteKey, RouteTable, RouteTableBuilder};
