//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, fallback handler)
//!     → request.rs (request ID)
//!     → routing::LiveRoutes (snapshot, resolve, authorize)
//!     → decode.rs (body → batch for the route's protocol)
//!     → Handler (chain → sink)
//!     → per-protocol acknowledgement
//! ```

pub mod decode;
pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
