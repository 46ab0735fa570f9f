//! HTTP surface: router, handlers, error mapping and server lifecycle.
//!
//! `build_router()` returns a composable `Router`; `start_server_on()`
//! binds it and hands back a shutdown handle.

pub mod endpoints;
pub mod error;
pub mod page;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server_on, AppServer, ServerError, ServerInfo};
pub use types::AppContext;
