//! HTTP surface: shared state, filters, response helpers and the server

pub mod filters;
pub mod pagination;
pub mod rejection;
pub mod reply;
pub mod server;
pub mod state;
pub mod validate;

pub use server::{build_routes, serve, shutdown_signal};
pub use state::AppState;
