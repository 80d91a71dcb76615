//! HTTP routes.

pub mod health;
pub mod ws;

pub use health::{HealthResponse, health_routes};
pub use ws::{ClientMessage, ServerMessage, ws_handler};
