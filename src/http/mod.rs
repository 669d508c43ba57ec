//! HTTP control API
//!
//! Thin axum routes over live recording sessions and the meeting store.
//! Handlers never reach around the session controller.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppState, DeviceFactory};
