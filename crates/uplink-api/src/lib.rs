//! Uplink API Library
//!
//! HTTP and WebSocket surface of the upload service: session issue and
//! resume, status lookup, business listings, live progress subscriptions,
//! plus the lifecycle adapter the upload engine reports into.

pub mod constants;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-exports
pub use engine::{EngineEventSender, UploadInfo};
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
