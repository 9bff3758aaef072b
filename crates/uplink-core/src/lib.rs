//! Uplink Core Library
//!
//! This crate provides domain models, error types and configuration shared by
//! the store, registry and API crates.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::{Config, RateLimitClass, StoreBackend};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::IdentityLookup;
