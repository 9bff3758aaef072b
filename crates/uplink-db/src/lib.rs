//! Business registry
//!
//! SQLite-backed lookup of the businesses allowed to open upload sessions.
//! Registration happens out of band; the upload service only reads.

pub mod business;
pub mod pool;

pub use business::BusinessRepository;
pub use pool::{connect, run_migrations};
