//! Data models for the application
//!
//! Session and token records kept in the ephemeral store, the frames pushed to
//! progress subscribers, and the business identity read from the registry.

mod business;
mod progress;
mod session;
mod token;

pub use business::*;
pub use progress::*;
pub use session::*;
pub use token::*;
