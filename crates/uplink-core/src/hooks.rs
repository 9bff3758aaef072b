//! Collaborator traits
//!
//! The upload service resolves API keys through [`IdentityLookup`] so it does
//! not depend on where the business registry is stored.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::Business;

/// Resolves an API key to the business that owns it.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// `Ok(None)` when no business owns the key; `Err` when the registry
    /// itself could not be consulted.
    async fn business_by_api_key(&self, api_key: &str) -> Result<Option<Business>, AppError>;
}
