use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool};
use uplink_core::{
    models::{generate_token, Business},
    AppError, IdentityLookup,
};

/// Repository for the `business` table
#[derive(Clone)]
pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the business owning an API key
    #[tracing::instrument(skip(self, api_key), fields(db.table = "business", db.operation = "select"))]
    pub async fn get_by_api_key(&self, api_key: &str) -> Result<Option<Business>, AppError> {
        let business = sqlx::query_as::<Sqlite, Business>(
            "SELECT id, name, email, api_key, created_at FROM business WHERE api_key = ?",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(business)
    }

    /// Register a business with a freshly generated API key
    #[tracing::instrument(skip(self), fields(db.table = "business", db.operation = "insert"))]
    pub async fn create(&self, name: &str, email: &str) -> Result<Business, AppError> {
        let api_key = generate_token();

        let business = sqlx::query_as::<Sqlite, Business>(
            r#"
            INSERT INTO business (name, email, api_key)
            VALUES (?, ?, ?)
            RETURNING id, name, email, api_key, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(&api_key)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(business_id = business.id, "Business registered");
        Ok(business)
    }
}

#[async_trait]
impl IdentityLookup for BusinessRepository {
    async fn business_by_api_key(&self, api_key: &str) -> Result<Option<Business>, AppError> {
        self.get_by_api_key(api_key).await
    }
}
