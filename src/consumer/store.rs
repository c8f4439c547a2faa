//! Consumer persistence behind a small trait so the token lifecycle can be
//! exercised without a database.

use super::Consumer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::Instrument;

#[async_trait]
pub trait ConsumerStore: Send + Sync {
    /// Lookup by id; a miss is a normal negative result, not an error.
    async fn find_by_id(&self, id: i64) -> Result<Option<Consumer>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Consumer>>;

    /// Create a consumer with its initial starter token.
    /// Returns `Ok(None)` when the email is already taken.
    async fn create(&self, email: &str, starter_token: &str) -> Result<Option<Consumer>>;

    /// Replace the stored token field (starter cleartext or active digest).
    async fn update_token(&self, id: i64, token: &str) -> Result<()>;
}

/// Postgres-backed store used by the server.
#[derive(Debug, Clone)]
pub struct PgConsumerStore {
    pool: PgPool,
}

impl PgConsumerStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn row_to_consumer(row: &sqlx::postgres::PgRow) -> Consumer {
    Consumer {
        id: row.get("id"),
        email: row.get("email"),
        api_token: row.get("api_token"),
    }
}

#[async_trait]
impl ConsumerStore for PgConsumerStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Consumer>> {
        let query = "SELECT id, email, api_token FROM api_consumers WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup consumer by id")?;

        Ok(row.as_ref().map(row_to_consumer))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Consumer>> {
        let query = "SELECT id, email, api_token FROM api_consumers WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup consumer by email")?;

        Ok(row.as_ref().map(row_to_consumer))
    }

    async fn create(&self, email: &str, starter_token: &str) -> Result<Option<Consumer>> {
        let query = "INSERT INTO api_consumers (email, api_token) VALUES ($1, $2) \
                     RETURNING id, email, api_token";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(starter_token)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(row) => Ok(Some(row_to_consumer(&row))),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err).context("failed to create consumer"),
        }
    }

    async fn update_token(&self, id: i64, token: &str) -> Result<()> {
        let query = "UPDATE api_consumers SET api_token = $1 WHERE id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update consumer token")?;

        Ok(())
    }
}

/// In-memory store for unit and integration tests.
#[derive(Debug)]
pub struct MemoryConsumerStore {
    consumers: RwLock<HashMap<i64, Consumer>>,
    next_id: AtomicI64,
}

impl MemoryConsumerStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryConsumerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsumerStore for MemoryConsumerStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Consumer>> {
        Ok(self.consumers.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Consumer>> {
        Ok(self
            .consumers
            .read()
            .await
            .values()
            .find(|consumer| consumer.email == email)
            .cloned())
    }

    async fn create(&self, email: &str, starter_token: &str) -> Result<Option<Consumer>> {
        let mut consumers = self.consumers.write().await;

        if consumers.values().any(|consumer| consumer.email == email) {
            return Ok(None);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let consumer = Consumer {
            id,
            email: email.to_string(),
            api_token: Some(starter_token.to_string()),
        };
        consumers.insert(id, consumer.clone());

        Ok(Some(consumer))
    }

    async fn update_token(&self, id: i64, token: &str) -> Result<()> {
        if let Some(consumer) = self.consumers.write().await.get_mut(&id) {
            consumer.api_token = Some(token.to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryConsumerStore::new();

        let consumer = store
            .create("alice@example.com", "starter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(consumer.api_token.as_deref(), Some("starter"));

        let found = store.find_by_id(consumer.id).await.unwrap().unwrap();
        assert_eq!(found.email, "alice@example.com");

        let by_email = store
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, consumer.id);
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryConsumerStore::new();

        store.create("bob@example.com", "one").await.unwrap();
        let duplicate = store.create("bob@example.com", "two").await.unwrap();

        assert!(duplicate.is_none());
    }

    #[tokio::test]
    async fn memory_store_updates_token() {
        let store = MemoryConsumerStore::new();
        let consumer = store
            .create("carol@example.com", "starter")
            .await
            .unwrap()
            .unwrap();

        store.update_token(consumer.id, "digest").await.unwrap();
        let updated = store.find_by_id(consumer.id).await.unwrap().unwrap();
        assert_eq!(updated.api_token.as_deref(), Some("digest"));
    }
}
