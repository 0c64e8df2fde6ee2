//! Metadata log storage backend.
//!
//! One table keyed by unique `path` records every landed file the service
//! has seen. This service only ever inserts new unprocessed rows; the
//! `processed` / `process_fail` flags are flipped by the downstream
//! conversion stages.

use async_trait::async_trait;
use snafu::prelude::*;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::{ConnectSnafu, InsertSnafu, StoreError};

/// Write interface to the metadata log.
///
/// The coordinator is the only component holding an implementation, which
/// is what makes the single-writer discipline enforceable.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Insert a newly discovered path as an unprocessed record.
    ///
    /// The `path` column carries a uniqueness constraint, so re-inserting
    /// an already recorded path fails rather than duplicating it.
    async fn insert_unprocessed(&self, path: &str) -> Result<(), StoreError>;
}

/// Postgres-backed metadata log.
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    /// Connect to the metadata database.
    ///
    /// The pool is sized for the coordinator's single-writer usage.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .context(ConnectSnafu)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn insert_unprocessed(&self, path: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO metadata_log (path, processed, process_fail) \
             VALUES ($1, FALSE, FALSE)",
        )
        .bind(path)
        .execute(&self.pool)
        .await
        .context(InsertSnafu { path })?;

        Ok(())
    }
}
