//! Durable per-session state.
//!
//! Each session owns one record holding whether it has been configured and
//! the backend credentials supplied by the `configure` tool. Records live in
//! an embedded SQLite database so they outlive any single request.
//!
//! [`SessionStateStore::update`] is the only mutation path. Snapshots
//! returned by [`SessionStateStore::read`] are plain values; changing one
//! has no effect on storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tidepool_core::StoreConfig;
use tokio::sync::RwLock;

/// Errors raised by a session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("session store error: {0}")]
    Database(#[from] sqlx::Error),

    /// A patch would leave the session in an inconsistent state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// The session was evicted; its actor may no longer write.
    #[error("session {0} has been evicted")]
    Evicted(String),

    /// The store location could not be prepared.
    #[error("session store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot of one session's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_configured: bool,
    pub endpoint_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_key: Option<String>,
}

impl SessionState {
    /// Apply a patch, returning the merged state.
    pub fn merged(&self, patch: &SessionStatePatch) -> SessionState {
        SessionState {
            is_configured: patch.is_configured.unwrap_or(self.is_configured),
            endpoint_url: patch
                .endpoint_url
                .clone()
                .unwrap_or_else(|| self.endpoint_url.clone()),
            anon_key: patch
                .anon_key
                .clone()
                .unwrap_or_else(|| self.anon_key.clone()),
            service_key: patch
                .service_key
                .clone()
                .unwrap_or_else(|| self.service_key.clone()),
        }
    }

    /// A configured session has a non-empty endpoint URL and anonymous key.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.is_configured {
            if is_blank(&self.endpoint_url) {
                return Err(StoreError::InvalidState(
                    "configured session requires an endpoint URL".to_string(),
                ));
            }
            if is_blank(&self.anon_key) {
                return Err(StoreError::InvalidState(
                    "configured session requires an anon key".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Fields to merge into a session's state.
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatePatch {
    pub is_configured: Option<bool>,
    pub endpoint_url: Option<Option<String>>,
    pub anon_key: Option<Option<String>>,
    pub service_key: Option<Option<String>>,
}

impl SessionStatePatch {
    /// Replace every credential and mark the session configured.
    ///
    /// An absent `service_key` clears any previously stored one.
    pub fn replace_credentials(
        endpoint_url: impl Into<String>,
        anon_key: impl Into<String>,
        service_key: Option<String>,
    ) -> Self {
        Self {
            is_configured: Some(true),
            endpoint_url: Some(Some(endpoint_url.into())),
            anon_key: Some(Some(anon_key.into())),
            service_key: Some(service_key),
        }
    }
}

/// Storage backend for session records, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state; a session with no record reads as the initial state.
    async fn read(&self, session_id: &str) -> Result<SessionState, StoreError>;

    /// Merge `patch` into the session's state atomically and persist it.
    async fn update(
        &self,
        session_id: &str,
        patch: SessionStatePatch,
    ) -> Result<SessionState, StoreError>;

    /// Remove the session's record.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;

    /// Whether a record exists for the session.
    async fn exists(&self, session_id: &str) -> Result<bool, StoreError>;
}

/// SQLite-backed session store.
///
/// The pool holds a single connection, so each read-merge-write transaction
/// runs alone and no two updates interleave.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the store described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        Self::connect(&config.connection_url()).await
    }

    /// Connect to a sqlx SQLite URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        Self::with_options(options).await
    }

    /// A private in-memory store; contents vanish with the store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::with_options(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        // An in-memory database lives only as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                session_id    TEXT PRIMARY KEY NOT NULL,
                is_configured BOOLEAN NOT NULL DEFAULT 0,
                endpoint_url  TEXT,
                anon_key      TEXT,
                service_key   TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn fetch_state<'e, E>(executor: E, session_id: &str) -> Result<Option<SessionState>, StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT is_configured, endpoint_url, anon_key, service_key \
         FROM session_state WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| state_from_row(&row)).transpose()
}

fn state_from_row(row: &SqliteRow) -> Result<SessionState, StoreError> {
    Ok(SessionState {
        is_configured: row.try_get("is_configured")?,
        endpoint_url: row.try_get("endpoint_url")?,
        anon_key: row.try_get("anon_key")?,
        service_key: row.try_get("service_key")?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn read(&self, session_id: &str) -> Result<SessionState, StoreError> {
        Ok(fetch_state(&self.pool, session_id)
            .await?
            .unwrap_or_default())
    }

    async fn update(
        &self,
        session_id: &str,
        patch: SessionStatePatch,
    ) -> Result<SessionState, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = fetch_state(&mut *tx, session_id).await?.unwrap_or_default();
        let next = current.merged(&patch);
        // Returning early drops the transaction, which rolls it back.
        next.validate()?;

        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, is_configured, endpoint_url, anon_key, service_key)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                is_configured = excluded.is_configured,
                endpoint_url  = excluded.endpoint_url,
                anon_key      = excluded.anon_key,
                service_key   = excluded.service_key
            "#,
        )
        .bind(session_id)
        .bind(next.is_configured)
        .bind(next.endpoint_url.as_deref())
        .bind(next.anon_key.as_deref())
        .bind(next.service_key.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            session_id = %session_id,
            is_configured = next.is_configured,
            "Session state updated"
        );
        Ok(next)
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_state WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM session_state WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// A session store bound to one session id.
///
/// This is the actor-local view handed to tool handlers.
#[derive(Clone)]
pub struct SessionStateStore {
    store: Arc<dyn SessionStore>,
    session_id: String,
    closed: Arc<RwLock<bool>>,
}

impl SessionStateStore {
    pub fn new(store: Arc<dyn SessionStore>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            closed: Arc::new(RwLock::new(false)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current snapshot of the session's state.
    pub async fn read(&self) -> Result<SessionState, StoreError> {
        self.store.read(&self.session_id).await
    }

    /// Merge `patch` into the session's state and persist it.
    ///
    /// Fails with [`StoreError::Evicted`] once [`close`](Self::close) ran.
    pub async fn update(&self, patch: SessionStatePatch) -> Result<SessionState, StoreError> {
        // Held across the write so `close` waits for in-flight updates.
        let closed = self.closed.read().await;
        if *closed {
            return Err(StoreError::Evicted(self.session_id.clone()));
        }
        self.store.update(&self.session_id, patch).await
    }

    /// Refuse all later updates through this handle and its clones.
    ///
    /// Returns once every update already in flight has committed.
    pub async fn close(&self) {
        *self.closed.write().await = true;
    }

    /// Remove the session's record.
    pub async fn delete(&self) -> Result<(), StoreError> {
        self.store.delete(&self.session_id).await
    }
}
