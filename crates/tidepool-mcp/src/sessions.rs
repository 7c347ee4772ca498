//! Session manager: one actor per session id.
//!
//! Actors reached through an expiring credential (an HTTP session token)
//! are cached only until that credential expires. Dropping a stale actor
//! keeps its durable record; only [`SessionManager::evict`] deletes state.

use crate::actor::SessionActor;
use crate::error::McpError;
use crate::state::{SessionStatePatch, SessionStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tidepool_backend::ClientFactory;
use tidepool_core::ResolvedCredentials;
use tokio::sync::Mutex;

struct CachedActor {
    actor: Arc<SessionActor>,
    /// Unix seconds after which the entry is dropped; `None` never expires.
    expires_at: Option<i64>,
}

impl CachedActor {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn extend(&mut self, expires_at: Option<i64>) {
        self.expires_at = match (self.expires_at, expires_at) {
            (Some(current), Some(next)) => Some(current.max(next)),
            _ => None,
        };
    }
}

/// Creates, caches and evicts session actors.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clients: Arc<dyn ClientFactory>,
    defaults: Option<ResolvedCredentials>,
    actors: Mutex<HashMap<String, CachedActor>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clients: Arc<dyn ClientFactory>) -> Self {
        Self {
            store,
            clients,
            defaults: None,
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// Deployment-wide credentials used to seed sessions that have no record.
    pub fn with_defaults(mut self, defaults: Option<ResolvedCredentials>) -> Self {
        self.defaults = defaults;
        self
    }

    /// The actor for `session_id`, created and initialized on first use.
    ///
    /// The actor stays cached until evicted.
    pub async fn actor(&self, session_id: &str) -> Result<Arc<SessionActor>, McpError> {
        self.actor_until(session_id, None).await
    }

    /// Like [`actor`](Self::actor), but the cached entry lapses at
    /// `expires_at` (unix seconds) unless a later call extends it.
    pub async fn actor_until(
        &self,
        session_id: &str,
        expires_at: Option<i64>,
    ) -> Result<Arc<SessionActor>, McpError> {
        let mut actors = self.actors.lock().await;
        prune_expired(&mut actors, Utc::now().timestamp());

        if let Some(entry) = actors.get_mut(session_id) {
            entry.extend(expires_at);
            return Ok(entry.actor.clone());
        }

        self.seed_defaults(session_id).await?;

        let actor = Arc::new(SessionActor::new(
            session_id,
            self.store.clone(),
            self.clients.clone(),
        ));
        actor.init().await;
        actors.insert(
            session_id.to_string(),
            CachedActor {
                actor: actor.clone(),
                expires_at,
            },
        );

        tracing::debug!(session_id = %session_id, expires_at = ?expires_at, "Session actor created");
        Ok(actor)
    }

    // Only a session with no stored record is seeded, so a later `configure`
    // always wins over the defaults.
    async fn seed_defaults(&self, session_id: &str) -> Result<(), McpError> {
        let Some(defaults) = &self.defaults else {
            return Ok(());
        };
        if self.store.exists(session_id).await? {
            return Ok(());
        }

        self.store
            .update(
                session_id,
                SessionStatePatch::replace_credentials(
                    defaults.endpoint_url.clone(),
                    defaults.anon_key.clone(),
                    defaults.service_key.clone(),
                ),
            )
            .await?;
        tracing::info!(session_id = %session_id, "Seeded session from default credentials");
        Ok(())
    }

    /// Drop the session's actor and delete its durable state.
    ///
    /// The dropped actor's state handle is closed first, so a tool call
    /// still running on it cannot write the record back after the delete.
    /// Returns whether an actor was live.
    pub async fn evict(&self, session_id: &str) -> Result<bool, McpError> {
        let removed = self.actors.lock().await.remove(session_id);
        let was_live = removed.is_some();
        if let Some(entry) = removed {
            entry.actor.state().close().await;
        }
        self.store.delete(session_id).await?;
        tracing::info!(session_id = %session_id, was_live, "Session evicted");
        Ok(was_live)
    }

    /// Ids of sessions with a live actor, sorted.
    pub async fn active_sessions(&self) -> Vec<String> {
        let mut actors = self.actors.lock().await;
        prune_expired(&mut actors, Utc::now().timestamp());
        let mut ids: Vec<String> = actors.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn prune_expired(actors: &mut HashMap<String, CachedActor>, now: i64) {
    actors.retain(|session_id, entry| {
        let keep = !entry.is_expired(now);
        if !keep {
            tracing::debug!(session_id = %session_id, "Dropping expired session actor");
        }
        keep
    });
}
