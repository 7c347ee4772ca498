//! Shared fixtures: an in-process backend stub and session helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tidepool_backend::{BackendClient, ClientError, ClientFactory};
use tidepool_mcp::{ActorStatus, SessionActor, SessionStore, SqliteSessionStore};

/// What the stub answers to `list_tables`.
#[derive(Clone)]
pub enum StubReply {
    Rows(Value),
    Error { status: u16, message: String },
    /// A 2xx answer whose body is not JSON.
    Garbled,
}

/// A client created by the stub factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedClient {
    pub endpoint_url: String,
    pub key: String,
    pub service: bool,
}

/// Counts clients and calls; answers with a canned reply.
pub struct StubBackend {
    reply: Mutex<StubReply>,
    calls: AtomicUsize,
    created: Mutex<Vec<CreatedClient>>,
}

impl StubBackend {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn with_rows(rows: Value) -> Arc<Self> {
        Self::new(StubReply::Rows(rows))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<CreatedClient> {
        self.created.lock().unwrap().clone()
    }

    pub fn set_reply(&self, reply: StubReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn factory(self: &Arc<Self>) -> Arc<dyn ClientFactory> {
        Arc::new(StubFactory {
            backend: self.clone(),
        })
    }
}

struct StubFactory {
    backend: Arc<StubBackend>,
}

impl StubFactory {
    fn build(
        &self,
        endpoint_url: &str,
        key: &str,
        service: bool,
    ) -> Result<Box<dyn BackendClient>, ClientError> {
        tidepool_backend::require_credentials(endpoint_url, key)?;
        self.backend.created.lock().unwrap().push(CreatedClient {
            endpoint_url: endpoint_url.to_string(),
            key: key.to_string(),
            service,
        });
        Ok(Box::new(StubClient {
            backend: self.backend.clone(),
        }))
    }
}

impl ClientFactory for StubFactory {
    fn create_client(&self, endpoint_url: &str, key: &str) -> Result<Box<dyn BackendClient>, ClientError> {
        self.build(endpoint_url, key, false)
    }

    fn create_service_client(
        &self,
        endpoint_url: &str,
        service_key: &str,
    ) -> Result<Box<dyn BackendClient>, ClientError> {
        self.build(endpoint_url, service_key, true)
    }
}

struct StubClient {
    backend: Arc<StubBackend>,
}

#[async_trait]
impl BackendClient for StubClient {
    async fn list_tables(&self) -> Result<Value, ClientError> {
        self.backend.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.backend.reply.lock().unwrap().clone();
        match reply {
            StubReply::Rows(rows) => Ok(rows),
            StubReply::Error { status, message } => Err(ClientError::Backend { status, message }),
            StubReply::Garbled => Err(ClientError::Decode("expected value at line 1 column 1".to_string())),
        }
    }
}

pub fn sample_tables() -> Value {
    json!([
        {"schema": "public", "name": "customers", "comment": "Paying customers"},
        {"schema": "public", "name": "orders", "comment": null},
        {"schema": "billing", "name": "invoices", "comment": null}
    ])
}

pub async fn memory_store() -> Arc<dyn SessionStore> {
    Arc::new(SqliteSessionStore::in_memory().await.unwrap())
}

/// A ready actor for `session_id`.
pub async fn ready_actor(
    session_id: &str,
    store: Arc<dyn SessionStore>,
    backend: &Arc<StubBackend>,
) -> SessionActor {
    let actor = SessionActor::new(session_id, store, backend.factory());
    assert_eq!(actor.init().await, ActorStatus::Ready);
    actor
}

pub fn configure_args(endpoint_url: &str, anon_key: &str) -> Value {
    json!({"endpointUrl": endpoint_url, "anonKey": anon_key})
}
