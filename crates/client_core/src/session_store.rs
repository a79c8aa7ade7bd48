use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::domain::Session;
use storage::Storage;
use tokio::sync::Mutex;

use crate::SessionStore;

/// Keeps the session for the lifetime of the process only.
#[derive(Default)]
pub struct InMemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.slot.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

/// Session persisted in the local SQLite database so it survives restarts.
pub struct DurableSessionStore {
    store: Storage,
}

impl DurableSessionStore {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize session storage at '{database_url}'"))?;
        Ok(Arc::new(Self { store }))
    }

    pub fn from_storage(store: Storage) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionStore for DurableSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        self.store.load_session().await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.store.save_session(session).await
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear_session().await
    }
}
