use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::domain::{Session, User};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::{error::ClientError, FeedEvent, RemoteUserService, SessionStore};

/// Owner of the single `current_user` snapshot.
///
/// Writers (`restore`, `login`, `signup`, `refresh`) take the mutation slot
/// for the whole remote round trip, so they never interleave. `logout` skips
/// the slot and bumps the generation instead; a writer that started before the
/// logout sees a stale generation and drops its result.
pub struct UserContext {
    remote: Arc<dyn RemoteUserService>,
    sessions: Arc<dyn SessionStore>,
    current: RwLock<Option<Arc<User>>>,
    generation: AtomicU64,
    mutation: Mutex<()>,
    events: broadcast::Sender<FeedEvent>,
}

impl UserContext {
    pub fn new(
        remote: Arc<dyn RemoteUserService>,
        sessions: Arc<dyn SessionStore>,
        events: broadcast::Sender<FeedEvent>,
    ) -> Self {
        Self {
            remote,
            sessions,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            mutation: Mutex::new(()),
            events,
        }
    }

    pub async fn current(&self) -> Option<Arc<User>> {
        self.current.read().await.clone()
    }

    /// Rebuilds the user from persisted credentials. Any failure yields the
    /// logged-out state instead of an error.
    pub async fn restore(&self) -> Option<Arc<User>> {
        let _slot = self.mutation.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);

        let session = match self.sessions.load().await {
            Ok(session) => session,
            Err(err) => {
                warn!("session: failed to read persisted session, starting logged out: {err:#}");
                None
            }
        };

        let Some(session) = session else {
            info!("session: no persisted session");
            self.install(generation, None).await;
            return None;
        };

        match self
            .remote
            .fetch_by_token(&session.token, &session.username)
            .await
        {
            Ok(user) => {
                info!(username = %user.username, "session: restored");
                self.install(generation, Some(Arc::new(user))).await.flatten()
            }
            Err(err) => {
                self.degrade(generation, &session.username, err.into())
                    .await;
                None
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Arc<User>, ClientError> {
        let _slot = self.mutation.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);

        let user = self.remote.login(username, password).await.map_err(|err| {
            warn!(username, "session: login rejected: {err}");
            ClientError::from(err)
        })?;
        self.authenticated(generation, user).await
    }

    pub async fn signup(
        &self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<Arc<User>, ClientError> {
        let _slot = self.mutation.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);

        let user = self
            .remote
            .signup(username, password, name)
            .await
            .map_err(|err| {
                warn!(username, "session: signup rejected: {err}");
                ClientError::from(err)
            })?;
        self.authenticated(generation, user).await
    }

    pub async fn logout(&self) {
        let previous = {
            let mut current = self.current.write().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            current.take()
        };

        if let Err(err) = self.sessions.clear().await {
            warn!("session: failed to clear persisted session: {err:#}");
        }

        if let Some(user) = previous {
            info!(username = %user.username, "session: logged out");
        }
        let _ = self.events.send(FeedEvent::UserChanged { username: None });
    }

    /// Replaces the snapshot with the server's view of the current user.
    /// Failure degrades to logged out.
    ///
    /// Uses the token and username held with the current snapshot. They are
    /// the pair `login`/`restore` wrote to or read from the session store, and
    /// they stay usable for this process even when persisting them failed.
    pub async fn refresh(&self) -> Option<Arc<User>> {
        let _slot = self.mutation.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);

        let session = self.current().await.map(|user| user.session())?;

        match self
            .remote
            .fetch_by_token(&session.token, &session.username)
            .await
        {
            Ok(user) => self.install(generation, Some(Arc::new(user))).await.flatten(),
            Err(err) => {
                self.degrade(generation, &session.username, err.into())
                    .await;
                None
            }
        }
    }

    /// Persists first, then installs. A logout that lands while the save is
    /// pending discards the user, and the save is cleared again here.
    async fn authenticated(&self, generation: u64, user: User) -> Result<Arc<User>, ClientError> {
        let session = user.session();
        self.persist(&session).await;

        let user = Arc::new(user);
        if self.install(generation, Some(Arc::clone(&user))).await.is_none() {
            if let Err(err) = self.sessions.clear().await {
                warn!("session: failed to clear session saved during logout: {err:#}");
            }
            return Err(ClientError::Precondition(
                "logged out before authentication completed".into(),
            ));
        }

        info!(username = %user.username, "session: authenticated");
        Ok(user)
    }

    async fn persist(&self, session: &Session) {
        if let Err(err) = self.sessions.save(session).await {
            warn!(
                username = %session.username,
                "session: failed to persist session, it will not survive a restart: {err:#}"
            );
        }
    }

    /// Swaps the snapshot unless a logout happened since `generation` was read.
    /// Returns `None` when the write was discarded.
    async fn install(&self, generation: u64, user: Option<Arc<User>>) -> Option<Option<Arc<User>>> {
        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            info!("session: discarding user snapshot superseded by logout");
            return None;
        }
        let username = user.as_ref().map(|user| user.username.clone());
        *current = user.clone();
        drop(current);

        let _ = self.events.send(FeedEvent::UserChanged { username });
        Some(user)
    }

    async fn degrade(&self, generation: u64, username: &str, err: ClientError) {
        warn!(username, "session: user refresh failed, continuing logged out: {err}");
        if err.is_auth() {
            if let Err(clear_err) = self.sessions.clear().await {
                warn!("session: failed to clear rejected session: {clear_err:#}");
            }
        }
        self.install(generation, None).await;
    }
}
