use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{NavigationContext, Session, Story, StoryFields, StoryId, User, UserProfile},
    error::ApiException,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod coordinator;
pub mod error;
pub mod favorites;
pub mod session_store;
pub mod story_catalog;
pub mod transport;
pub mod user_context;
pub mod view;

pub use coordinator::{StoryCoordinator, StoryMutation};
pub use error::ClientError;
pub use favorites::{FavoriteOutcome, FavoriteReconciler};
pub use session_store::{DurableSessionStore, InMemorySessionStore};
pub use story_catalog::StoryCatalog;
pub use transport::HttpFeedService;
pub use user_context::UserContext;
pub use view::{display_host, render, StoryListView, StoryViewModel};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type RemoteResult<T> = std::result::Result<T, ApiException>;

#[async_trait]
pub trait RemoteUserService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> RemoteResult<User>;
    async fn signup(&self, username: &str, password: &str, name: &str) -> RemoteResult<User>;
    async fn fetch_by_token(&self, token: &str, username: &str) -> RemoteResult<User>;
    async fn add_favorite(&self, user: &User, story_id: &StoryId) -> RemoteResult<()>;
    async fn remove_favorite(&self, user: &User, story_id: &StoryId) -> RemoteResult<()>;
}

/// Story CRUD. Ownership checks happen on the server.
#[async_trait]
pub trait RemoteStoryService: Send + Sync {
    async fn fetch_all(&self) -> RemoteResult<Vec<Story>>;
    async fn create(&self, user: &User, fields: &StoryFields) -> RemoteResult<Story>;
    async fn update(
        &self,
        user: &User,
        story_id: &StoryId,
        fields: &StoryFields,
    ) -> RemoteResult<Story>;
    async fn delete(&self, user: &User, story_id: &StoryId) -> RemoteResult<()>;
}

/// Key-value boundary for the persisted `{token, username}` pair. `save`
/// writes both fields or neither; `load` yields `None` unless both are there.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Emitted after a snapshot was replaced; the receiver should re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    UserChanged {
        username: Option<String>,
    },
    CatalogRefreshed {
        stories: usize,
    },
    FavoriteChanged {
        story_id: StoryId,
        favorited: bool,
    },
    StoryMutated {
        story_id: StoryId,
        mutation: StoryMutation,
    },
}

/// Entry point for the presentation layer.
pub struct FeedClient {
    users: Arc<UserContext>,
    catalog: Arc<StoryCatalog>,
    favorites: FavoriteReconciler,
    coordinator: StoryCoordinator,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedClient {
    pub fn new<R>(remote: Arc<R>) -> Self
    where
        R: RemoteUserService + RemoteStoryService + 'static,
    {
        Self::new_with_session_store(remote, Arc::new(InMemorySessionStore::new()))
    }

    pub fn new_with_session_store<R>(remote: Arc<R>, sessions: Arc<dyn SessionStore>) -> Self
    where
        R: RemoteUserService + RemoteStoryService + 'static,
    {
        let user_service: Arc<dyn RemoteUserService> = remote.clone();
        let story_service: Arc<dyn RemoteStoryService> = remote;
        Self::new_with_dependencies(user_service, story_service, sessions)
    }

    pub fn new_with_dependencies(
        user_service: Arc<dyn RemoteUserService>,
        story_service: Arc<dyn RemoteStoryService>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let users = Arc::new(UserContext::new(
            Arc::clone(&user_service),
            sessions,
            events.clone(),
        ));
        let catalog = Arc::new(StoryCatalog::new(
            Arc::clone(&story_service),
            events.clone(),
        ));
        let favorites = FavoriteReconciler::new(user_service, Arc::clone(&users), events.clone());
        let coordinator = StoryCoordinator::new(
            story_service,
            Arc::clone(&users),
            Arc::clone(&catalog),
            events.clone(),
        );

        Self {
            users,
            catalog,
            favorites,
            coordinator,
            events,
        }
    }

    /// Startup: rebuild the user from the persisted session and load the
    /// catalog. Never fails; problems leave the client logged out and/or with
    /// an empty catalog.
    pub async fn restore(&self) -> Option<Arc<User>> {
        let user = self.users.restore().await;
        if let Err(err) = self.catalog.refresh().await {
            warn!("stories: initial catalog load failed: {err}");
        }
        user
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Arc<User>, ClientError> {
        self.users.login(username, password).await
    }

    pub async fn signup(
        &self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<Arc<User>, ClientError> {
        self.users.signup(username, password, name).await
    }

    pub async fn logout(&self) {
        self.users.logout().await;
    }

    pub async fn current_user(&self) -> Option<Arc<User>> {
        self.users.current().await
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.users.current().await.map(|user| user.profile())
    }

    pub async fn refresh_stories(&self) -> Result<usize, ClientError> {
        self.catalog.refresh().await.map(|stories| stories.len())
    }

    pub async fn render(&self, context: NavigationContext) -> StoryListView {
        let user = self.users.current().await;
        let catalog = self.catalog.snapshot().await;
        view::render(context, user.as_deref(), &catalog)
    }

    pub async fn toggle_favorite(&self, story_id: &StoryId) -> Result<FavoriteOutcome, ClientError> {
        let Some(user) = self.users.current().await else {
            info!(story_id = %story_id, "favorites: ignoring toggle without a logged in user");
            return Ok(FavoriteOutcome::Anonymous);
        };
        self.favorites.toggle(&user, story_id).await
    }

    pub async fn create_story(&self, fields: &StoryFields) -> Result<Story, ClientError> {
        let user = self.require_user().await?;
        self.coordinator.create(&user, fields).await
    }

    pub async fn update_story(
        &self,
        story_id: &StoryId,
        fields: &StoryFields,
    ) -> Result<Story, ClientError> {
        let user = self.require_user().await?;
        self.coordinator.update(&user, story_id, fields).await
    }

    pub async fn delete_story(&self, story_id: &StoryId) -> Result<(), ClientError> {
        let user = self.require_user().await?;
        self.coordinator.delete(&user, story_id).await
    }

    /// Current values of one of the user's own stories, for prefilling an
    /// edit form.
    pub async fn edit_draft(&self, story_id: &StoryId) -> Option<StoryFields> {
        let user = self.users.current().await?;
        user.own_stories.get(story_id).map(Story::fields)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    async fn require_user(&self) -> Result<Arc<User>, ClientError> {
        self.users
            .current()
            .await
            .ok_or_else(ClientError::not_logged_in)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod view_tests;

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod transport_tests;
