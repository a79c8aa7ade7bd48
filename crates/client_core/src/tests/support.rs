//! In-process stand-in for the story feed API.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{Session, Story, StoryFields, StoryId, User},
    error::{ApiException, ErrorCode},
};
use tokio::sync::{Mutex, Notify};

use crate::{
    InMemorySessionStore, RemoteResult, RemoteStoryService, RemoteUserService, SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Login,
    Signup,
    FetchByToken,
    AddFavorite,
    RemoveFavorite,
    FetchAll,
    Create,
    Update,
    Delete,
}

struct Account {
    password: String,
    name: String,
    token: String,
    favorites: Vec<StoryId>,
}

#[derive(Default)]
struct FakeState {
    accounts: HashMap<String, Account>,
    stories: Vec<Story>,
    failing: HashMap<Op, ApiException>,
    next_story: u32,
}

/// Parks a call until released. `entered` fires once the call is parked.
#[derive(Default)]
pub(crate) struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Session store whose `save` waits at the gate.
pub(crate) struct GatedSessionStore {
    inner: InMemorySessionStore,
    gate: Arc<Gate>,
}

impl GatedSessionStore {
    pub(crate) fn new(gate: Arc<Gate>) -> Self {
        Self {
            inner: InMemorySessionStore::new(),
            gate,
        }
    }
}

#[async_trait]
impl SessionStore for GatedSessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        self.inner.load().await
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        self.gate.pass().await;
        self.inner.save(session).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.inner.clear().await
    }
}

/// Session store that cannot write.
pub(crate) struct ReadOnlySessionStore;

#[async_trait]
impl SessionStore for ReadOnlySessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        Ok(None)
    }

    async fn save(&self, _session: &Session) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("session storage is read-only"))
    }

    async fn clear(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeFeedService {
    state: Mutex<FakeState>,
    calls: Mutex<HashMap<Op, usize>>,
    favorite_gate: Option<Arc<Gate>>,
    token_counter: AtomicUsize,
}

impl FakeFeedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `add_favorite` parks until the gate is released.
    pub(crate) fn with_favorite_gate(gate: Arc<Gate>) -> Self {
        Self {
            favorite_gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) async fn add_account(&self, username: &str, password: &str, name: &str) {
        let token = self.issue_token(username);
        self.state.lock().await.accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                name: name.to_string(),
                token,
                favorites: Vec::new(),
            },
        );
    }

    pub(crate) async fn token_for(&self, username: &str) -> String {
        self.state
            .lock()
            .await
            .accounts
            .get(username)
            .map(|account| account.token.clone())
            .unwrap_or_default()
    }

    pub(crate) async fn seed_story(&self, username: &str, title: &str, url: &str) -> StoryId {
        let mut state = self.state.lock().await;
        insert_story(
            &mut state,
            username,
            &StoryFields::new("Seed Author", title, url),
        )
        .story_id
    }

    pub(crate) async fn fail(&self, op: Op, code: ErrorCode) {
        self.state
            .lock()
            .await
            .failing
            .insert(op, ApiException::new(code, format!("{op:?} failed")));
    }

    pub(crate) async fn recover(&self, op: Op) {
        self.state.lock().await.failing.remove(&op);
    }

    pub(crate) async fn calls(&self, op: Op) -> usize {
        self.calls.lock().await.get(&op).copied().unwrap_or(0)
    }

    pub(crate) async fn story_ids(&self) -> Vec<StoryId> {
        self.state
            .lock()
            .await
            .stories
            .iter()
            .map(|story| story.story_id.clone())
            .collect()
    }

    fn issue_token(&self, username: &str) -> String {
        let n = self.token_counter.fetch_add(1, Ordering::SeqCst);
        format!("token-{username}-{n}")
    }

    async fn record(&self, op: Op) -> RemoteResult<()> {
        *self.calls.lock().await.entry(op).or_default() += 1;
        match self.state.lock().await.failing.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn authorized(&self, user: &User) -> RemoteResult<()> {
        let state = self.state.lock().await;
        match state.accounts.get(&user.username) {
            Some(account) if account.token == user.login_token => Ok(()),
            _ => Err(ApiException::new(ErrorCode::Unauthorized, "invalid token")),
        }
    }
}

fn insert_story(state: &mut FakeState, username: &str, fields: &StoryFields) -> Story {
    state.next_story += 1;
    let story = Story {
        story_id: StoryId::new(format!("story-{}", state.next_story)),
        author: fields.author.clone(),
        title: fields.title.clone(),
        url: fields.url.clone(),
        username: username.to_string(),
        created_at: Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
            + chrono::Duration::minutes(i64::from(state.next_story)),
    };
    // Newest first, like the real API.
    state.stories.insert(0, story.clone());
    story
}

fn build_user(state: &FakeState, username: &str) -> RemoteResult<User> {
    let account = state
        .accounts
        .get(username)
        .ok_or_else(|| ApiException::new(ErrorCode::NotFound, "no such user"))?;
    let own_stories = state
        .stories
        .iter()
        .filter(|story| story.username == username)
        .cloned()
        .collect();
    let favorites = account
        .favorites
        .iter()
        .filter_map(|id| state.stories.iter().find(|story| &story.story_id == id))
        .cloned()
        .collect();
    Ok(User {
        username: username.to_string(),
        name: account.name.clone(),
        created_at: Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap(),
        login_token: account.token.clone(),
        own_stories,
        favorites,
    })
}

#[async_trait]
impl RemoteUserService for FakeFeedService {
    async fn login(&self, username: &str, password: &str) -> RemoteResult<User> {
        self.record(Op::Login).await?;
        let state = self.state.lock().await;
        match state.accounts.get(username) {
            Some(account) if account.password == password => build_user(&state, username),
            _ => Err(ApiException::new(ErrorCode::Unauthorized, "invalid credentials")),
        }
    }

    async fn signup(&self, username: &str, password: &str, name: &str) -> RemoteResult<User> {
        self.record(Op::Signup).await?;
        if self.state.lock().await.accounts.contains_key(username) {
            return Err(ApiException::new(ErrorCode::Validation, "username taken"));
        }
        self.add_account(username, password, name).await;
        build_user(&*self.state.lock().await, username)
    }

    async fn fetch_by_token(&self, token: &str, username: &str) -> RemoteResult<User> {
        self.record(Op::FetchByToken).await?;
        let state = self.state.lock().await;
        match state.accounts.get(username) {
            Some(account) if account.token == token => build_user(&state, username),
            _ => Err(ApiException::new(ErrorCode::Unauthorized, "invalid token")),
        }
    }

    async fn add_favorite(&self, user: &User, story_id: &StoryId) -> RemoteResult<()> {
        if let Some(gate) = &self.favorite_gate {
            gate.pass().await;
        }
        self.record(Op::AddFavorite).await?;
        self.authorized(user).await?;
        let mut state = self.state.lock().await;
        if !state.stories.iter().any(|story| &story.story_id == story_id) {
            return Err(ApiException::new(ErrorCode::NotFound, "no such story"));
        }
        if let Some(account) = state.accounts.get_mut(&user.username) {
            if !account.favorites.contains(story_id) {
                account.favorites.push(story_id.clone());
            }
        }
        Ok(())
    }

    async fn remove_favorite(&self, user: &User, story_id: &StoryId) -> RemoteResult<()> {
        self.record(Op::RemoveFavorite).await?;
        self.authorized(user).await?;
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(&user.username) {
            account.favorites.retain(|id| id != story_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStoryService for FakeFeedService {
    async fn fetch_all(&self) -> RemoteResult<Vec<Story>> {
        self.record(Op::FetchAll).await?;
        Ok(self.state.lock().await.stories.clone())
    }

    async fn create(&self, user: &User, fields: &StoryFields) -> RemoteResult<Story> {
        self.record(Op::Create).await?;
        self.authorized(user).await?;
        let mut state = self.state.lock().await;
        Ok(insert_story(&mut state, &user.username, fields))
    }

    async fn update(
        &self,
        user: &User,
        story_id: &StoryId,
        fields: &StoryFields,
    ) -> RemoteResult<Story> {
        self.record(Op::Update).await?;
        self.authorized(user).await?;
        let mut state = self.state.lock().await;
        let story = state
            .stories
            .iter_mut()
            .find(|story| &story.story_id == story_id)
            .ok_or_else(|| ApiException::new(ErrorCode::NotFound, "no such story"))?;
        if story.username != user.username {
            return Err(ApiException::new(ErrorCode::Forbidden, "not the owner"));
        }
        story.author = fields.author.clone();
        story.title = fields.title.clone();
        story.url = fields.url.clone();
        Ok(story.clone())
    }

    async fn delete(&self, user: &User, story_id: &StoryId) -> RemoteResult<()> {
        self.record(Op::Delete).await?;
        self.authorized(user).await?;
        let mut state = self.state.lock().await;
        let owner = state
            .stories
            .iter()
            .find(|story| &story.story_id == story_id)
            .map(|story| story.username.clone())
            .ok_or_else(|| ApiException::new(ErrorCode::NotFound, "no such story"))?;
        if owner != user.username {
            return Err(ApiException::new(ErrorCode::Forbidden, "not the owner"));
        }
        state.stories.retain(|story| &story.story_id != story_id);
        for account in state.accounts.values_mut() {
            account.favorites.retain(|id| id != story_id);
        }
        Ok(())
    }
}
