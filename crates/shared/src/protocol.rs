//! JSON payloads exchanged with the story feed API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Story, StoryFields, StoryId, StorySet, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub user: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRequest {
    pub token: String,
    pub story: StoryFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryResponse {
    pub story: StoryPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoriesResponse {
    pub stories: Vec<StoryPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPayload {
    pub story_id: StoryId,
    pub author: String,
    pub title: String,
    pub url: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoryPayload> for Story {
    fn from(value: StoryPayload) -> Self {
        Story {
            story_id: value.story_id,
            author: value.author,
            title: value.title,
            url: value.url,
            username: value.username,
            created_at: value.created_at,
        }
    }
}

impl From<&Story> for StoryPayload {
    fn from(value: &Story) -> Self {
        StoryPayload {
            story_id: value.story_id.clone(),
            author: value.author.clone(),
            title: value.title.clone(),
            url: value.url.clone(),
            username: value.username.clone(),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub username: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub favorites: Vec<StoryPayload>,
    #[serde(default)]
    pub stories: Vec<StoryPayload>,
}

impl UserPayload {
    /// The API never echoes the token inside the user object, so the caller
    /// supplies the one it authenticated with.
    pub fn into_user(self, login_token: impl Into<String>) -> User {
        User {
            username: self.username,
            name: self.name,
            created_at: self.created_at,
            login_token: login_token.into(),
            own_stories: self.stories.into_iter().map(Story::from).collect::<StorySet>(),
            favorites: self
                .favorites
                .into_iter()
                .map(Story::from)
                .collect::<StorySet>(),
        }
    }
}

impl From<&User> for UserPayload {
    fn from(value: &User) -> Self {
        UserPayload {
            username: value.username.clone(),
            name: value.name.clone(),
            created_at: value.created_at,
            favorites: value.favorites.iter().map(StoryPayload::from).collect(),
            stories: value.own_stories.iter().map(StoryPayload::from).collect(),
        }
    }
}
