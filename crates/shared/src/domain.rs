use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(StoryId);

/// Persisted proof of authentication. Both halves are required.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
}

impl Session {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
        }
    }

    /// Rebuilds a session from independently stored fields. A missing or blank
    /// half means there is no session at all.
    pub fn from_parts(token: Option<String>, username: Option<String>) -> Option<Self> {
        let token = token.filter(|value| !value.trim().is_empty())?;
        let username = username.filter(|value| !value.trim().is_empty())?;
        Some(Self { token, username })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub story_id: StoryId,
    pub author: String,
    pub title: String,
    pub url: String,
    /// Username of the account that posted the story.
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl Story {
    pub fn fields(&self) -> StoryFields {
        StoryFields {
            author: self.author.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// The user-editable part of a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryFields {
    pub author: String,
    pub title: String,
    pub url: String,
}

impl StoryFields {
    pub fn new(
        author: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    /// Returns the name of the first blank field, if any.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("author", &self.author),
            ("title", &self.title),
            ("url", &self.url),
        ]
        .into_iter()
        .find_map(|(name, value)| value.trim().is_empty().then_some(name))
    }
}

/// Insertion-ordered stories with an id index; ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorySet {
    stories: Vec<Story>,
    ids: HashSet<StoryId>,
}

impl StorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, story_id: &StoryId) -> bool {
        self.ids.contains(story_id)
    }

    pub fn get(&self, story_id: &StoryId) -> Option<&Story> {
        if !self.contains(story_id) {
            return None;
        }
        self.stories.iter().find(|story| &story.story_id == story_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Story> {
        self.stories.iter()
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &StoryId> {
        self.stories.iter().map(|story| &story.story_id)
    }
}

impl FromIterator<Story> for StorySet {
    /// Keeps the first occurrence of each story id.
    fn from_iter<I: IntoIterator<Item = Story>>(iter: I) -> Self {
        let mut set = StorySet::new();
        for story in iter {
            if set.ids.insert(story.story_id.clone()) {
                set.stories.push(story);
            }
        }
        set
    }
}

impl<'a> IntoIterator for &'a StorySet {
    type Item = &'a Story;
    type IntoIter = std::slice::Iter<'a, Story>;

    fn into_iter(self) -> Self::IntoIter {
        self.stories.iter()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub login_token: String,
    pub own_stories: StorySet,
    pub favorites: StorySet,
}

impl User {
    pub fn session(&self) -> Session {
        Session::new(self.login_token.clone(), self.username.clone())
    }

    pub fn has_favorite(&self, story_id: &StoryId) -> bool {
        self.favorites.contains(story_id)
    }

    pub fn owns(&self, story: &Story) -> bool {
        story.username == self.username
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: self.name.clone(),
            username: self.username.clone(),
            account_created: self.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("login_token", &"<redacted>")
            .field("own_stories", &self.own_stories.len())
            .field("favorites", &self.favorites.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub username: String,
    /// `YYYY-MM-DD`
    pub account_created: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationContext {
    All,
    Own,
    Favorites,
}

impl NavigationContext {
    pub fn shows_placeholder_when_empty(self) -> bool {
        !matches!(self, NavigationContext::All)
    }
}
