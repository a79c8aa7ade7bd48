use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{StoryId, User};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{error::ClientError, user_context::UserContext, FeedEvent, RemoteUserService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Favorited,
    Unfavorited,
    /// Nobody is logged in; nothing was sent.
    Anonymous,
}

/// Favorite/unfavorite with the server as the only source of truth: the
/// remote call resolves first, then the user snapshot is refreshed. Nothing
/// local flips before confirmation.
pub struct FavoriteReconciler {
    remote: Arc<dyn RemoteUserService>,
    users: Arc<UserContext>,
    /// Keyed by `(username, story_id)`.
    inflight: Mutex<HashSet<(String, StoryId)>>,
    events: broadcast::Sender<FeedEvent>,
}

impl FavoriteReconciler {
    pub fn new(
        remote: Arc<dyn RemoteUserService>,
        users: Arc<UserContext>,
        events: broadcast::Sender<FeedEvent>,
    ) -> Self {
        Self {
            remote,
            users,
            inflight: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Flips the favorite state of `story_id` for `user`. A second toggle by
    /// the same user for the same story while one is in flight is rejected
    /// with [`ClientError::Busy`].
    pub async fn toggle(
        &self,
        user: &User,
        story_id: &StoryId,
    ) -> Result<FavoriteOutcome, ClientError> {
        let _inflight = {
            let key = (user.username.clone(), story_id.clone());
            if !lock_inflight(&self.inflight).insert(key.clone()) {
                info!(
                    username = %user.username,
                    story_id = %story_id,
                    "favorites: toggle already in progress; rejecting duplicate"
                );
                return Err(ClientError::Busy(story_id.clone()));
            }
            InflightGuard {
                inflight: &self.inflight,
                key,
            }
        };

        self.apply(user, story_id).await
    }

    async fn apply(&self, user: &User, story_id: &StoryId) -> Result<FavoriteOutcome, ClientError> {
        let favorited = !user.has_favorite(story_id);
        let remote_result = if favorited {
            self.remote.add_favorite(user, story_id).await
        } else {
            self.remote.remove_favorite(user, story_id).await
        };

        if let Err(err) = remote_result {
            warn!(
                username = %user.username,
                story_id = %story_id,
                favorited,
                "favorites: remote change failed, state unchanged: {err}"
            );
            return Err(err.into());
        }

        self.users.refresh().await;
        info!(
            username = %user.username,
            story_id = %story_id,
            favorited,
            "favorites: change confirmed"
        );
        let _ = self.events.send(FeedEvent::FavoriteChanged {
            story_id: story_id.clone(),
            favorited,
        });

        Ok(if favorited {
            FavoriteOutcome::Favorited
        } else {
            FavoriteOutcome::Unfavorited
        })
    }
}

/// Releases the in-flight marker when the toggle finishes or is dropped.
struct InflightGuard<'a> {
    inflight: &'a Mutex<HashSet<(String, StoryId)>>,
    key: (String, StoryId),
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        lock_inflight(self.inflight).remove(&self.key);
    }
}

fn lock_inflight(
    inflight: &Mutex<HashSet<(String, StoryId)>>,
) -> MutexGuard<'_, HashSet<(String, StoryId)>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}
