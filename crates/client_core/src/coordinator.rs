use std::sync::Arc;

use futures::future::join;
use shared::domain::{Story, StoryFields, StoryId, User};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::ClientError, story_catalog::StoryCatalog, user_context::UserContext, FeedEvent,
    RemoteStoryService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryMutation {
    Created,
    Updated,
    Deleted,
}

/// Create/update/delete against the server, then re-sync both snapshots.
/// Neither snapshot is touched unless the remote mutation succeeded.
pub struct StoryCoordinator {
    remote: Arc<dyn RemoteStoryService>,
    users: Arc<UserContext>,
    catalog: Arc<StoryCatalog>,
    events: broadcast::Sender<FeedEvent>,
}

impl StoryCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStoryService>,
        users: Arc<UserContext>,
        catalog: Arc<StoryCatalog>,
        events: broadcast::Sender<FeedEvent>,
    ) -> Self {
        Self {
            remote,
            users,
            catalog,
            events,
        }
    }

    pub async fn create(&self, user: &User, fields: &StoryFields) -> Result<Story, ClientError> {
        validate(fields)?;
        let story = self.remote.create(user, fields).await.map_err(|err| {
            warn!(username = %user.username, "stories: create failed: {err}");
            ClientError::from(err)
        })?;

        self.resync().await;
        self.announce(&story.story_id, StoryMutation::Created);
        Ok(story)
    }

    /// Ownership is checked by the server; a rejection comes back as
    /// [`ClientError::Precondition`].
    pub async fn update(
        &self,
        user: &User,
        story_id: &StoryId,
        fields: &StoryFields,
    ) -> Result<Story, ClientError> {
        validate(fields)?;
        let story = self
            .remote
            .update(user, story_id, fields)
            .await
            .map_err(|err| {
                warn!(username = %user.username, story_id = %story_id, "stories: update failed: {err}");
                ClientError::from(err)
            })?;

        self.resync().await;
        self.announce(&story.story_id, StoryMutation::Updated);
        Ok(story)
    }

    pub async fn delete(&self, user: &User, story_id: &StoryId) -> Result<(), ClientError> {
        self.remote.delete(user, story_id).await.map_err(|err| {
            warn!(username = %user.username, story_id = %story_id, "stories: delete failed: {err}");
            ClientError::from(err)
        })?;

        self.resync().await;
        self.announce(story_id, StoryMutation::Deleted);
        Ok(())
    }

    async fn resync(&self) {
        let (_user, catalog) = join(self.users.refresh(), self.catalog.refresh()).await;
        if let Err(err) = catalog {
            warn!("stories: catalog re-sync after mutation failed: {err}");
        }
    }

    fn announce(&self, story_id: &StoryId, mutation: StoryMutation) {
        info!(story_id = %story_id, ?mutation, "stories: mutation applied");
        let _ = self.events.send(FeedEvent::StoryMutated {
            story_id: story_id.clone(),
            mutation,
        });
    }
}

fn validate(fields: &StoryFields) -> Result<(), ClientError> {
    match fields.first_blank_field() {
        Some(field) => Err(ClientError::Validation(format!("{field} must not be blank"))),
        None => Ok(()),
    }
}
