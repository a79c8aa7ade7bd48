use std::sync::Arc;

use shared::domain::Story;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::{error::ClientError, FeedEvent, RemoteStoryService};

/// Owner of the "all stories" snapshot, in the order the server returned it.
pub struct StoryCatalog {
    remote: Arc<dyn RemoteStoryService>,
    stories: RwLock<Arc<Vec<Story>>>,
    refresh_slot: Mutex<()>,
    events: broadcast::Sender<FeedEvent>,
}

impl StoryCatalog {
    pub fn new(remote: Arc<dyn RemoteStoryService>, events: broadcast::Sender<FeedEvent>) -> Self {
        Self {
            remote,
            stories: RwLock::new(Arc::new(Vec::new())),
            refresh_slot: Mutex::new(()),
            events,
        }
    }

    pub async fn snapshot(&self) -> Arc<Vec<Story>> {
        Arc::clone(&*self.stories.read().await)
    }

    /// Fetches the full list and replaces the snapshot. On failure the
    /// previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<Vec<Story>>, ClientError> {
        let _slot = self.refresh_slot.lock().await;
        let stories = match self.remote.fetch_all().await {
            Ok(stories) => Arc::new(stories),
            Err(err) => {
                warn!("stories: catalog refresh failed, keeping previous snapshot: {err}");
                return Err(err.into());
            }
        };

        *self.stories.write().await = Arc::clone(&stories);
        info!(count = stories.len(), "stories: catalog refreshed");
        let _ = self.events.send(FeedEvent::CatalogRefreshed {
            stories: stories.len(),
        });
        Ok(stories)
    }
}
