//! Pure derivation of what a navigation context should display.

use shared::domain::{NavigationContext, Story, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryViewModel {
    pub story: Story,
    /// Edit/delete affordances are offered only when this is set.
    pub is_owned_by_viewer: bool,
    pub is_favorited: bool,
    pub display_host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryListView {
    pub context: NavigationContext,
    pub items: Vec<StoryViewModel>,
    /// Set for the personal lists when there is nothing to show.
    pub show_placeholder: bool,
}

impl StoryListView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Same inputs always produce the same view.
pub fn render(
    context: NavigationContext,
    user: Option<&User>,
    catalog: &[Story],
) -> StoryListView {
    let items: Vec<StoryViewModel> = match (context, user) {
        (NavigationContext::All, _) => catalog.iter().map(|story| annotate(story, user)).collect(),
        (NavigationContext::Own, Some(viewer)) => viewer
            .own_stories
            .iter()
            .map(|story| annotate(story, user))
            .collect(),
        (NavigationContext::Favorites, Some(viewer)) => viewer
            .favorites
            .iter()
            .map(|story| annotate(story, user))
            .collect(),
        (NavigationContext::Own | NavigationContext::Favorites, None) => Vec::new(),
    };

    StoryListView {
        context,
        show_placeholder: items.is_empty() && context.shows_placeholder_when_empty(),
        items,
    }
}

fn annotate(story: &Story, viewer: Option<&User>) -> StoryViewModel {
    StoryViewModel {
        story: story.clone(),
        is_owned_by_viewer: viewer.is_some_and(|user| user.owns(story)),
        is_favorited: viewer.is_some_and(|user| user.has_favorite(&story.story_id)),
        display_host: display_host(&story.url),
    }
}

/// Host shown next to a story link, without a leading `www.`.
pub fn display_host(url: &str) -> String {
    let host = if url.contains("://") {
        url.split('/').nth(2).unwrap_or_default()
    } else {
        url.split('/').next().unwrap_or_default()
    };
    host.strip_prefix("www.").unwrap_or(host).to_string()
}
