use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    DurableSessionStore, FavoriteOutcome, FeedClient, HttpFeedService, InMemorySessionStore,
    SessionStore, StoryListView,
};
use shared::domain::{NavigationContext, StoryFields, StoryId};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(name = "feed", about = "Browse and curate the story feed")]
struct Cli {
    /// Settings file (defaults to ./feed.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Signup {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    Logout,
    /// Show the logged in user's profile.
    Whoami,
    Stories {
        #[arg(long, value_enum, default_value_t = View::All)]
        view: View,
    },
    /// Flip the favorite state of a story.
    Favorite { story_id: String },
    Submit {
        #[arg(long)]
        author: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
    },
    /// Edit one of your stories; omitted fields keep their current value.
    Edit {
        story_id: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    Delete { story_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    All,
    Own,
    Favorites,
}

impl From<View> for NavigationContext {
    fn from(view: View) -> Self {
        match view {
            View::All => NavigationContext::All,
            View::Own => NavigationContext::Own,
            View::Favorites => NavigationContext::Favorites,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url.clone() {
        settings.api_base_url = api_url;
    }

    let filter =
        EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = build_client(&settings).await?;
    client.restore().await;
    run(&client, cli.command).await
}

async fn build_client(settings: &config::FeedSettings) -> Result<FeedClient> {
    let remote = Arc::new(
        HttpFeedService::new(&settings.api_base_url)?.with_story_limit(settings.story_limit),
    );
    let sessions: Arc<dyn SessionStore> = if settings.persist_session {
        let database_url = config::prepare_database_url(&settings.database_url)?;
        info!(database_url = %database_url, "session: using durable store");
        DurableSessionStore::initialize(&database_url).await?
    } else {
        Arc::new(InMemorySessionStore::new())
    };
    Ok(FeedClient::new_with_session_store(remote, sessions))
}

async fn run(client: &FeedClient, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let user = client.login(&username, &password).await?;
            println!("Logged in as {}", user.username);
        }
        Command::Signup {
            username,
            password,
            name,
        } => {
            let user = client.signup(&username, &password, &name).await?;
            println!("Created account {}", user.username);
        }
        Command::Logout => {
            client.logout().await;
            println!("Logged out");
        }
        Command::Whoami => match client.profile().await {
            Some(profile) => {
                println!("Name: {}", profile.name);
                println!("Username: {}", profile.username);
                println!("Account Created: {}", profile.account_created);
            }
            None => println!("Not logged in"),
        },
        Command::Stories { view } => {
            let listing = client.render(view.into()).await;
            print!("{}", format_listing(&listing));
        }
        Command::Favorite { story_id } => {
            match client.toggle_favorite(&StoryId::new(story_id.clone())).await? {
                FavoriteOutcome::Favorited => println!("Favorited {story_id}"),
                FavoriteOutcome::Unfavorited => println!("Unfavorited {story_id}"),
                FavoriteOutcome::Anonymous => bail!("log in to manage favorites"),
            }
        }
        Command::Submit { author, title, url } => {
            let story = client
                .create_story(&StoryFields::new(author, title, url))
                .await?;
            println!("Submitted {}", story.story_id);
        }
        Command::Edit {
            story_id,
            author,
            title,
            url,
        } => {
            let story_id = StoryId::new(story_id);
            let fields = merge_edit(
                client.edit_draft(&story_id).await,
                author,
                title,
                url,
            )
            .with_context(|| format!("cannot prefill story {story_id}"))?;
            let story = client.update_story(&story_id, &fields).await?;
            println!("Updated {}", story.story_id);
        }
        Command::Delete { story_id } => {
            let story_id = StoryId::new(story_id);
            client.delete_story(&story_id).await?;
            println!("Deleted {story_id}");
        }
    }
    Ok(())
}

/// Overlays the given values on the current draft. Without a draft every field
/// has to be supplied.
fn merge_edit(
    draft: Option<StoryFields>,
    author: Option<String>,
    title: Option<String>,
    url: Option<String>,
) -> Result<StoryFields> {
    match draft {
        Some(draft) => Ok(StoryFields {
            author: author.unwrap_or(draft.author),
            title: title.unwrap_or(draft.title),
            url: url.unwrap_or(draft.url),
        }),
        None => match (author, title, url) {
            (Some(author), Some(title), Some(url)) => Ok(StoryFields { author, title, url }),
            _ => bail!("not one of your stories; pass --author, --title and --url"),
        },
    }
}

fn format_listing(listing: &StoryListView) -> String {
    if listing.show_placeholder {
        return match listing.context {
            NavigationContext::Favorites => "No favorites added!\n".to_string(),
            _ => "No stories added by user yet!\n".to_string(),
        };
    }

    let mut out = String::new();
    for item in &listing.items {
        let star = if item.is_favorited { "*" } else { " " };
        let owned = if item.is_owned_by_viewer { " [yours]" } else { "" };
        out.push_str(&format!(
            "{star} {} ({})\n    by {} | posted by {} | id {}{owned}\n",
            item.story.title,
            item.display_host,
            item.story.author,
            item.story.username,
            item.story.story_id,
        ));
    }
    out
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
