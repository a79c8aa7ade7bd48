use anyhow::{Context, Result};
use chrono::Utc;
use shared::domain::Session;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

const SESSION_SLOT: i64 = 1;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);
        // Every in-memory connection is its own database.
        let max_connections = if is_in_memory(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply session store migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Returns the stored session, or `None` when either half is missing.
    pub async fn load_session(&self) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT token, username FROM feed_session WHERE slot = ?")
            .bind(SESSION_SLOT)
            .fetch_optional(&self.pool)
            .await
            .context("failed to read session row")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token: Option<String> = row.try_get("token")?;
        let username: Option<String> = row.try_get("username")?;
        Ok(Session::from_parts(token, username))
    }

    /// Writes both fields in a single statement.
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_session (slot, token, username, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(slot) DO UPDATE SET
                token = excluded.token,
                username = excluded.username,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(SESSION_SLOT)
        .bind(&session.token)
        .bind(&session.username)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to write session row")?;
        Ok(())
    }

    pub async fn clear_session(&self) -> Result<()> {
        sqlx::query("DELETE FROM feed_session WHERE slot = ?")
            .bind(SESSION_SLOT)
            .execute(&self.pool)
            .await
            .context("failed to clear session row")?;
        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
