use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn empty_store_has_no_session() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.load_session().await.expect("load").is_none());
}

#[tokio::test]
async fn save_replaces_previous_session() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_session(&Session::new("token-1", "alice"))
        .await
        .expect("first save");
    storage
        .save_session(&Session::new("token-2", "bob"))
        .await
        .expect("second save");

    let loaded = storage.load_session().await.expect("load").expect("session");
    assert_eq!(loaded, Session::new("token-2", "bob"));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_session")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn clear_removes_both_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_session(&Session::new("token", "alice"))
        .await
        .expect("save");
    storage.clear_session().await.expect("clear");
    assert!(storage.load_session().await.expect("load").is_none());
}

#[tokio::test]
async fn half_written_row_loads_as_absent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query("INSERT INTO feed_session (slot, token, username) VALUES (1, 'orphan', NULL)")
        .execute(storage.pool())
        .await
        .expect("insert partial row");

    assert!(storage.load_session().await.expect("load").is_none());
}

#[tokio::test]
async fn session_survives_reopening_database_file() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("feed_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("session.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage
        .save_session(&Session::new("token", "alice"))
        .await
        .expect("save");
    storage.pool().close().await;
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let loaded = reopened.load_session().await.expect("load");
    assert_eq!(loaded, Some(Session::new("token", "alice")));
    reopened.pool().close().await;
    drop(reopened);

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn in_memory_urls_have_no_file_path() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/feed.db?mode=rwc"),
        Some(PathBuf::from("./data/feed.db"))
    );
}
