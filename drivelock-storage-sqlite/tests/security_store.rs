use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use drivelock_core::{
    AccountSecurity, KeyValueStore, ManualClock, SecurityConfig, SecurityStore,
    storage::{ACCOUNT_LOCKOUTS_KEY, LOGIN_ATTEMPTS_KEY, PASSWORD_HISTORY_KEY},
};
use drivelock_storage_sqlite::SqliteStorage;

const EMAIL: &str = "renter@example.com";

async fn setup_storage() -> Arc<SqliteStorage> {
    let _ = tracing_subscriber::fmt().try_init();
    let storage = SqliteStorage::connect("sqlite::memory:")
        .await
        .expect("Failed to create pool");
    storage.migrate().await.expect("Failed to run migrations");
    Arc::new(storage)
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    ))
}

async fn open_store(
    storage: &Arc<SqliteStorage>,
    clock: &Arc<ManualClock>,
) -> SecurityStore<SqliteStorage> {
    let store = SecurityStore::with_clock(storage.clone(), SecurityConfig::default(), clock.clone());
    store.load().await;
    store
}

#[tokio::test]
async fn test_lockout_survives_reload() {
    let storage = setup_storage().await;
    let clock = clock();

    let store = open_store(&storage, &clock).await;
    for _ in 0..5 {
        store.record_failed_login(EMAIL).await;
    }
    assert!(store.is_account_locked(EMAIL).await.locked);
    drop(store);

    // A fresh store over the same database sees the lockout
    clock.advance(Duration::minutes(5));
    let reloaded = open_store(&storage, &clock).await;
    let status = reloaded.is_account_locked(EMAIL).await;
    assert!(status.locked);
    assert_eq!(status.remaining_time, Some(10));
    assert_eq!(reloaded.remaining_attempts(EMAIL).await, 0);
}

#[tokio::test]
async fn test_history_survives_reload() {
    let storage = setup_storage().await;
    let clock = clock();

    let store = open_store(&storage, &clock).await;
    store.add_password_to_history(EMAIL, "pwf_one").await;
    store.add_password_to_history(EMAIL, "pwf_two").await;

    let reloaded = open_store(&storage, &clock).await;
    assert!(reloaded.is_password_in_history(EMAIL, "pwf_one").await);
    assert!(reloaded.is_password_in_history(EMAIL, "pwf_two").await);
    assert!(!reloaded.is_password_in_history(EMAIL, "pwf_three").await);
}

#[tokio::test]
async fn test_documents_are_versioned() {
    let storage = setup_storage().await;
    let clock = clock();

    let store = open_store(&storage, &clock).await;
    store.record_failed_login(EMAIL).await;

    let raw = storage.get(LOGIN_ATTEMPTS_KEY).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["data"][EMAIL][0], "2024-05-01T10:00:00.000Z");
}

#[tokio::test]
async fn test_corrupt_document_is_dropped_from_database() {
    let storage = setup_storage().await;
    storage
        .set(PASSWORD_HISTORY_KEY, r#"{"version":1,"data":{"a@b.com":["x"]}}"#)
        .await
        .unwrap();
    storage.set(ACCOUNT_LOCKOUTS_KEY, "not json").await.unwrap();

    let store = open_store(&storage, &clock()).await;
    assert!(store.is_ready());
    assert!(!store.is_password_in_history("a@b.com", "x").await);

    for key in [LOGIN_ATTEMPTS_KEY, ACCOUNT_LOCKOUTS_KEY, PASSWORD_HISTORY_KEY] {
        assert_eq!(storage.get(key).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_future_version_is_treated_as_corrupt() {
    let storage = setup_storage().await;
    storage
        .set(LOGIN_ATTEMPTS_KEY, r#"{"version":99,"data":{}}"#)
        .await
        .unwrap();

    let store = open_store(&storage, &clock()).await;
    assert_eq!(store.remaining_attempts(EMAIL).await, 5);
    assert_eq!(storage.get(LOGIN_ATTEMPTS_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_successful_login_clears_persisted_state() {
    let storage = setup_storage().await;
    let clock = clock();

    let store = open_store(&storage, &clock).await;
    for _ in 0..4 {
        store.record_failed_login(EMAIL).await;
    }
    store.clear_failed_attempts(EMAIL).await;

    let reloaded = open_store(&storage, &clock).await;
    assert_eq!(reloaded.remaining_attempts(EMAIL).await, 5);
}
