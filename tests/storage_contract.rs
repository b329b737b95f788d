#![allow(clippy::unwrap_used)]
//! Behaviour every storage backend must share.
//!
//! Memory and `SQLite` always run. Redis runs only when
//! `TOMES_TEST_REDIS_URL` points at a server.

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tempfile::TempDir;

use tomes::Error;
use tomes::storage::{
    CacheKey, MemoryStorage, RedisStorage, SessionStatus, SqliteStorage, Storage,
    TranslationCacheEntry, TranslationSession,
};

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

fn session(id: &str) -> TranslationSession {
    TranslationSession::new(id, "Book", "en", "sr", "ollama", "llama3.1:8b")
}

fn key(text: &str) -> CacheKey {
    CacheKey::new(text, "en", "sr", "ollama", "llama3.1:8b")
}

async fn cache_round_trip(storage: &dyn Storage) {
    let text = unique("Hello world");
    let entry = TranslationCacheEntry::new(key(&text), "Здраво свете");
    storage.cache_translation(&entry).await.unwrap();

    let hit = storage.get_cached_translation(&key(&text)).await.unwrap().unwrap();
    assert_eq!(hit.target_text, "Здраво свете");
    assert_eq!(hit.key, key(&text));

    let again = storage.get_cached_translation(&key(&text)).await.unwrap().unwrap();
    assert_eq!(again.access_count, hit.access_count + 1);
}

async fn any_key_change_misses(storage: &dyn Storage) {
    let text = unique("Chapter 1");
    storage
        .cache_translation(&TranslationCacheEntry::new(key(&text), "Поглавље 1"))
        .await
        .unwrap();

    let variants = [
        CacheKey::new(format!("{text} "), "en", "sr", "ollama", "llama3.1:8b"),
        CacheKey::new(&text, "de", "sr", "ollama", "llama3.1:8b"),
        CacheKey::new(&text, "en", "hr", "ollama", "llama3.1:8b"),
        CacheKey::new(&text, "en", "sr", "openai", "llama3.1:8b"),
        CacheKey::new(&text, "en", "sr", "ollama", "qwen2.5:7b"),
    ];
    for variant in &variants {
        assert!(
            storage.get_cached_translation(variant).await.unwrap().is_none(),
            "unexpected hit for {variant:?}"
        );
    }
    assert!(storage.get_cached_translation(&key(&text)).await.unwrap().is_some());
}

async fn session_lifecycle(storage: &dyn Storage) {
    let id = unique("session");
    let mut s = session(&id);
    storage.create_session(&s).await.unwrap();

    let err = storage.create_session(&s).await.unwrap_err();
    assert!(matches!(err, Error::SessionExists(ref dup) if *dup == id));

    s.transition(SessionStatus::Translating).unwrap();
    s.items_total = 4;
    s.items_completed = 2;
    s.progress = 50.0;
    storage.update_session(&s).await.unwrap();

    let loaded = storage.get_session(&id).await.unwrap().unwrap();
    assert_eq!(loaded.status, SessionStatus::Translating);
    assert_eq!(loaded.items_completed, 2);
    assert!((loaded.progress - 50.0).abs() < f64::EPSILON);

    storage.delete_session(&id).await.unwrap();
    assert!(storage.get_session(&id).await.unwrap().is_none());

    let err = storage.update_session(&s).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
    let err = storage.delete_session(&id).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
}

/// Only for backends that start empty.
async fn listing_and_statistics(storage: &dyn Storage) {
    let now = Utc::now();
    for (id, hours_ago, status) in [
        ("old", 3, SessionStatus::Completed),
        ("mid", 2, SessionStatus::Error),
        ("new", 1, SessionStatus::Translating),
    ] {
        let mut s = session(id);
        s.created_at = now - ChronoDuration::hours(hours_ago);
        s.start_time = s.created_at;
        storage.create_session(&s).await.unwrap();
        if status != SessionStatus::Translating {
            s.transition(SessionStatus::Translating).unwrap();
        }
        s.transition(status).unwrap();
        storage.update_session(&s).await.unwrap();
    }

    let ids: Vec<String> = storage
        .list_sessions(10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, ["new", "mid", "old"]);

    let page: Vec<String> = storage
        .list_sessions(1, 1)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(page, ["mid"]);

    storage
        .cache_translation(&TranslationCacheEntry::new(key("a"), "а"))
        .await
        .unwrap();
    storage.get_cached_translation(&key("a")).await.unwrap();

    let stats = storage.statistics().await.unwrap();
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.failed_sessions, 1);
    assert_eq!(stats.in_progress_sessions, 1);
    assert_eq!(stats.total_translations, 1);
    assert!((stats.cache_hit_rate - 50.0).abs() < 1e-9);
}

async fn stale_cache_is_cleaned(storage: &dyn Storage) {
    let mut stale = TranslationCacheEntry::new(key("stale"), "устајало");
    stale.last_accessed_at = Utc::now() - ChronoDuration::days(40);
    storage.cache_translation(&stale).await.unwrap();
    storage
        .cache_translation(&TranslationCacheEntry::new(key("fresh"), "свеже"))
        .await
        .unwrap();

    let removed = storage
        .cleanup_old_cache(Duration::from_secs(30 * 24 * 60 * 60))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(storage.get_cached_translation(&key("stale")).await.unwrap().is_none());
    assert!(storage.get_cached_translation(&key("fresh")).await.unwrap().is_some());
}

async fn oversized_cleanup_window_keeps_everything(storage: &dyn Storage) {
    let text = unique("kept");
    storage
        .cache_translation(&TranslationCacheEntry::new(key(&text), "задржано"))
        .await
        .unwrap();

    for days in [200_000_000_000_u64, 1_000_000_000] {
        let removed = storage
            .cleanup_old_cache(Duration::from_secs(days * 24 * 60 * 60))
            .await
            .unwrap();
        assert_eq!(removed, 0, "window of {days} days removed entries");
    }
    assert!(storage.get_cached_translation(&key(&text)).await.unwrap().is_some());
}

async fn full_contract(storage: &dyn Storage) {
    storage.ping().await.unwrap();
    cache_round_trip(storage).await;
    any_key_change_misses(storage).await;
    session_lifecycle(storage).await;
    oversized_cleanup_window_keeps_everything(storage).await;
}

#[tokio::test]
async fn test_memory_storage_contract() {
    let storage = MemoryStorage::new();
    full_contract(&storage).await;
    stale_cache_is_cleaned(&storage).await;
}

#[tokio::test]
async fn test_memory_listing_and_statistics() {
    listing_and_statistics(&MemoryStorage::new()).await;
}

#[tokio::test]
async fn test_sqlite_storage_contract() {
    let dir = TempDir::new().unwrap();
    let storage = SqliteStorage::open(dir.path().join("contract.db")).await.unwrap();
    full_contract(&storage).await;
    stale_cache_is_cleaned(&storage).await;
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_listing_and_statistics() {
    let dir = TempDir::new().unwrap();
    let storage = SqliteStorage::open(dir.path().join("stats.db")).await.unwrap();
    listing_and_statistics(&storage).await;
}

#[tokio::test]
async fn test_redis_storage_contract() {
    let Ok(url) = std::env::var("TOMES_TEST_REDIS_URL") else {
        eprintln!("TOMES_TEST_REDIS_URL not set, skipping");
        return;
    };
    let storage = RedisStorage::connect(&url, Duration::from_secs(60)).await.unwrap();
    full_contract(&storage).await;
    storage.close().await.unwrap();
}
