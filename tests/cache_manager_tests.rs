//! End-to-end behaviour of the cache manager over the in-memory store

mod common;

use bigdecimal::BigDecimal;
use calendar_cache::{
    CacheKey, CacheManager, CacheValue, Category, JsonCoder, KeyPrefix, MemoryStore, Namespace,
    StoreError, TagRegistry,
};
use chrono::{DateTime, NaiveDate};
use common::{memory_manager, test_ttl, FailingStore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

fn week_prefix() -> String {
    KeyPrefix::new().part("2024-10-07").part("2024-10-13").build()
}

fn sample_events() -> CacheValue {
    CacheValue::list([
        CacheValue::map([
            ("uid", CacheValue::Int(1)),
            ("title", "Standup".into()),
            ("day", CacheValue::Date(NaiveDate::from_ymd_opt(2024, 10, 7).unwrap())),
            (
                "start",
                CacheValue::DateTime(
                    DateTime::parse_from_rfc3339("2024-10-07T10:00:00+03:00").unwrap(),
                ),
            ),
            ("cost", CacheValue::Decimal(BigDecimal::from_str("12.50").unwrap())),
            ("attendees", CacheValue::list(["ann", "bob"])),
            ("cancelled", CacheValue::Bool(false)),
            ("note", CacheValue::Null),
        ]),
        CacheValue::map([("uid", CacheValue::Int(2)), ("ratio", CacheValue::Float(0.5))]),
    ])
}

#[tokio::test]
async fn test_store_then_fetch_with_binary_coder() {
    let (cache, _) = memory_manager();
    let key = CacheKey::for_category(week_prefix(), Category::AllEvents);

    cache.store(&key, &sample_events()).await.unwrap();
    assert_eq!(cache.fetch(&key).await.unwrap(), Some(sample_events()));
}

#[tokio::test]
async fn test_store_then_fetch_with_json_coder() {
    let (cache, store) = memory_manager();
    let cache = cache.with_coder(JsonCoder::new(TagRegistry::standard()));
    let key = CacheKey::for_category(week_prefix(), Category::AllCalendar);

    cache.store(&key, &sample_events()).await.unwrap();
    assert_eq!(cache.fetch(&key).await.unwrap(), Some(sample_events()));

    // Written as readable JSON with envelopes
    let raw = calendar_cache::StoreClient::get(&store, &key.compose())
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.contains(r#""_spec_type":"date""#));
}

#[tokio::test]
async fn test_shared_references_survive_the_binary_coder() {
    let (cache, _) = memory_manager();
    let key = CacheKey::for_category("RoomA", Category::FreeRooms);

    let room = CacheValue::shared(CacheValue::map([("name", "RoomA"), ("capacity", "8")]));
    let value = CacheValue::map([
        ("morning", CacheValue::list([room.clone()])),
        ("evening", CacheValue::list([room])),
    ]);
    cache.store(&key, &value).await.unwrap();

    let fetched = cache.fetch(&key).await.unwrap().unwrap();
    assert_eq!(fetched, value);

    let first = &fetched.get("morning").and_then(CacheValue::as_list).unwrap()[0];
    let second = &fetched.get("evening").and_then(CacheValue::as_list).unwrap()[0];
    match (first, second) {
        (CacheValue::Shared(a), CacheValue::Shared(b)) => assert!(Arc::ptr_eq(a, b)),
        other => panic!("sharing lost: {other:?}"),
    }
}

#[tokio::test]
async fn test_miss_and_falsy_hit_are_distinguishable() {
    let (cache, _) = memory_manager();
    let missing = CacheKey::for_category("nobody", Category::GetTimeBlock);
    let empty = CacheKey::for_category("u1", Category::GetTimeBlock);

    assert_eq!(cache.fetch(&missing).await.unwrap(), None);

    cache
        .store(&empty, &CacheValue::list(Vec::<CacheValue>::new()))
        .await
        .unwrap();
    assert_eq!(
        cache.fetch(&empty).await.unwrap(),
        Some(CacheValue::list(Vec::<CacheValue>::new()))
    );

    // Handlers that guard on truthiness see both as a miss
    assert_eq!(cache.fetch_truthy(&empty).await.unwrap(), None);
    assert_eq!(cache.fetch_truthy(&missing).await.unwrap(), None);

    cache.store(&empty, &CacheValue::list([1])).await.unwrap();
    assert!(cache.fetch_truthy(&empty).await.unwrap().is_some());
}

#[tokio::test]
async fn test_scoped_invalidation_leaves_other_prefixes() {
    let (cache, store) = memory_manager();
    let a = CacheKey::for_category("2024-10-07_2024-10-08_RoomA", Category::AllEvents);
    let b = CacheKey::for_category("2024-10-09_2024-10-10_RoomA", Category::AllEvents);
    assert_eq!(a.compose(), "2024-10-07_2024-10-08_RoomA_all_events");
    assert_eq!(b.compose(), "2024-10-09_2024-10-10_RoomA_all_events");

    cache.store(&a, &CacheValue::from("a")).await.unwrap();
    cache.store(&b, &CacheValue::from("b")).await.unwrap();

    let report = cache.invalidate(&a).await;
    assert_eq!(report.pattern, "*2024-10-07_2024-10-08_RoomA_all_events*");
    assert_eq!(report.deleted, 1);
    assert!(report.is_complete());

    assert_eq!(cache.fetch(&a).await.unwrap(), None);
    assert_eq!(cache.fetch(&b).await.unwrap(), Some(CacheValue::from("b")));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_namespace_sweep_clears_every_category() {
    let (cache, store) = memory_manager();
    let cache = cache.with_scan_batch_size(2);

    for prefix in ["A", "B", ""] {
        for category in Category::ALL {
            let key = CacheKey::for_category(prefix, category);
            cache.store(&key, &CacheValue::from(prefix)).await.unwrap();
        }
    }
    let unrelated = CacheKey::new("A", "user_profile");
    cache.store(&unrelated, &CacheValue::Int(1)).await.unwrap();

    let report = cache.invalidate_namespace().await;
    assert!(report.is_complete());
    assert_eq!(report.categories.len(), 4);
    assert_eq!(report.total_deleted(), 12);
    for category in &report.categories {
        assert_eq!(category.deleted, 3);
    }

    assert_eq!(store.len(), 1);
    assert!(store.contains_key("A_user_profile"));
}

#[tokio::test]
async fn test_custom_namespace() {
    let (cache, store) = memory_manager();
    let cache = cache.with_namespace(Namespace::new(["free_rooms"]));

    cache
        .store(&CacheKey::for_category("A", Category::FreeRooms), &CacheValue::Int(1))
        .await
        .unwrap();
    cache
        .store(&CacheKey::for_category("A", Category::AllEvents), &CacheValue::Int(1))
        .await
        .unwrap();

    let report = cache.invalidate_namespace().await;
    assert_eq!(report.total_deleted(), 1);
    assert!(store.contains_key("A_all_events"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_leave_one_whole_value() {
    let (cache, _) = memory_manager();
    let key = CacheKey::for_category("race", Category::AllEvents);
    let v1 = CacheValue::list((0..500).map(CacheValue::Int).collect::<Vec<_>>());
    let v2 = CacheValue::map([("winner", CacheValue::from("second"))]);

    for _ in 0..20 {
        let (c1, c2) = (cache.clone(), cache.clone());
        let (k1, k2) = (key.clone(), key.clone());
        let (w1, w2) = (v1.clone(), v2.clone());
        let first = tokio::spawn(async move { c1.store(&k1, &w1).await });
        let second = tokio::spawn(async move { c2.store(&k2, &w2).await });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let stored = cache.fetch(&key).await.unwrap().unwrap();
        assert!(stored == v1 || stored == v2, "interleaved value: {stored:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_ttl() {
    let (cache, _) = memory_manager();
    let key = CacheKey::for_category(week_prefix(), Category::AllEvents);
    cache.store(&key, &sample_events()).await.unwrap();

    tokio::time::advance(test_ttl().as_duration() - Duration::from_secs(1)).await;
    assert!(cache.fetch(&key).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(cache.fetch(&key).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_overwrite_resets_ttl() {
    let (cache, _) = memory_manager();
    let key = CacheKey::for_category("A", Category::FreeRooms);

    cache.store(&key, &CacheValue::Int(1)).await.unwrap();
    tokio::time::advance(Duration::from_secs(50)).await;
    cache.store(&key, &CacheValue::Int(2)).await.unwrap();
    tokio::time::advance(Duration::from_secs(50)).await;

    assert_eq!(cache.fetch(&key).await.unwrap(), Some(CacheValue::Int(2)));
}

#[tokio::test]
async fn test_failed_delete_stops_sweep_and_keeps_earlier_deletions() {
    let store = MemoryStore::new();
    let failing = FailingStore::failing_delete(store.clone(), "k3_all_events");
    let cache = CacheManager::new(failing, test_ttl()).with_scan_batch_size(2);

    for i in 0..6 {
        let key = CacheKey::for_category(format!("k{i}"), Category::AllEvents);
        cache.store(&key, &CacheValue::Int(i)).await.unwrap();
    }

    let report = cache.invalidate(&CacheKey::category(Category::AllEvents)).await;
    assert_eq!(report.deleted, 3);
    assert!(!report.is_complete());
    assert!(matches!(report.failure, Some(StoreError::BackendError(_))));

    for i in 0..3 {
        assert!(!store.contains_key(&format!("k{i}_all_events")));
    }
    for i in 3..6 {
        assert!(store.contains_key(&format!("k{i}_all_events")));
    }

    // The sweep is idempotent once the store recovers
    let recovered = CacheManager::new(store.clone(), test_ttl());
    let report = recovered.invalidate(&CacheKey::category(Category::AllEvents)).await;
    assert_eq!(report.deleted, 3);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_failed_scan_is_reported_per_category() {
    let store = MemoryStore::new();
    let cache = CacheManager::new(FailingStore::failing_scan_after(store.clone(), 1), test_ttl());

    cache
        .store(&CacheKey::for_category("A", Category::AllEvents), &CacheValue::Int(1))
        .await
        .unwrap();

    let report = cache.invalidate_namespace().await;
    assert_eq!(report.categories.len(), 4);
    assert_eq!(report.categories[0].deleted, 1);
    assert!(report.categories[0].is_complete());
    assert_eq!(report.failures().count(), 3);
    assert!(!cache.health_check().await.unwrap());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FreeRoom {
    name: String,
    floor: u8,
    slots: Vec<String>,
}

#[tokio::test]
async fn test_typed_responses_round_trip() {
    let (cache, _) = memory_manager();
    let key = KeyPrefix::new().part("2024-10-07").key(Category::FreeRooms);
    let rooms = vec![
        FreeRoom {
            name: "RoomA".to_string(),
            floor: 3,
            slots: vec!["10:00".to_string(), "11:00".to_string()],
        },
        FreeRoom {
            name: "RoomB".to_string(),
            floor: 4,
            slots: vec![],
        },
    ];

    cache.store_serialized(&key, &rooms).await.unwrap();
    assert_eq!(cache.fetch_as::<Vec<FreeRoom>>(&key).await.unwrap(), Some(rooms));
    assert!(cache.fetch_as::<Vec<u32>>(&key).await.is_err());
}

#[tokio::test]
async fn test_rendered_response_is_cached_as_its_body() {
    struct RenderedPage(String);

    impl calendar_cache::RawBody for RenderedPage {
        fn raw_body(&self) -> Vec<u8> {
            self.0.as_bytes().to_vec()
        }
    }

    let (cache, store) = memory_manager();
    let json_cache = cache.with_coder(JsonCoder::default());
    let key = CacheKey::for_category("u1", Category::AllCalendar);
    let page = RenderedPage(r#"{"events":[]}"#.to_string());

    json_cache.store(&key, &CacheValue::from_body(&page)).await.unwrap();
    let raw = calendar_cache::StoreClient::get(&store, "u1_all_calendar")
        .await
        .unwrap();
    assert_eq!(raw.as_deref(), Some(br#"{"events":[]}"#.as_slice()));
}
