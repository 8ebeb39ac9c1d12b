use querycache::{
    CacheBackend, CacheKind, MemoryBackend, QueryCacheError, QueryClient, QueryOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Surface coordinator logs in test output; `RUST_LOG` narrows them down.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
}

fn john() -> Profile {
    Profile {
        name: "John Doe".to_string(),
        age: 20,
    }
}

fn jane() -> Profile {
    Profile {
        name: "Jane Doe".to_string(),
        age: 21,
    }
}

fn options(keys: &[&str], cache_time: Duration, revalidate_time: Duration) -> QueryOptions {
    QueryOptions {
        keys: keys.iter().map(|k| k.to_string()).collect(),
        cache_time,
        revalidate_time,
        retries: 0,
        cache_kind: Some(CacheKind::Memory),
    }
}

#[tokio::test]
async fn staleness_triggers_recompute() {
    init_tracing();
    let client = QueryClient::builder().memory(MemoryBackend::default()).build();
    let opts = options(
        &["profile"],
        Duration::from_millis(50),
        Duration::from_millis(50),
    );
    let calls = AtomicU32::new(0);

    let first: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(john())
            },
            Some(&opts),
        )
        .await
        .unwrap();
    assert_eq!(first, john());

    tokio::time::sleep(Duration::from_millis(120)).await;

    let second: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(jane())
            },
            Some(&opts),
        )
        .await
        .unwrap();
    assert_eq!(second, jane(), "stale entry must reflect the new computation");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn effective_ttl_is_the_minimum_of_both_windows() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    // Backend window is long, revalidate window short: the short one wins.
    let opts = options(
        &["profile"],
        Duration::from_secs(10),
        Duration::from_millis(50),
    );
    let calls = AtomicU32::new(0);

    let _: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(john())
            },
            Some(&opts),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    // The backend copy expired together with the metadata entry.
    assert_eq!(memory.get("gqc_fetch_profile").await.unwrap(), None);

    let after: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(jane())
            },
            Some(&opts),
        )
        .await
        .unwrap();
    assert_eq!(after, jane());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mutate_evicts_and_never_populates() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    let opts = options(&["profile"], Duration::from_secs(10), Duration::from_secs(10));

    let _: Profile = client
        .query(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap();
    assert!(memory.get("gqc_fetch_profile").await.unwrap().is_some());

    let mutated: Option<Profile> = client
        .mutate(|| async { Ok(Some(jane())) }, Some(&opts))
        .await
        .unwrap();
    assert_eq!(mutated, Some(jane()));

    // Mutation removed the cached bytes and did not write fresh ones.
    assert_eq!(memory.get("gqc_fetch_profile").await.unwrap(), None);

    let calls = AtomicU32::new(0);
    let after: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(jane())
            },
            Some(&opts),
        )
        .await
        .unwrap();
    assert_eq!(after, jane());
    assert_eq!(calls.load(Ordering::SeqCst), 1, "query after mutate recomputes");
}

#[tokio::test]
async fn mutate_with_empty_payload_still_evicts() {
    init_tracing();
    let client = QueryClient::builder().memory(MemoryBackend::default()).build();
    let opts = options(&["profile"], Duration::from_secs(10), Duration::from_secs(10));

    let _: Profile = client
        .query(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap();

    let mutated: Option<Profile> = client
        .mutate(|| async { Ok(None::<Profile>) }, Some(&opts))
        .await
        .unwrap();
    assert_eq!(mutated, None);

    let calls = AtomicU32::new(0);
    let _: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(jane())
            },
            Some(&opts),
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_payload_self_heals() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    let opts = options(&["profile"], Duration::from_secs(10), Duration::from_secs(10));

    let _: Profile = client
        .query(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap();

    // Tamper with the backend entry behind the coordinator's back.
    memory
        .set("gqc_fetch_profile", b"{not json", Duration::from_secs(10))
        .await
        .unwrap();

    let healed: Profile = client
        .query(|| async { Ok(jane()) }, Some(&opts))
        .await
        .unwrap();
    assert_eq!(healed, jane(), "corrupt bytes degrade to a recomputation");
    assert!(client.stats().corrupt_fallbacks >= 1);

    // The repaired entry serves hits again.
    let cached: Profile = client
        .query(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap();
    assert_eq!(cached, jane());
}

#[tokio::test]
async fn wrong_shape_payload_self_heals() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    let opts = options(&["profile"], Duration::from_secs(10), Duration::from_secs(10));

    let _: Profile = client
        .query(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap();

    // Valid JSON of the wrong shape.
    memory
        .set("gqc_fetch_profile", b"[1, 2, 3]", Duration::from_secs(10))
        .await
        .unwrap();

    let healed: Profile = client
        .query(|| async { Ok(jane()) }, Some(&opts))
        .await
        .unwrap();
    assert_eq!(healed, jane());
}

#[tokio::test]
async fn vanished_backend_entry_recomputes() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    let opts = options(&["profile"], Duration::from_secs(10), Duration::from_secs(10));

    let _: Profile = client
        .query(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap();

    // Backend lost the value while the metadata index still says fresh.
    memory.delete("gqc_fetch_profile").await.unwrap();

    let recomputed: Profile = client
        .query(|| async { Ok(jane()) }, Some(&opts))
        .await
        .unwrap();
    assert_eq!(recomputed, jane());
}

#[tokio::test]
async fn multi_key_population_and_invalidation() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    let both = options(
        &["user:1", "team:7"],
        Duration::from_secs(10),
        Duration::from_secs(10),
    );

    let _: Profile = client
        .query(|| async { Ok(john()) }, Some(&both))
        .await
        .unwrap();

    // The result was cached under every key.
    let second_key = options(&["team:7"], Duration::from_secs(10), Duration::from_secs(10));
    let calls = AtomicU32::new(0);
    let via_second: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(jane())
            },
            Some(&second_key),
        )
        .await
        .unwrap();
    assert_eq!(via_second, john());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // One mutation invalidates the whole key set.
    let _: Option<Profile> = client
        .mutate(|| async { Ok(None::<Profile>) }, Some(&both))
        .await
        .unwrap();
    assert_eq!(memory.get("gqc_fetch_user:1").await.unwrap(), None);
    assert_eq!(memory.get("gqc_fetch_team:7").await.unwrap(), None);
}

#[tokio::test]
async fn backend_write_failure_surfaces() {
    init_tracing();
    // Zero capacity makes every insert fail.
    let client = QueryClient::builder().memory(MemoryBackend::new(0)).build();
    let opts = options(&["profile"], Duration::from_secs(10), Duration::from_secs(10));

    let err = client
        .query::<Profile, Profile, _, _>(|| async { Ok(john()) }, Some(&opts))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryCacheError::Backend(_)));
}

#[tokio::test]
async fn zero_cache_time_recomputes_every_call() {
    init_tracing();
    let memory = MemoryBackend::default();
    let client = QueryClient::builder().memory(memory.clone()).build();
    let opts = options(&["profile"], Duration::ZERO, Duration::from_secs(10));
    let calls = AtomicU32::new(0);

    let first: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(john())
            },
            Some(&opts),
        )
        .await
        .unwrap();
    let second: Profile = client
        .query(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(jane())
            },
            Some(&opts),
        )
        .await
        .unwrap();

    assert_eq!(first, john());
    assert_eq!(second, jane());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(memory.is_empty(), "zero ttl never persists bytes");
}
