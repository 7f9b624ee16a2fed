use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use vaultline_cache::{CacheConfig, EncryptedCache};
use vaultline_core::{Error, Result};

fn cache_without_sweep(key: &str) -> Result<EncryptedCache> {
    EncryptedCache::new(CacheConfig::new(key).with_sweep_interval(Duration::ZERO))
}

/// Concurrent writers and readers on overlapping keys never see torn or
/// foreign values.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access_returns_whole_values() -> Result<()> {
    let cache = Arc::new(cache_without_sweep("operator-key")?);
    let mut tasks = Vec::new();

    for worker in 0..8 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            for i in 0..200 {
                let key = format!("key-{}", i % 16);
                let value = format!("{key}:writer-{worker}");
                cache.set(key.clone(), value)?;

                if let Some(read) = cache.get(&key)? {
                    let read = String::from_utf8(read.to_vec()).unwrap();
                    assert!(read.starts_with(&format!("{key}:writer-")), "{read}");
                }
            }
            Ok::<(), Error>(())
        }));
    }

    for task in tasks {
        task.await.unwrap()?;
    }

    assert_eq!(cache.len(), 16);
    let stats = cache.stats();
    assert_eq!(stats.writes, 8 * 200);
    assert_eq!(stats.decryption_failures, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_racing_writers_leaves_cache_closed_and_empty() -> Result<()> {
    let cache = Arc::new(cache_without_sweep("operator-key")?);
    let writer = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let mut accepted = 0usize;
            for i in 0..10_000 {
                match cache.set(format!("k{i}"), "v") {
                    Ok(()) => accepted += 1,
                    Err(Error::CacheClosed) => break,
                    Err(other) => return Err(other),
                }
                tokio::task::yield_now().await;
            }
            Ok(accepted)
        })
    };

    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.clear();
    writer.await.unwrap()?;

    assert!(cache.is_closed());
    assert!(cache.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_entries_and_sweep() -> Result<()> {
    let cache = EncryptedCache::new(
        CacheConfig::new("operator-key").with_ttl(Duration::from_millis(200)),
    )?;
    let clone = cache.clone();

    clone.set("token", "abc")?;
    assert_eq!(&*cache.get("token")?.unwrap(), b"abc");

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(cache.is_empty());

    drop(clone);
    cache.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_ttl_is_capped_instead_of_overflowing() -> Result<()> {
    let cache = EncryptedCache::new(CacheConfig::new("operator-key"))?;

    cache.set_with_ttl("forever", "v", Duration::MAX)?;
    tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
    assert_eq!(&*cache.get("forever")?.unwrap(), b"v");
    assert_eq!(cache.sweep_expired(), 0);

    let unbounded = CacheConfig::new("operator-key").with_ttl(Duration::MAX);
    assert!(matches!(
        EncryptedCache::new(unbounded),
        Err(Error::Configuration { .. })
    ));
    cache.shutdown().await
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_any_value_survives_the_cache(
        key in "[a-z0-9/_-]{1,32}",
        value in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let cache = cache_without_sweep("operator-key").unwrap();
        cache.set(key.clone(), value.clone()).unwrap();
        let read = cache.get(&key).unwrap().unwrap();
        prop_assert_eq!(read.as_slice(), value.as_slice());
    }
}
