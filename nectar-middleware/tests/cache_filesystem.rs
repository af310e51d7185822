use std::time::Duration;

use nectar_middleware::cache::CacheTier;
use nectar_middleware::filesystem::FilesystemTier;
use nectar_types::{Service, TtlConfig};
use serde_json::json;

fn short_ttls(ms: u64) -> TtlConfig {
    let mut ttls = TtlConfig::default();
    for service in Service::ALL {
        ttls.set(service, Duration::from_millis(ms));
    }
    ttls
}

#[tokio::test]
async fn layout_is_service_shard_digest() {
    let dir = tempfile::tempdir().unwrap();
    let tier = FilesystemTier::new(dir.path(), TtlConfig::default());
    tier.put(Service::Dshield, "203.0.113.10", &json!({"ip": {}}))
        .await;

    let service_dir = dir.path().join("dshield");
    let shards: Vec<_> = std::fs::read_dir(&service_dir).unwrap().collect();
    assert_eq!(shards.len(), 1);
    let shard = shards[0].as_ref().unwrap().path();
    assert_eq!(shard.file_name().unwrap().len(), 2);
    let files: Vec<_> = std::fs::read_dir(&shard).unwrap().collect();
    assert_eq!(files.len(), 1);
    let file = files[0].as_ref().unwrap().path();
    assert_eq!(file.extension().unwrap(), "json");
    // 64 hex chars + ".json"
    assert_eq!(file.file_name().unwrap().len(), 69);
    // File content is the payload verbatim.
    let text = std::fs::read_to_string(&file).unwrap();
    assert_eq!(text, r#"{"ip":{}}"#);
}

#[tokio::test]
async fn writes_are_deterministic_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let tier = FilesystemTier::new(dir.path(), TtlConfig::default());
    tier.put(Service::Urlhaus, "192.0.2.1", &json!({"tags": "a"}))
        .await;
    tier.put(Service::Urlhaus, "192.0.2.1", &json!({"tags": "b"}))
        .await;

    let mut count = 0;
    for shard in std::fs::read_dir(dir.path().join("urlhaus")).unwrap() {
        count += std::fs::read_dir(shard.unwrap().path()).unwrap().count();
    }
    assert_eq!(count, 1, "same key overwrites the same file");
    assert_eq!(
        tier.get(Service::Urlhaus, "192.0.2.1").await,
        Some(json!({"tags": "b"}))
    );
}

#[tokio::test]
async fn stale_entries_read_as_miss_and_are_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let tier = FilesystemTier::new(dir.path(), short_ttls(40));
    tier.put(Service::Spur, "198.51.100.23", &json!(["", "", "", "VPN"]))
        .await;
    assert!(tier.get(Service::Spur, "198.51.100.23").await.is_some());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(tier.get(Service::Spur, "198.51.100.23").await.is_none());
    // The stale file is gone, not just skipped.
    let mut remaining = 0;
    if let Ok(shards) = std::fs::read_dir(dir.path().join("spur")) {
        for shard in shards {
            remaining += std::fs::read_dir(shard.unwrap().path()).unwrap().count();
        }
    }
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn cleanup_unlinks_only_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut ttls = TtlConfig::default();
    ttls.set(Service::Dshield, Duration::from_millis(30));
    // URLHaus entries stay fresh for the duration of the test.
    ttls.set(Service::Urlhaus, Duration::from_secs(3600));
    let tier = FilesystemTier::new(dir.path(), ttls);

    tier.put(Service::Dshield, "203.0.113.1", &json!({"ip": {}}))
        .await;
    tier.put(Service::Dshield, "203.0.113.2", &json!({"ip": {}}))
        .await;
    tier.put(Service::Urlhaus, "203.0.113.1", &json!({"tags": ""}))
        .await;

    tokio::time::sleep(Duration::from_millis(70)).await;
    let report = tier.cleanup().await;
    assert_eq!(report.scanned, 3);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.errors, 0);
    assert!(tier.get(Service::Urlhaus, "203.0.113.1").await.is_some());
}

#[tokio::test]
async fn cleanup_on_an_empty_base_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let tier = FilesystemTier::new(dir.path().join("missing"), TtlConfig::default());
    let report = tier.cleanup().await;
    assert_eq!(report.scanned, 0);
    assert_eq!(report.deleted, 0);
}

#[tokio::test]
async fn spur_prefix_fallback_serves_a_24_neighbor() {
    let dir = tempfile::tempdir().unwrap();
    let tier = FilesystemTier::new(dir.path(), TtlConfig::default());
    let payload = json!(["64496", "Example AS", "", "DATACENTER"]);
    tier.put(Service::Spur, "203.0.113.17", &payload).await;

    // Exact key missing, same /24 present.
    assert_eq!(
        tier.get(Service::Spur, "203.0.113.99").await,
        Some(payload)
    );
    // Different /24 misses.
    assert!(tier.get(Service::Spur, "203.0.114.99").await.is_none());
}

#[tokio::test]
async fn prefix_fallback_is_confined_to_spur() {
    let dir = tempfile::tempdir().unwrap();
    let tier = FilesystemTier::new(dir.path(), TtlConfig::default());
    tier.put(Service::Dshield, "203.0.113.17", &json!({"ip": {}}))
        .await;
    assert!(tier.get(Service::Dshield, "203.0.113.99").await.is_none());
}
