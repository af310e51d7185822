mod helpers;

use helpers::{full_creds, test_config};
use nectar::{EnrichmentRecord, EnrichmentService};
use nectar_mock::{MockProvider, fixtures};
use serde_json::json;

fn danger(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F)
}

fn scan_dir_for_danger_bytes(dir: &std::path::Path) {
    for shard in std::fs::read_dir(dir).unwrap() {
        for file in std::fs::read_dir(shard.unwrap().path()).unwrap() {
            let path = file.unwrap().path();
            let bytes = std::fs::read(&path).unwrap();
            assert!(
                !bytes.iter().copied().any(danger),
                "danger byte in {}",
                path.display()
            );
        }
    }
}

#[tokio::test]
async fn cache_hit_does_not_touch_the_network() {
    let dir = tempfile::tempdir().unwrap();

    // Prime the shared filesystem tier through a first instance.
    {
        let service = EnrichmentService::builder(test_config(dir.path()), full_creds())
            .with_dshield_api(MockProvider::serving(json!({
                "ip": {"asname": "CachedNet", "ascountry": "DE", "count": "2"}
            })))
            .with_urlhaus_api(MockProvider::serving(fixtures::urlhaus_tagged()))
            .with_spur_api(MockProvider::serving(fixtures::spur_datacenter()))
            .with_virustotal_api(MockProvider::unreachable())
            .build()
            .await
            .unwrap();
        service.enrich_session("prime", "192.0.2.5").await.unwrap();
    }

    // A fresh instance (empty memory tier) must serve from disk; its
    // adapters fail the test if the network is touched.
    let service = EnrichmentService::builder(test_config(dir.path()), full_creds())
        .with_dshield_api(MockProvider::unreachable())
        .with_urlhaus_api(MockProvider::unreachable())
        .with_spur_api(MockProvider::unreachable())
        .with_virustotal_api(MockProvider::unreachable())
        .build()
        .await
        .unwrap();

    let record = service.enrich_session("s-3", "192.0.2.5").await.unwrap();
    let enrichment = record.session_enrichment().unwrap();
    assert_eq!(enrichment.dshield["ip"]["asname"], json!("CachedNet"));
    assert_eq!(enrichment.urlhaus, "botnet, malware, trojan");
    assert_eq!(enrichment.spur[3], "DATACENTER");

    let snapshot = service.cache_snapshot();
    assert_eq!(snapshot.filesystem.unwrap().hits, 3);
    let summary = service.telemetry_summary().unwrap();
    assert_eq!(summary["api_stats"]["total_calls"], json!(0));
}

#[tokio::test]
async fn hostile_payload_is_sanitized_in_record_and_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let service = EnrichmentService::builder(test_config(dir.path()), full_creds())
        .with_dshield_api(MockProvider::serving(fixtures::dshield_hostile_unicode()))
        .with_urlhaus_api(MockProvider::serving(json!({"urls": []})))
        .with_spur_api(MockProvider::serving(json!({})))
        .with_virustotal_api(MockProvider::unreachable())
        .build()
        .await
        .unwrap();

    let record = service.enrich_session("s-4", "203.0.113.66").await.unwrap();
    let enrichment = record.session_enrichment().unwrap();
    assert_eq!(enrichment.dshield["ip"]["asname"], json!("EvilCorp"));
    assert_eq!(enrichment.dshield["ip"]["ascountry"], json!("US"));

    scan_dir_for_danger_bytes(&dir.path().join("dshield"));
}

#[tokio::test]
async fn second_lookup_is_served_from_memory() {
    let dir = tempfile::tempdir().unwrap();
    let dshield = MockProvider::serving(fixtures::dshield_high_risk());
    let service = EnrichmentService::builder(test_config(dir.path()), full_creds())
        .with_dshield_api(dshield.clone())
        .with_urlhaus_api(MockProvider::serving(json!({"urls": []})))
        .with_spur_api(MockProvider::serving(json!({})))
        .with_virustotal_api(MockProvider::unreachable())
        .build()
        .await
        .unwrap();

    service.enrich_session("a", "203.0.113.10").await.unwrap();
    service.enrich_session("b", "203.0.113.10").await.unwrap();
    assert_eq!(dshield.calls(), 1, "second lookup must hit the cache");
    assert_eq!(service.cache_snapshot().memory.unwrap().hits, 3);
}

#[tokio::test]
async fn provider_failure_does_not_poison_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let dshield = MockProvider::scripted(vec![
        Err(nectar_types::NectarError::network("dshield", "reset")),
        Err(nectar_types::NectarError::network("dshield", "reset")),
        Ok(fixtures::dshield_high_risk()),
    ]);
    let mut cfg = test_config(dir.path());
    cfg.retry.max_retries = 1;

    let service = EnrichmentService::builder(cfg, full_creds())
        .with_dshield_api(dshield.clone())
        .with_urlhaus_api(MockProvider::serving(json!({"urls": []})))
        .with_spur_api(MockProvider::serving(json!({})))
        .with_virustotal_api(MockProvider::unreachable())
        .build()
        .await
        .unwrap();

    // First call exhausts its retries and returns the sentinel.
    let first = service.enrich_session("a", "203.0.113.10").await.unwrap();
    assert_eq!(
        first.session_enrichment().unwrap().dshield,
        nectar::empty_dshield()
    );

    // The failure was not cached: the next call reaches the provider
    // and gets the real payload.
    let second = service.enrich_session("b", "203.0.113.10").await.unwrap();
    assert_eq!(
        second.session_enrichment().unwrap().dshield["ip"]["attacks"],
        json!("5")
    );
}

#[tokio::test]
async fn cleanup_job_reports_over_the_facade_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    for service in nectar_types::Service::ALL {
        cfg.ttls.set(service, std::time::Duration::from_millis(30));
    }
    let ttls = cfg.ttls.clone();

    let service = EnrichmentService::builder(cfg, full_creds())
        .with_dshield_api(MockProvider::serving(fixtures::dshield_high_risk()))
        .with_urlhaus_api(MockProvider::serving(fixtures::urlhaus_tagged()))
        .with_spur_api(MockProvider::serving(fixtures::spur_datacenter()))
        .with_virustotal_api(MockProvider::unreachable())
        .build()
        .await
        .unwrap();
    service.enrich_session("s", "203.0.113.40").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(70)).await;
    let cleaner = nectar::FilesystemTier::new(dir.path(), ttls);
    let report = cleaner.cleanup().await;
    assert_eq!(report.scanned, 3);
    assert_eq!(report.deleted, 3);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn records_match_the_wire_shape_after_a_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let service = EnrichmentService::builder(test_config(dir.path()), full_creds())
        .with_dshield_api(MockProvider::serving(fixtures::dshield_high_risk()))
        .with_urlhaus_api(MockProvider::serving(fixtures::urlhaus_tagged()))
        .with_spur_api(MockProvider::serving(fixtures::spur_datacenter()))
        .with_virustotal_api(MockProvider::unreachable())
        .build()
        .await
        .unwrap();

    let live = service.enrich_session("x", "203.0.113.50").await.unwrap();
    let cached = service.enrich_session("y", "203.0.113.50").await.unwrap();
    let (EnrichmentRecord::Session { enrichment: a, .. }, EnrichmentRecord::Session { enrichment: b, .. }) =
        (&live, &cached)
    else {
        panic!("expected session records");
    };
    assert_eq!(a, b);
}
