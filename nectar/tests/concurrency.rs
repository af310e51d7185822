mod helpers;

use std::sync::Arc;

use helpers::{full_creds, test_config};
use nectar::EnrichmentService;
use nectar_mock::{MockProvider, fixtures};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_ips_each_hit_every_provider_once() {
    let dir = tempfile::tempdir().unwrap();
    let dshield = MockProvider::serving(fixtures::dshield_high_risk());
    let urlhaus = MockProvider::serving(fixtures::urlhaus_tagged());
    let spur = MockProvider::serving(fixtures::spur_datacenter());

    let service = Arc::new(
        EnrichmentService::builder(test_config(dir.path()), full_creds())
            .with_dshield_api(dshield.clone())
            .with_urlhaus_api(urlhaus.clone())
            .with_spur_api(spur.clone())
            .with_virustotal_api(MockProvider::unreachable())
            .build()
            .await
            .unwrap(),
    );

    let n = 8;
    let mut tasks = Vec::new();
    for i in 0..n {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            let ip = format!("203.0.113.{i}");
            service.enrich_session(&format!("s-{i}"), &ip).await
        }));
    }
    for task in tasks {
        let record = task.await.expect("join").expect("enrich");
        assert!(record.session_enrichment().is_some());
    }

    // Exactly one provider invocation per service per distinct IP.
    assert_eq!(dshield.calls(), n);
    assert_eq!(urlhaus.calls(), n);
    assert_eq!(spur.calls(), n);

    // Exactly one cache write per service per IP, in every tier.
    let snapshot = service.cache_snapshot();
    let per_tier = (n as u64) * 3;
    assert_eq!(snapshot.memory.unwrap().stores, per_tier);
    assert_eq!(snapshot.filesystem.unwrap().stores, per_tier);
    for service_dir in ["dshield", "urlhaus", "spur"] {
        let mut files = 0;
        for shard in std::fs::read_dir(dir.path().join(service_dir)).unwrap() {
            files += std::fs::read_dir(shard.unwrap().path()).unwrap().count();
        }
        assert_eq!(files, n, "{service_dir} should hold one file per IP");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_key_races_are_benign() {
    let dir = tempfile::tempdir().unwrap();
    let dshield = MockProvider::serving(fixtures::dshield_high_risk());
    let service = Arc::new(
        EnrichmentService::builder(test_config(dir.path()), full_creds())
            .with_dshield_api(dshield.clone())
            .with_urlhaus_api(MockProvider::serving(serde_json::json!({"urls": []})))
            .with_spur_api(MockProvider::serving(serde_json::json!({})))
            .with_virustotal_api(MockProvider::unreachable())
            .build()
            .await
            .unwrap(),
    );

    let mut tasks = Vec::new();
    for i in 0..6 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service
                .enrich_session(&format!("s-{i}"), "203.0.113.10")
                .await
        }));
    }
    let mut records = Vec::new();
    for task in tasks {
        records.push(task.await.expect("join").expect("enrich"));
    }
    // Losers overwrite with the same sanitized payload; every caller
    // sees an identical enrichment block.
    let first = records[0].session_enrichment().unwrap();
    for record in &records[1..] {
        assert_eq!(record.session_enrichment().unwrap(), first);
    }
    assert!(dshield.calls() >= 1);
}
