use std::time::Duration;

use httpmock::prelude::*;
use nectar_providers::adapter::{DshieldApi, Endpoints, HttpApi, SpurApi, UrlhausApi, VirustotalApi};
use nectar_types::{Credentials, NectarError};
use serde_json::json;

fn creds() -> Credentials {
    Credentials {
        dshield_email: Some("sensor@example.org".to_string()),
        urlhaus_key: Some("uh-key".to_string()),
        spur_token: Some("spur-token".to_string()),
        virustotal_key: Some("vt-key".to_string()),
    }
}

fn api_for(server: &MockServer) -> HttpApi {
    let endpoints = Endpoints {
        dshield: server.base_url(),
        urlhaus: format!("{}/v1/host/", server.base_url()),
        spur: format!("{}/context", server.base_url()),
        virustotal: server.base_url(),
    };
    HttpApi::with_endpoints(creds(), Duration::from_secs(5), endpoints)
}

#[tokio::test]
async fn dshield_request_carries_the_registered_email() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/ip/203.0.113.10")
                .query_param("email", "sensor@example.org");
            then.status(200)
                .json_body(json!({"ip": {"asname": "ExampleNet", "ascountry": "NL"}}));
        })
        .await;

    let report = api_for(&server).ip_report("203.0.113.10").await.unwrap();
    assert_eq!(report["ip"]["asname"], "ExampleNet");
    mock.assert_async().await;
}

#[tokio::test]
async fn urlhaus_posts_the_host_form_with_auth_header() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/host/")
                .header("Auth-Key", "uh-key")
                .body_includes("host=198.51.100.7");
            then.status(200)
                .json_body(json!({"query_status": "ok", "urls": [{"tags": ["malware"]}]}));
        })
        .await;

    let report = api_for(&server).host_report("198.51.100.7").await.unwrap();
    assert_eq!(report["urls"][0]["tags"][0], "malware");
    mock.assert_async().await;
}

#[tokio::test]
async fn spur_sends_the_token_header() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/context/198.51.100.7")
                .header("Token", "spur-token");
            then.status(200).json_body(json!({"infrastructure": "VPN"}));
        })
        .await;

    let context = api_for(&server).ip_context("198.51.100.7").await.unwrap();
    assert_eq!(context["infrastructure"], "VPN");
    mock.assert_async().await;
}

#[tokio::test]
async fn scanner_404_reads_as_no_report() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/deadbeef");
            then.status(404).json_body(json!({"error": {"code": "NotFoundError"}}));
        })
        .await;

    let report = api_for(&server).file_report("deadbeef").await.unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn scanner_401_is_a_rate_limit_signal_not_a_terminal_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/deadbeef");
            then.status(401);
        })
        .await;

    let err = api_for(&server).file_report("deadbeef").await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.status(), Some(401));
    assert!(err.is_transient());
}

#[tokio::test]
async fn retry_after_header_is_surfaced_in_the_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ip/203.0.113.10");
            then.status(429).header("Retry-After", "2");
        })
        .await;

    let err = api_for(&server).ip_report("203.0.113.10").await.unwrap_err();
    assert_eq!(err.retry_after_ms(), Some(2_000));
}

#[tokio::test]
async fn unauthorized_on_the_reputation_service_is_terminal() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ip/203.0.113.10");
            then.status(401);
        })
        .await;

    let err = api_for(&server).ip_report("203.0.113.10").await.unwrap_err();
    assert!(matches!(err, NectarError::Status { status: 401, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn non_json_bodies_surface_as_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ip/203.0.113.10");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let err = api_for(&server).ip_report("203.0.113.10").await.unwrap_err();
    assert!(matches!(err, NectarError::Malformed { .. }));
}

#[tokio::test]
async fn quota_snapshot_composes_usage_and_limits() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users/me").header("x-apikey", "vt-key");
            then.status(200).json_body(json!({"data": {"id": "user-1"}}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users/user-1/overall_quotas");
            then.status(200).json_body(json!({
                "data": {"attributes": {
                    "api_requests_daily": 500,
                    "api_requests_hourly": 240,
                    "api_requests_monthly": 15000,
                    "api_requests": 1000000,
                }}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users/user-1/api_usage");
            then.status(200).json_body(json!({
                "data": {"attributes": {
                    "api_requests_daily": 480,
                    "api_requests_hourly": 10,
                    "api_requests_monthly": 900,
                    "api_requests": 900,
                }}
            }));
        })
        .await;

    let snapshot = nectar_middleware::QuotaApi::fetch_snapshot(&api_for(&server))
        .await
        .unwrap();
    assert_eq!(snapshot.daily_used, 480);
    assert_eq!(snapshot.daily_limit, 500);
    assert!(snapshot.daily_usage_percent() > 95.0);
    assert_eq!(snapshot.hourly_remaining(), 230);
}
