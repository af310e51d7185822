//! Enrich one IP from the command line.
//!
//! Credentials come from the environment; any missing credential simply
//! disables its provider.
//!
//! ```sh
//! DSHIELD_EMAIL=you@example.org cargo run --example enrich_ip -- 203.0.113.10
//! ```

use nectar::{Credentials, EnrichmentConfig, EnrichmentService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nectar=debug".into()),
        )
        .init();

    let creds = Credentials {
        dshield_email: std::env::var("DSHIELD_EMAIL").ok(),
        urlhaus_key: std::env::var("URLHAUS_KEY").ok(),
        spur_token: std::env::var("SPUR_TOKEN").ok(),
        virustotal_key: std::env::var("VT_API_KEY").ok(),
    };
    let cfg = EnrichmentConfig {
        cache_base: "cache".into(),
        ..EnrichmentConfig::default()
    };

    let service = EnrichmentService::builder(cfg, creds).build().await?;
    let ip = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "203.0.113.10".to_string());

    let record = service.enrich_session("cli-demo", &ip).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    println!("flags: {:?}", service.session_flags(&record));

    service.close().await;
    Ok(())
}
