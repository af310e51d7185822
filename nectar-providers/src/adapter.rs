//! Provider API traits and the reqwest-backed implementation.
//!
//! The traits are the seams: the façade talks to `dyn DshieldApi` and
//! friends, tests inject canned implementations, and [`HttpApi`] is the
//! production transport. One reqwest client is built per exchange and
//! dropped afterwards; clients are never handed out twice in parallel.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use nectar_middleware::QuotaApi;
use nectar_types::{Credentials, NectarError, QuotaSnapshot, Service};

/// Network reputation lookups.
#[async_trait]
pub trait DshieldApi: Send + Sync {
    /// Fetch the per-IP reputation report.
    async fn ip_report(&self, ip: &str) -> Result<Value, NectarError>;
}

/// URL/host abuse feed lookups.
#[async_trait]
pub trait UrlhausApi: Send + Sync {
    /// Fetch the per-host URL report.
    async fn host_report(&self, ip: &str) -> Result<Value, NectarError>;
}

/// IP context lookups.
#[async_trait]
pub trait SpurApi: Send + Sync {
    /// Fetch the per-IP context document.
    async fn ip_context(&self, ip: &str) -> Result<Value, NectarError>;
}

/// File scanner lookups.
#[async_trait]
pub trait VirustotalApi: Send + Sync {
    /// Fetch the report for a file hash. `Ok(None)` means the scanner
    /// has never seen the file (HTTP 404), which is not an error.
    async fn file_report(&self, file_hash: &str) -> Result<Option<Value>, NectarError>;

    /// Release any held resources.
    async fn close(&self) {}
}

/// Upstream endpoint bases, overridable for tests.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Reputation API base, e.g. `https://isc.sans.edu/api`.
    pub dshield: String,
    /// Abuse feed host endpoint.
    pub urlhaus: String,
    /// IP-context base, per-IP path appended.
    pub spur: String,
    /// File-scanner v3 API base.
    pub virustotal: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dshield: "https://isc.sans.edu/api".to_string(),
            urlhaus: "https://urlhaus-api.abuse.ch/v1/host/".to_string(),
            spur: "https://spur.us/api/v1/context".to_string(),
            virustotal: "https://www.virustotal.com/api/v3".to_string(),
        }
    }
}

/// Production adapter: reqwest against the real provider endpoints.
#[derive(Clone)]
pub struct HttpApi {
    creds: Credentials,
    timeout: Duration,
    endpoints: Endpoints,
}

impl HttpApi {
    /// Build an adapter against the default endpoints.
    #[must_use]
    pub fn new(creds: Credentials, timeout: Duration) -> Self {
        Self::with_endpoints(creds, timeout, Endpoints::default())
    }

    /// Build an adapter against custom endpoints.
    #[must_use]
    pub const fn with_endpoints(creds: Credentials, timeout: Duration, endpoints: Endpoints) -> Self {
        Self {
            creds,
            timeout,
            endpoints,
        }
    }

    /// One client per exchange; dropped when the call finishes.
    fn session(&self, service: Service) -> Result<reqwest::Client, NectarError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| NectarError::provider(service.as_str(), e.to_string()))
    }

    fn credential(&self, service: Service) -> Result<&str, NectarError> {
        self.creds
            .for_service(service)
            .ok_or_else(|| NectarError::provider(service.as_str(), "credential not configured"))
    }

    fn transport_error(service: Service, err: &reqwest::Error) -> NectarError {
        if err.is_timeout() {
            NectarError::Timeout {
                service: service.as_str().to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            NectarError::network(service.as_str(), err.to_string())
        } else {
            NectarError::provider(service.as_str(), err.to_string())
        }
    }

    /// Map a non-success status onto the error taxonomy. The file
    /// scanner reports rate limiting as 401, so that status becomes a
    /// rate-limit signal for it alone; elsewhere 401 is terminal.
    fn status_error(service: Service, status: StatusCode, retry_after_ms: Option<u64>) -> NectarError {
        match status.as_u16() {
            404 => NectarError::not_found(format!("{service} resource")),
            429 => NectarError::RateLimited {
                service: service.as_str().to_string(),
                status: 429,
                retry_after_ms,
            },
            401 if service == Service::Virustotal => NectarError::RateLimited {
                service: service.as_str().to_string(),
                status: 401,
                retry_after_ms,
            },
            code => NectarError::Status {
                service: service.as_str().to_string(),
                status: code,
            },
        }
    }

    fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(|secs| secs * 1000)
    }

    async fn read_json(service: Service, response: reqwest::Response) -> Result<Value, NectarError> {
        let status = response.status();
        if !status.is_success() {
            let hint = Self::retry_after_ms(&response);
            if status.as_u16() == 401 {
                // Logged with enough detail to tell a stale key from a
                // rate limit; behavior stays provider-specific.
                warn!(
                    target: "nectar::provider",
                    %service,
                    status = status.as_u16(),
                    "unauthorized response (credential error or provider rate limit)"
                );
            }
            return Err(Self::status_error(service, status, hint));
        }
        let text = response
            .text()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        serde_json::from_str(&text).map_err(|e| {
            debug!(target: "nectar::provider", %service, %e, "response body is not JSON");
            NectarError::malformed(service.as_str(), e.to_string())
        })
    }
}

#[async_trait]
impl DshieldApi for HttpApi {
    async fn ip_report(&self, ip: &str) -> Result<Value, NectarError> {
        let service = Service::Dshield;
        let email = self.credential(service)?;
        let url = format!("{}/ip/{ip}?email={email}&json", self.endpoints.dshield);
        let session = self.session(service)?;
        let response = session
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        Self::read_json(service, response).await
    }
}

#[async_trait]
impl UrlhausApi for HttpApi {
    async fn host_report(&self, ip: &str) -> Result<Value, NectarError> {
        let service = Service::Urlhaus;
        let key = self.credential(service)?;
        let session = self.session(service)?;
        let response = session
            .post(&self.endpoints.urlhaus)
            .header("Auth-Key", key)
            .form(&[("host", ip)])
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        Self::read_json(service, response).await
    }
}

#[async_trait]
impl SpurApi for HttpApi {
    async fn ip_context(&self, ip: &str) -> Result<Value, NectarError> {
        let service = Service::Spur;
        let token = self.credential(service)?;
        let url = format!("{}/{ip}", self.endpoints.spur);
        let session = self.session(service)?;
        let response = session
            .get(&url)
            .header("Token", token)
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        Self::read_json(service, response).await
    }
}

#[async_trait]
impl VirustotalApi for HttpApi {
    async fn file_report(&self, file_hash: &str) -> Result<Option<Value>, NectarError> {
        let service = Service::Virustotal;
        let key = self.credential(service)?;
        let url = format!("{}/files/{file_hash}", self.endpoints.virustotal);
        let session = self.session(service)?;
        let response = session
            .get(&url)
            .header("x-apikey", key)
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        match Self::read_json(service, response).await {
            Ok(value) => Ok(Some(value)),
            Err(NectarError::NotFound { .. }) => {
                debug!(target: "nectar::provider", file_hash, "scanner has no report");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl QuotaApi for HttpApi {
    async fn fetch_snapshot(&self) -> Result<QuotaSnapshot, NectarError> {
        let service = Service::Virustotal;
        let key = self.credential(service)?;
        let session = self.session(service)?;

        let me = session
            .get(format!("{}/users/me", self.endpoints.virustotal))
            .header("x-apikey", key)
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        let me = Self::read_json(service, me).await?;
        let user_id = me
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| NectarError::malformed(service.as_str(), "user id missing"))?
            .to_string();

        let quotas = session
            .get(format!(
                "{}/users/{user_id}/overall_quotas",
                self.endpoints.virustotal
            ))
            .header("x-apikey", key)
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        let quotas = Self::read_json(service, quotas).await?;

        let usage = session
            .get(format!(
                "{}/users/{user_id}/api_usage",
                self.endpoints.virustotal
            ))
            .header("x-apikey", key)
            .send()
            .await
            .map_err(|e| Self::transport_error(service, &e))?;
        let usage = Self::read_json(service, usage).await?;

        let limit = |field: &str| quota_field(&quotas, field);
        let used = |field: &str| quota_field(&usage, field);
        Ok(QuotaSnapshot {
            daily_used: used("api_requests_daily"),
            daily_limit: limit("api_requests_daily"),
            hourly_used: used("api_requests_hourly"),
            hourly_limit: limit("api_requests_hourly"),
            monthly_used: used("api_requests_monthly"),
            monthly_limit: limit("api_requests_monthly"),
            api_used: used("api_requests"),
            api_limit: limit("api_requests"),
            observed_at: Utc::now(),
        })
    }
}

fn quota_field(document: &Value, field: &str) -> u64 {
    document
        .pointer(&format!("/data/attributes/{field}"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
