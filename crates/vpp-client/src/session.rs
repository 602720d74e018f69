//! Session client.
//!
//! Owns the HTTP transport, the base URL, the session token and the
//! bootstrap-populated [`ServiceConfig`]. Every domain verb goes through
//! [`Session::dispatch`]: look up the endpoint, attach the token, POST,
//! apply the overload policy, decode the envelope.
//!
//! The service configuration is installed exactly once and never changes
//! afterwards, so a session can be shared across tasks behind an `Arc`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;
use zeroize::Zeroizing;

use crate::backoff::BackoffPolicy;
use crate::batch::{BatchCursor, CursorFields, PagedResponse};
use crate::config::{ConfigError, VppConfig};
use crate::envelope::{self, Authenticated, Envelope, MEDIA_TYPE};
use crate::error::VppError;
use crate::service_config::{self, ServiceConfig};

/// User agent sent on every request.
pub const USER_AGENT: &str = concat!("vpp-client/", env!("CARGO_PKG_VERSION"));

/// Request body of a paged call: typed fields plus cursor fields.
#[derive(Serialize)]
struct Paged<'a, T: Serialize> {
    #[serde(flatten)]
    body: &'a T,
    #[serde(flatten)]
    cursor: CursorFields<'a>,
}

/// An authenticated session against one VPP deployment.
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    s_token: Zeroizing<String>,
    backoff: BackoffPolicy,
    service_config: OnceLock<Arc<ServiceConfig>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("s_token", &"[REDACTED]")
            .field("backoff", &self.backoff)
            .field("bootstrapped", &self.service_config.get().is_some())
            .finish()
    }
}

impl Session {
    /// Build a session without contacting the service.
    ///
    /// The transport never follows redirects itself: a 3xx is an overload
    /// signal handled by [`BackoffPolicy`].
    pub fn new(config: &VppConfig) -> Result<Self, VppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            s_token: config.s_token.clone(),
            backoff: BackoffPolicy::from_config(config),
            service_config: OnceLock::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The installed service configuration, if bootstrap has run.
    pub fn service_config(&self) -> Option<&Arc<ServiceConfig>> {
        self.service_config.get()
    }

    /// Fetch and install the service configuration.
    ///
    /// Once installed the configuration is never replaced; later calls
    /// return it without contacting the service.
    pub async fn bootstrap(&self) -> Result<Arc<ServiceConfig>, VppError> {
        if let Some(existing) = self.service_config.get() {
            return Ok(Arc::clone(existing));
        }

        let fetched = service_config::resolve(self).await?;
        let missing = fetched.missing_operations();
        if !missing.is_empty() {
            tracing::warn!(?missing, "service configuration does not list every operation");
        }
        tracing::info!(endpoints = fetched.len(), "VPP service configuration loaded");

        Ok(Arc::clone(self.service_config.get_or_init(|| Arc::new(fetched))))
    }

    /// Resolve an operation name to its endpoint.
    pub fn endpoint(&self, operation: &str) -> Result<Url, VppError> {
        self.service_config
            .get()
            .and_then(|cfg| cfg.endpoint(operation))
            .cloned()
            .ok_or_else(|| VppError::UnknownOperation {
                operation: operation.to_string(),
            })
    }

    /// Send `body` to `operation` and decode the envelope payload.
    ///
    /// The session token is attached as `sToken`. A `status == -1` envelope
    /// becomes [`VppError::Domain`]; its payload is never decoded.
    pub async fn dispatch<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp, VppError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(operation)?;
        let payload = envelope::encode(&Authenticated {
            body,
            s_token: self.s_token.as_str(),
        })
        .map_err(|e| VppError::Encode {
            operation: operation.to_string(),
            source: e,
        })?;

        tracing::debug!(operation, %url, "dispatching VPP request");
        let response = self
            .execute(operation, || {
                self.http
                    .post(url.clone())
                    .header(CONTENT_TYPE, MEDIA_TYPE)
                    .header(ACCEPT, MEDIA_TYPE)
                    .body(payload.clone())
            })
            .await?;

        let decoded = envelope::decode::<Resp>(&response).map_err(|e| VppError::Decode {
            operation: operation.to_string(),
            source: e,
        })?;

        match decoded {
            Envelope::Ok(payload) => Ok(payload),
            Envelope::Err(err) => {
                tracing::debug!(operation, code = err.code, "service reported error");
                Err(VppError::Domain {
                    operation: operation.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Dispatch a paged call and advance `cursor` from the response.
    ///
    /// The cursor is left untouched if the call fails.
    pub async fn dispatch_paged<Req, Resp>(
        &self,
        operation: &str,
        body: &Req,
        cursor: &mut BatchCursor,
    ) -> Result<Resp, VppError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + PagedResponse,
    {
        let request = Paged {
            body,
            cursor: cursor.request_fields(),
        };
        let response: Resp = self.dispatch(operation, &request).await?;
        cursor.advance(response.tokens());
        Ok(response)
    }

    /// Send a request, retrying once after an overload signal.
    ///
    /// `build` must produce the identical request on each call. Returns the
    /// body of a 2xx response.
    pub(crate) async fn execute<F>(&self, operation: &str, build: F) -> Result<Vec<u8>, VppError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut response = self.send_once(operation, &build).await?;

        if BackoffPolicy::is_overload(response.status()) {
            let delay = self.backoff.delay_from_headers(response.headers(), Utc::now());
            tracing::warn!(
                operation,
                status = response.status().as_u16(),
                delay_ms = delay.as_millis() as u64,
                "VPP service signalled overload, retrying once"
            );
            self.backoff.wait(delay).await;

            response = self.send_once(operation, &build).await?;
            if BackoffPolicy::is_overload(response.status()) {
                let retry_after = self.backoff.delay_from_headers(response.headers(), Utc::now());
                return Err(VppError::Overloaded {
                    operation: operation.to_string(),
                    status: response.status().as_u16(),
                    retry_after,
                });
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| VppError::Transport {
                operation: operation.to_string(),
                source: e,
            })?;
            return Err(VppError::Service {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| VppError::Transport {
                operation: operation.to_string(),
                source: e,
            })
    }

    async fn send_once<F>(&self, operation: &str, build: &F) -> Result<reqwest::Response, VppError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let response = build().send().await.map_err(|e| VppError::Transport {
            operation: operation.to_string(),
            source: e,
        })?;
        tracing::debug!(operation, status = response.status().as_u16(), "received VPP response");
        Ok(response)
    }
}
