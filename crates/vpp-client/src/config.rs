//! VPP client configuration.
//!
//! Configures the service base URL, the session token and the transport
//! and backoff timings. Defaults point to the production service. Override
//! via environment variables or explicit construction for testing.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

/// Production base URL. The bootstrap path is resolved relative to it.
pub const DEFAULT_BASE_URL: &str = "https://vpp.itunes.apple.com/WebObjects/MZFinance.woa/wa/";

/// Delay applied when an overload signal carries no usable `Retry-After`.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Upper bound on any server-requested delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Configuration for connecting to the VPP service.
///
/// Custom `Debug` implementation redacts the `s_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct VppConfig {
    /// Base URL; always ends with `/` so relative paths resolve beneath it.
    pub base_url: Url,
    /// Session token exactly as downloaded (base64 text), sent as `sToken`.
    pub s_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Delay used when `Retry-After` is missing or unparseable.
    pub default_retry_delay: Duration,
    /// Cap on any computed retry delay.
    pub max_retry_delay: Duration,
}

impl std::fmt::Debug for VppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VppConfig")
            .field("base_url", &self.base_url)
            .field("s_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("default_retry_delay", &self.default_retry_delay)
            .field("max_retry_delay", &self.max_retry_delay)
            .finish()
    }
}

impl VppConfig {
    /// Build a configuration against `base_url` with default timings.
    pub fn new(base_url: &str, s_token: impl Into<String>) -> Result<Self, ConfigError> {
        let s_token = s_token.into().trim().to_string();
        if s_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Self {
            base_url: parse_base_url("base_url", base_url)?,
            s_token: Zeroizing::new(s_token),
            timeout_secs: 30,
            default_retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: MAX_RETRY_DELAY,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `VPP_BASE_URL` (default: the production service)
    /// - `VPP_STOKEN` (token text) or `VPP_STOKEN_FILE` (path to the downloaded token file)
    /// - `VPP_TIMEOUT_SECS` (default: 30)
    /// - `VPP_RETRY_DELAY_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let s_token = match std::env::var("VPP_STOKEN") {
            Ok(token) => token,
            Err(_) => {
                let path = std::env::var("VPP_STOKEN_FILE").map_err(|_| ConfigError::MissingToken)?;
                read_token_file(&path)?
            }
        };
        let base_url = std::env::var("VPP_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(&base_url, s_token)?.with_env_timings())
    }

    /// Apply `VPP_TIMEOUT_SECS` and `VPP_RETRY_DELAY_SECS` when set.
    pub fn with_env_timings(mut self) -> Self {
        if let Some(secs) = env_u64("VPP_TIMEOUT_SECS") {
            self.timeout_secs = secs;
        }
        if let Some(secs) = env_u64("VPP_RETRY_DELAY_SECS") {
            self.default_retry_delay = Duration::from_secs(secs);
        }
        self
    }

    /// Create a configuration pointing to a local simulator or mock server.
    ///
    /// Timings are shortened so tests exercising overload paths stay fast.
    pub fn local_mock(port: u16, token: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new(&format!("http://127.0.0.1:{port}/"), token)?;
        config.timeout_secs = 5;
        config.default_retry_delay = Duration::from_millis(50);
        config.max_retry_delay = Duration::from_secs(2);
        Ok(config)
    }
}

/// Read a downloaded sToken file, trimming surrounding whitespace.
pub fn read_token_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| ConfigError::TokenFile(path.to_string(), e.to_string()))
}

fn env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

fn parse_base_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(
            name.to_string(),
            "URL cannot be used as a base".into(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("VPP_STOKEN or VPP_STOKEN_FILE is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("cannot read sToken file {0}: {1}")]
    TokenFile(String, String),
    #[error("malformed sToken: {0}")]
    InvalidToken(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
