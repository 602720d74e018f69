//! # vpp-client -- Typed Rust client for the Volume Purchase Program service
//!
//! Manages the users, licenses and assets of a volume-purchasing account on
//! behalf of a device-management system:
//! - **Users** via `registerUserSrvUrl`, `getUsersSrvUrl`, ...
//! - **Licenses** via `getLicensesSrvUrl`, `manageVPPLicensesByAdamIdSrvUrl`, ...
//! - **Assets** via `getVPPAssetsSrvUrl`
//! - **Client context** via `clientConfigSrvUrl`
//!
//! ## Architecture
//!
//! Nothing is addressed by a hard-coded path except the bootstrap document.
//! [`VppClient::connect`] fetches `VPPServiceConfigSrv` once, installs the
//! operation-name → URL map in the shared [`Session`], and every verb then
//! dispatches by operation name through it:
//!
//! ```text
//! verb ─▶ Session::dispatch ─▶ endpoint lookup ─▶ POST {sToken, ...}
//!                                                   │
//!              3xx / 503 ◀──────────────────────────┤
//!              wait Retry-After, resend once        │
//!                                                   ▼
//!                                   envelope decode (status 0 / -1)
//! ```

pub mod assets;
pub mod backoff;
pub mod batch;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod licenses;
pub mod service_config;
pub mod session;
pub mod stoken;
pub mod users;

pub use batch::{BatchCursor, CursorState, Page};
pub use config::VppConfig;
pub use error::{DomainError, VppError};
pub use service_config::{Operation, ServiceConfig};
pub use session::Session;
pub use stoken::SToken;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Top-level VPP client. Holds sub-clients for each capability over one
/// bootstrapped session. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct VppClient {
    session: Arc<Session>,
    users: users::UsersClient,
    licenses: licenses::LicensesClient,
    assets: assets::AssetsClient,
    context: context::ContextClient,
}

impl VppClient {
    /// Build a session from `config` and bootstrap it.
    ///
    /// Fails if the service configuration cannot be fetched; no verb is
    /// usable before that succeeds.
    pub async fn connect(config: VppConfig) -> Result<Self, VppError> {
        let session = Arc::new(Session::new(&config)?);
        session.bootstrap().await?;
        Ok(Self::from_session(session))
    }

    /// Wrap an existing session. Verbs fail with
    /// [`VppError::UnknownOperation`] until it has been bootstrapped.
    pub fn from_session(session: Arc<Session>) -> Self {
        Self {
            users: users::UsersClient::new(Arc::clone(&session)),
            licenses: licenses::LicensesClient::new(Arc::clone(&session)),
            assets: assets::AssetsClient::new(Arc::clone(&session)),
            context: context::ContextClient::new(Arc::clone(&session)),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The installed service configuration.
    pub fn service_config(&self) -> Option<&Arc<ServiceConfig>> {
        self.session.service_config()
    }

    /// Access the user-management client.
    pub fn users(&self) -> &users::UsersClient {
        &self.users
    }

    /// Access the license-management client.
    pub fn licenses(&self) -> &licenses::LicensesClient {
        &self.licenses
    }

    /// Access the asset-listing client.
    pub fn assets(&self) -> &assets::AssetsClient {
        &self.assets
    }

    /// Access the client-context client.
    pub fn context(&self) -> &context::ContextClient {
        &self.context
    }

    /// Dispatch an operation the typed verbs do not cover.
    pub async fn dispatch<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp, VppError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.session.dispatch(operation, body).await
    }
}

/// Fetch the service configuration without installing it in a session.
pub async fn fetch_service_config(config: &VppConfig) -> Result<ServiceConfig, VppError> {
    let session = Session::new(config)?;
    service_config::resolve(&session).await
}
