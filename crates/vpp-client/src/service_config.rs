//! Bootstrap service configuration.
//!
//! The service publishes a configuration document at the well-known path
//! `VPPServiceConfigSrv` under the base URL. It maps each logical operation
//! (`getUsersSrvUrl`, `manageVPPLicensesByAdamIdSrvUrl`, ...) to the absolute
//! URL that serves it, and carries batch limits and the error-code catalogue.
//! The document is fetched once, unauthenticated, when a client is built.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::envelope::{self, MEDIA_TYPE};
use crate::error::VppError;
use crate::session::Session;

/// Path of the bootstrap document, relative to the base URL.
pub const SERVICE_CONFIG_PATH: &str = "VPPServiceConfigSrv";

/// Name used for the bootstrap call in logs and errors.
pub const BOOTSTRAP_OPERATION: &str = "VPPServiceConfigSrv";

/// Every operation the domain verbs dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterUser,
    EditUser,
    GetUser,
    RetireUser,
    GetUsers,
    GetLicenses,
    AssociateLicense,
    DisassociateLicense,
    ManageLicensesByAdamId,
    GetAssets,
    ClientConfig,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Self::RegisterUser,
        Self::EditUser,
        Self::GetUser,
        Self::RetireUser,
        Self::GetUsers,
        Self::GetLicenses,
        Self::AssociateLicense,
        Self::DisassociateLicense,
        Self::ManageLicensesByAdamId,
        Self::GetAssets,
        Self::ClientConfig,
    ];

    /// Key of this operation in the service configuration document.
    pub fn key(self) -> &'static str {
        match self {
            Self::RegisterUser => "registerUserSrvUrl",
            Self::EditUser => "editUserSrvUrl",
            Self::GetUser => "getUserSrvUrl",
            Self::RetireUser => "retireUserSrvUrl",
            Self::GetUsers => "getUsersSrvUrl",
            Self::GetLicenses => "getLicensesSrvUrl",
            Self::AssociateLicense => "associateLicenseSrvUrl",
            Self::DisassociateLicense => "disassociateLicenseSrvUrl",
            Self::ManageLicensesByAdamId => "manageVPPLicensesByAdamIdSrvUrl",
            Self::GetAssets => "getVPPAssetsSrvUrl",
            Self::ClientConfig => "clientConfigSrvUrl",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// An entry of the server's published error catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCode {
    pub error_number: i64,
    pub error_message: String,
}

/// Capacity limits published by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceLimits {
    /// Maximum targets in one bulk association.
    pub max_batch_associate_license_count: Option<usize>,
    /// Maximum targets in one bulk disassociation.
    pub max_batch_disassociate_license_count: Option<usize>,
}

/// Immutable operation-name → endpoint map plus limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ServiceConfig {
    endpoints: BTreeMap<String, Url>,
    limits: ServiceLimits,
    error_codes: Vec<ErrorCode>,
}

impl ServiceConfig {
    pub fn new(endpoints: BTreeMap<String, Url>, limits: ServiceLimits) -> Self {
        Self {
            endpoints,
            limits,
            error_codes: Vec::new(),
        }
    }

    /// Endpoint registered under `name`, if any.
    pub fn endpoint(&self, name: &str) -> Option<&Url> {
        self.endpoints.get(name)
    }

    /// All `(name, url)` pairs, ordered by name.
    pub fn endpoints(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.endpoints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn limits(&self) -> ServiceLimits {
        self.limits
    }

    pub fn error_codes(&self) -> &[ErrorCode] {
        &self.error_codes
    }

    /// Catalogue message for a numeric error code.
    pub fn describe_error(&self, code: i64) -> Option<&str> {
        self.error_codes
            .iter()
            .find(|e| e.error_number == code)
            .map(|e| e.error_message.as_str())
    }

    /// The VPP web portal URL, when published.
    pub fn website_url(&self) -> Option<&Url> {
        self.endpoint("vppWebsiteUrl")
    }

    /// Operations the domain verbs need that this document does not list.
    pub fn missing_operations(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| !self.endpoints.contains_key(op.key()))
            .collect()
    }
}

impl TryFrom<Map<String, Value>> for ServiceConfig {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut endpoints = BTreeMap::new();
        for (name, value) in &fields {
            if !name.ends_with("Url") {
                continue;
            }
            // Informational fields may be blank or relative; only absolute URLs are endpoints.
            if let Some(Ok(url)) = value.as_str().map(Url::parse) {
                endpoints.insert(name.clone(), url);
            }
        }

        let limits = ServiceLimits {
            max_batch_associate_license_count: limit(&fields, "maxBatchAssociateLicenseCount")?,
            max_batch_disassociate_license_count: limit(&fields, "maxBatchDisassociateLicenseCount")?,
        };

        let error_codes = match fields.get("errorCodes") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| format!("errorCodes: {e}"))?,
        };

        Ok(Self {
            endpoints,
            limits,
            error_codes,
        })
    }
}

fn limit(fields: &Map<String, Value>, name: &str) -> Result<Option<usize>, String> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("{name} must be a non-negative integer, got {v}")),
    }
}

/// Fetch and decode the service configuration document.
///
/// Issues an unauthenticated `GET {base_url}VPPServiceConfigSrv` through the
/// session's overload handling. Does not install the result; see
/// [`Session::bootstrap`].
pub async fn resolve(session: &Session) -> Result<ServiceConfig, VppError> {
    let url = session.base_url().join(SERVICE_CONFIG_PATH).map_err(|e| {
        VppError::Config(crate::config::ConfigError::InvalidUrl(
            SERVICE_CONFIG_PATH.into(),
            e.to_string(),
        ))
    })?;

    tracing::debug!(%url, "fetching VPP service configuration");
    let body = session
        .execute(BOOTSTRAP_OPERATION, || {
            session.http().get(url.clone()).header(ACCEPT, MEDIA_TYPE)
        })
        .await?;

    envelope::decode::<ServiceConfig>(&body)
        .map_err(|e| VppError::Decode {
            operation: BOOTSTRAP_OPERATION.into(),
            source: e,
        })?
        .into_result()
        .map_err(|e| VppError::Domain {
            operation: BOOTSTRAP_OPERATION.into(),
            source: e,
        })
}
