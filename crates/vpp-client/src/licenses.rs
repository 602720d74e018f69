//! VPP license management.
//!
//! Licenses are listed through the paged `getLicensesSrvUrl` operation and
//! assigned either one at a time through the legacy associate/disassociate
//! endpoints or in bulk per asset through `manageVPPLicensesByAdamIdSrvUrl`.
//!
//! A bulk request is assembled with [`LicenseOperations`], which enforces the
//! target-kind rules locally:
//!
//! - an association set holds users or device serial numbers, never both;
//! - a disassociation set holds exactly one of users, serial numbers or
//!   license ids;
//! - neither set may exceed the batch limits published in the service
//!   configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::{BatchCursor, Page, PageTokens, PagedResponse, TokenTrail};
use crate::error::{DomainError, VppError};
use crate::service_config::{Operation, ServiceLimits};
use crate::session::Session;
use crate::users::{RegistrationStatus, UserKey, VppUser};

// -- Types matching VPP wire schemas -------------------------------------------

/// Pricing tier of a licensed product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricingParam {
    /// Standard quality.
    #[serde(rename = "STDQ")]
    Standard,
    /// High quality.
    #[serde(rename = "PLUS")]
    Plus,
    #[serde(other)]
    Unknown,
}

impl PricingParam {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STDQ",
            Self::Plus => "PLUS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::str::FromStr for PricingParam {
    type Err = VppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STDQ" => Ok(Self::Standard),
            "PLUS" => Ok(Self::Plus),
            other => Err(VppError::InvalidRequest(format!(
                "pricing param must be STDQ or PLUS, got {other}"
            ))),
        }
    }
}

/// A license for one product, optionally assigned to a user or device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VppLicense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_id_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adam_id_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_param: Option<PricingParam>,
    #[serde(default)]
    pub is_irrevocable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_user_id_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub its_id_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RegistrationStatus>,
}

impl VppLicense {
    /// Whether the license is held by a user or device.
    pub fn is_assigned(&self) -> bool {
        self.user_id.is_some()
            || self.client_user_id_str.as_deref().is_some_and(|s| !s.is_empty())
            || self.serial_number.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Filters for listing licenses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLicensesOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    adam_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    assigned_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pricing_param: Option<PricingParam>,
}

impl GetLicensesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only licenses for one product.
    pub fn adam_id(mut self, adam_id: impl Into<String>) -> Result<Self, VppError> {
        let adam_id = adam_id.into();
        if adam_id.trim().is_empty() {
            return Err(VppError::InvalidRequest("adam id must not be empty".into()));
        }
        self.adam_id = Some(adam_id);
        Ok(self)
    }

    /// Only licenses currently assigned.
    pub fn assigned_only(mut self, assigned_only: bool) -> Self {
        self.assigned_only = assigned_only;
        self
    }

    pub fn pricing_param(mut self, pricing_param: PricingParam) -> Self {
        self.pricing_param = Some(pricing_param);
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLicensesResponse {
    #[serde(default)]
    licenses: Vec<VppLicense>,
    #[serde(flatten)]
    tokens: PageTokens,
}

impl PagedResponse for GetLicensesResponse {
    fn tokens(&self) -> &PageTokens {
        &self.tokens
    }
}

/// Single-license association request. The license id takes precedence over
/// the product id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssociateRequest<'a> {
    #[serde(flatten)]
    user: &'a UserKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    license_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    adam_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pricing_param: Option<PricingParam>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DisassociateRequest<'a> {
    #[serde(flatten)]
    user: &'a UserKey,
    license_id: &'a str,
}

/// Result of a single associate or disassociate call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssignmentResult {
    #[serde(default)]
    pub license: Option<VppLicense>,
    #[serde(default)]
    pub user: Option<VppUser>,
}

/// One target of a bulk operation and its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssociation {
    #[serde(default)]
    pub client_user_id_str: Option<String>,
    #[serde(default)]
    pub license_id_str: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub error_number: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl LicenseAssociation {
    /// The per-target failure, if this target was rejected.
    pub fn error(&self) -> Option<DomainError> {
        self.error_number.map(|code| DomainError {
            code,
            message: self.error_message.clone().unwrap_or_default(),
        })
    }
}

/// Response of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageLicensesResult {
    #[serde(default)]
    pub adam_id_str: Option<String>,
    #[serde(default)]
    pub product_type_id: Option<i64>,
    #[serde(default)]
    pub product_type_name: Option<String>,
    #[serde(default)]
    pub pricing_param: Option<PricingParam>,
    #[serde(default)]
    pub is_irrevocable: bool,
    #[serde(default)]
    pub associations: Vec<LicenseAssociation>,
    #[serde(default)]
    pub disassociations: Vec<LicenseAssociation>,
}

impl ManageLicensesResult {
    /// Targets the service rejected, from both sets.
    pub fn failures(&self) -> impl Iterator<Item = &LicenseAssociation> {
        self.associations
            .iter()
            .chain(&self.disassociations)
            .filter(|a| a.error_number.is_some())
    }
}

// -- Bulk operation builder ----------------------------------------------------

/// A batch of assignments and releases for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseOperations {
    adam_id_str: String,
    pricing_param: PricingParam,
    #[serde(rename = "associateClientIdStrs", skip_serializing_if = "Vec::is_empty")]
    associate_users: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    associate_serial_numbers: Vec<String>,
    #[serde(rename = "disassociateClientIdStrs", skip_serializing_if = "Vec::is_empty")]
    disassociate_users: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disassociate_serial_numbers: Vec<String>,
    #[serde(rename = "disassociateLicenseIdStrs", skip_serializing_if = "Vec::is_empty")]
    disassociate_license_ids: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    notify_disassociation: bool,
}

const MIXED_ASSOCIATION: &str =
    "cannot assign licenses to both users and devices in the same operation";
const MIXED_DISASSOCIATION: &str =
    "can only unassign licenses from one of users, serial numbers or license ids in a single operation";

impl LicenseOperations {
    /// Start a batch for the product `adam_id`.
    pub fn new(adam_id: impl Into<String>, pricing_param: PricingParam) -> Result<Self, VppError> {
        let adam_id_str = adam_id.into();
        if adam_id_str.trim().is_empty() {
            return Err(VppError::InvalidRequest("adam id must not be empty".into()));
        }
        if pricing_param == PricingParam::Unknown {
            return Err(VppError::InvalidRequest("pricing param must be STDQ or PLUS".into()));
        }
        Ok(Self {
            adam_id_str,
            pricing_param,
            associate_users: Vec::new(),
            associate_serial_numbers: Vec::new(),
            disassociate_users: Vec::new(),
            disassociate_serial_numbers: Vec::new(),
            disassociate_license_ids: Vec::new(),
            notify_disassociation: false,
        })
    }

    pub fn adam_id(&self) -> &str {
        &self.adam_id_str
    }

    /// Assign a license to a user.
    pub fn assign_user(&mut self, user: &VppUser) -> Result<&mut Self, VppError> {
        if !self.associate_serial_numbers.is_empty() {
            return Err(VppError::InvalidRequest(MIXED_ASSOCIATION.into()));
        }
        self.associate_users.push(client_id(user)?);
        Ok(self)
    }

    /// Assign a license to a device.
    pub fn assign_serial_number(&mut self, serial: impl Into<String>) -> Result<&mut Self, VppError> {
        if !self.associate_users.is_empty() {
            return Err(VppError::InvalidRequest(MIXED_ASSOCIATION.into()));
        }
        self.associate_serial_numbers.push(non_empty("serial number", serial.into())?);
        Ok(self)
    }

    /// Release the license held by a user.
    pub fn unassign_user(&mut self, user: &VppUser) -> Result<&mut Self, VppError> {
        if !self.disassociate_serial_numbers.is_empty() || !self.disassociate_license_ids.is_empty() {
            return Err(VppError::InvalidRequest(MIXED_DISASSOCIATION.into()));
        }
        self.disassociate_users.push(client_id(user)?);
        Ok(self)
    }

    /// Release the license held by a device.
    pub fn unassign_serial_number(&mut self, serial: impl Into<String>) -> Result<&mut Self, VppError> {
        if !self.disassociate_users.is_empty() || !self.disassociate_license_ids.is_empty() {
            return Err(VppError::InvalidRequest(MIXED_DISASSOCIATION.into()));
        }
        self.disassociate_serial_numbers.push(non_empty("serial number", serial.into())?);
        Ok(self)
    }

    /// Release a license by id.
    pub fn unassign_license_id(&mut self, license_id: impl Into<String>) -> Result<&mut Self, VppError> {
        if !self.disassociate_users.is_empty() || !self.disassociate_serial_numbers.is_empty() {
            return Err(VppError::InvalidRequest(MIXED_DISASSOCIATION.into()));
        }
        self.disassociate_license_ids.push(non_empty("license id", license_id.into())?);
        Ok(self)
    }

    /// Notify users whose licenses are released.
    pub fn notify_disassociation(&mut self, notify: bool) -> &mut Self {
        self.notify_disassociation = notify;
        self
    }

    pub fn associate_count(&self) -> usize {
        self.associate_users.len() + self.associate_serial_numbers.len()
    }

    pub fn disassociate_count(&self) -> usize {
        self.disassociate_users.len()
            + self.disassociate_serial_numbers.len()
            + self.disassociate_license_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associate_count() == 0 && self.disassociate_count() == 0
    }

    /// Check the batch against the service's published limits.
    pub fn validate(&self, limits: &ServiceLimits) -> Result<(), VppError> {
        if self.is_empty() {
            return Err(VppError::InvalidRequest("license operation has no targets".into()));
        }
        check_limit("associate", self.associate_count(), limits.max_batch_associate_license_count)?;
        check_limit(
            "disassociate",
            self.disassociate_count(),
            limits.max_batch_disassociate_license_count,
        )
    }
}

fn client_id(user: &VppUser) -> Result<String, VppError> {
    user.client_user_id_str
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| VppError::InvalidRequest("bulk license operations require clientUserIdStr".into()))
}

fn non_empty(what: &str, value: String) -> Result<String, VppError> {
    if value.trim().is_empty() {
        return Err(VppError::InvalidRequest(format!("{what} must not be empty")));
    }
    Ok(value)
}

fn check_limit(what: &str, count: usize, limit: Option<usize>) -> Result<(), VppError> {
    match limit {
        Some(max) if count > max => Err(VppError::InvalidRequest(format!(
            "{count} {what} targets exceed the service limit of {max}"
        ))),
        _ => Ok(()),
    }
}

// -- Client -------------------------------------------------------------------

/// License management verbs.
#[derive(Debug, Clone)]
pub struct LicensesClient {
    session: Arc<Session>,
}

impl LicensesClient {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Fetch one page of licenses and advance `cursor`.
    pub async fn list(
        &self,
        options: &GetLicensesOptions,
        cursor: &mut BatchCursor,
    ) -> Result<Page<VppLicense>, VppError> {
        let response: GetLicensesResponse = self
            .session
            .dispatch_paged(Operation::GetLicenses.key(), options, cursor)
            .await?;
        Ok(Page {
            items: response.licenses,
            total_count: response.tokens.total_count,
        })
    }

    /// Page through licenses until the cursor is caught up.
    ///
    /// Fails with [`VppError::PagingCycle`] if the service repeats a batch token.
    pub async fn list_all(
        &self,
        options: &GetLicensesOptions,
        cursor: &mut BatchCursor,
    ) -> Result<Vec<VppLicense>, VppError> {
        let mut licenses = Vec::new();
        let mut trail = TokenTrail::default();
        trail.follow(Operation::GetLicenses.key(), cursor)?;
        loop {
            let page = self.list(options, cursor).await?;
            licenses.extend(page.items);
            if !cursor.has_next() {
                return Ok(licenses);
            }
            trail.follow(Operation::GetLicenses.key(), cursor)?;
        }
    }

    /// Assign `license` to `user` through the single-license endpoint.
    pub async fn associate(
        &self,
        user: &VppUser,
        license: &VppLicense,
    ) -> Result<AssignmentResult, VppError> {
        let key = user.key()?;
        let license_id = license.license_id_str.as_deref().filter(|s| !s.is_empty());
        let adam_id = match license_id {
            Some(_) => None,
            None => Some(
                license
                    .adam_id_str
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| VppError::InvalidRequest("license has neither licenseIdStr nor adamIdStr".into()))?,
            ),
        };
        let request = AssociateRequest {
            user: &key,
            license_id,
            adam_id,
            pricing_param: adam_id.and(license.pricing_param),
        };
        self.session
            .dispatch(Operation::AssociateLicense.key(), &request)
            .await
    }

    /// Release `license` from `user` through the single-license endpoint.
    pub async fn disassociate(
        &self,
        user: &VppUser,
        license: &VppLicense,
    ) -> Result<AssignmentResult, VppError> {
        let key = user.key()?;
        let license_id = license
            .license_id_str
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VppError::InvalidRequest("disassociation requires licenseIdStr".into()))?;
        let request = DisassociateRequest {
            user: &key,
            license_id,
        };
        self.session
            .dispatch(Operation::DisassociateLicense.key(), &request)
            .await
    }

    /// Apply a bulk batch for one product.
    ///
    /// Per-target failures are reported in the result, not as an error.
    pub async fn manage(&self, operations: &LicenseOperations) -> Result<ManageLicensesResult, VppError> {
        let limits = self
            .session
            .service_config()
            .map(|cfg| cfg.limits())
            .unwrap_or_default();
        operations.validate(&limits)?;

        let result: ManageLicensesResult = self
            .session
            .dispatch(Operation::ManageLicensesByAdamId.key(), operations)
            .await?;
        let failed = result.failures().count();
        if failed > 0 {
            tracing::warn!(adam_id = operations.adam_id(), failed, "some license targets were rejected");
        }
        Ok(result)
    }
}
