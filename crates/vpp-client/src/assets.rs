//! Purchased assets (apps and books) and their license counts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::VppError;
use crate::licenses::PricingParam;
use crate::service_config::Operation;
use crate::session::Session;

/// A product the organisation holds licenses for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VppAsset {
    pub adam_id_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_param: Option<PricingParam>,
    #[serde(default)]
    pub product_type_id: i64,
    #[serde(default)]
    pub product_type_name: String,
    #[serde(default)]
    pub device_assignable: bool,
    #[serde(default)]
    pub is_irrevocable: bool,
    /// Counts are only present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_count: Option<u64>,
}

/// Filters for listing assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAssetsOptions {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    include_license_counts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pricing_param: Option<PricingParam>,
}

impl GetAssetsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the service to fill in the per-asset license counts.
    pub fn include_license_counts(mut self, include: bool) -> Self {
        self.include_license_counts = include;
        self
    }

    pub fn pricing_param(mut self, pricing_param: PricingParam) -> Self {
        self.pricing_param = Some(pricing_param);
        self
    }
}

#[derive(Debug, Deserialize)]
struct GetAssetsResponse {
    #[serde(default)]
    assets: Vec<VppAsset>,
}

/// Asset listing.
#[derive(Debug, Clone)]
pub struct AssetsClient {
    session: Arc<Session>,
}

impl AssetsClient {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// List every asset the organisation holds licenses for.
    pub async fn list(&self, options: &GetAssetsOptions) -> Result<Vec<VppAsset>, VppError> {
        let response: GetAssetsResponse = self
            .session
            .dispatch(Operation::GetAssets.key(), options)
            .await?;
        tracing::debug!(count = response.assets.len(), "listed VPP assets");
        Ok(response.assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_serialize_only_set_filters() {
        assert_eq!(serde_json::to_value(GetAssetsOptions::new()).unwrap(), json!({}));
        let opts = GetAssetsOptions::new()
            .include_license_counts(true)
            .pricing_param(PricingParam::Plus);
        assert_eq!(
            serde_json::to_value(opts).unwrap(),
            json!({"includeLicenseCounts": true, "pricingParam": "PLUS"})
        );
    }

    #[test]
    fn asset_without_counts_decodes() {
        let asset: VppAsset = serde_json::from_value(json!({
            "adamIdStr": "408709785",
            "pricingParam": "STDQ",
            "productTypeId": 8,
            "productTypeName": "Software",
            "deviceAssignable": true
        }))
        .unwrap();
        assert_eq!(asset.adam_id_str, "408709785");
        assert!(asset.device_assignable);
        assert_eq!(asset.available_count, None);
    }
}
