//! # Config Subcommand
//!
//! Bootstraps a session and prints what the service published: the
//! operation → URL map, batch limits and, optionally, the error catalogue.

use anyhow::Result;
use clap::Args;
use serde_json::{json, Map, Value};

use crate::GlobalArgs;

/// Arguments for the `vpp config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also print the published error codes.
    #[arg(long)]
    pub errors: bool,
}

/// Execute the config subcommand.
pub async fn run_config(args: &ConfigArgs, globals: &GlobalArgs) -> Result<u8> {
    let client = crate::connect(globals).await?;
    let Some(service) = client.service_config() else {
        anyhow::bail!("session has no service configuration");
    };

    let endpoints: Map<String, Value> = service
        .endpoints()
        .map(|(name, url)| (name.to_string(), Value::String(url.to_string())))
        .collect();
    let limits = service.limits();
    let mut out = json!({
        "endpoints": endpoints,
        "maxBatchAssociateLicenseCount": limits.max_batch_associate_license_count,
        "maxBatchDisassociateLicenseCount": limits.max_batch_disassociate_license_count,
    });
    if args.errors {
        out["errorCodes"] = service
            .error_codes()
            .iter()
            .map(|e| json!({ "errorNumber": e.error_number, "errorMessage": e.error_message }))
            .collect();
    }
    crate::print_json(&out)?;

    let missing = service.missing_operations();
    if missing.is_empty() {
        Ok(0)
    } else {
        for op in &missing {
            tracing::warn!(operation = op.key(), "operation not published by the service");
        }
        Ok(2)
    }
}
