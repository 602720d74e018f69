//! # Licenses Subcommand
//!
//! Lists licenses and applies bulk assign/unassign batches for one product.
//! A batch with rejected targets still exits `2` so scripts notice partial
//! failures.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use vpp_client::licenses::{GetLicensesOptions, LicenseAssociation, LicenseOperations, PricingParam};
use vpp_client::BatchCursor;

use crate::GlobalArgs;

/// Arguments for the `vpp licenses` subcommand.
#[derive(Args, Debug)]
pub struct LicensesArgs {
    #[command(subcommand)]
    pub command: LicensesCommand,
}

/// Licenses subcommands.
#[derive(Subcommand, Debug)]
pub enum LicensesCommand {
    /// List licenses, optionally filtered.
    List {
        #[arg(long)]
        adam_id: Option<String>,
        /// Only licenses assigned to a user or device.
        #[arg(long)]
        assigned_only: bool,
        /// STDQ or PLUS.
        #[arg(long)]
        pricing: Option<PricingParam>,
    },

    /// Assign and release licenses of one product in a single batch.
    Manage {
        #[arg(long)]
        adam_id: String,
        /// STDQ or PLUS.
        #[arg(long, default_value = "STDQ")]
        pricing: PricingParam,
        /// Assign to the user with this clientUserIdStr. Repeatable.
        #[arg(long = "assign-user", value_name = "CLIENT_USER_ID")]
        assign_users: Vec<String>,
        /// Assign to the device with this serial number. Repeatable.
        #[arg(long = "assign-serial", value_name = "SERIAL")]
        assign_serials: Vec<String>,
        /// Release the license held by this user. Repeatable.
        #[arg(long = "unassign-user", value_name = "CLIENT_USER_ID")]
        unassign_users: Vec<String>,
        /// Release the license held by this device. Repeatable.
        #[arg(long = "unassign-serial", value_name = "SERIAL")]
        unassign_serials: Vec<String>,
        /// Release a license by id. Repeatable.
        #[arg(long = "unassign-license", value_name = "LICENSE_ID")]
        unassign_licenses: Vec<String>,
        /// Ask the service to notify released users.
        #[arg(long)]
        notify: bool,
    },
}

/// Execute the licenses subcommand.
pub async fn run_licenses(args: &LicensesArgs, globals: &GlobalArgs) -> Result<u8> {
    match &args.command {
        LicensesCommand::List {
            adam_id,
            assigned_only,
            pricing,
        } => {
            let mut options = GetLicensesOptions::new().assigned_only(*assigned_only);
            if let Some(adam_id) = adam_id {
                options = options.adam_id(adam_id.as_str())?;
            }
            if let Some(pricing) = pricing {
                options = options.pricing_param(*pricing);
            }

            let client = crate::connect(globals).await?;
            let mut cursor = BatchCursor::new();
            let found = client.licenses().list_all(&options, &mut cursor).await?;
            crate::print_json(&json!({
                "licenses": found,
                "sinceModifiedToken": cursor.since_modified_token(),
            }))?;
            Ok(0)
        }
        LicensesCommand::Manage {
            adam_id,
            pricing,
            assign_users,
            assign_serials,
            unassign_users,
            unassign_serials,
            unassign_licenses,
            notify,
        } => {
            let mut ops = LicenseOperations::new(adam_id.as_str(), *pricing)?;
            for id in assign_users {
                ops.assign_user(&crate::user_by_client_id(id))?;
            }
            for serial in assign_serials {
                ops.assign_serial_number(serial.as_str())?;
            }
            for id in unassign_users {
                ops.unassign_user(&crate::user_by_client_id(id))?;
            }
            for serial in unassign_serials {
                ops.unassign_serial_number(serial.as_str())?;
            }
            for license in unassign_licenses {
                ops.unassign_license_id(license.as_str())?;
            }
            ops.notify_disassociation(*notify);
            if ops.is_empty() {
                bail!("nothing to do: pass at least one --assign-* or --unassign-* target");
            }

            let client = crate::connect(globals).await?;
            let result = client.licenses().manage(&ops).await?;
            crate::print_json(&json!({
                "adamIdStr": result.adam_id_str,
                "associations": result.associations.iter().map(describe).collect::<Vec<_>>(),
                "disassociations": result.disassociations.iter().map(describe).collect::<Vec<_>>(),
            }))?;

            let failed = result.failures().count();
            if failed > 0 {
                tracing::warn!(failed, "some targets were rejected");
                return Ok(2);
            }
            Ok(0)
        }
    }
}

fn describe(target: &LicenseAssociation) -> serde_json::Value {
    json!({
        "clientUserIdStr": target.client_user_id_str,
        "serialNumber": target.serial_number,
        "licenseIdStr": target.license_id_str,
        "error": target.error().map(|e| json!({ "errorNumber": e.code, "errorMessage": e.message })),
    })
}
