//! # Context Subcommand
//!
//! Shows which management host holds the account and claims it for this
//! one. A claim is identified by its guid; pass the guid printed by an
//! earlier `claim` to renew or check the same claim.
//!
//! Claiming an account held by another host is refused unless `--force`
//! is given.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use vpp_client::context::{ClientConfig, ClientContext};

use crate::GlobalArgs;

/// Arguments for the `vpp context` subcommand.
#[derive(Args, Debug)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub command: ContextCommand,
}

/// Context subcommands.
#[derive(Subcommand, Debug)]
pub enum ContextCommand {
    /// Print the account configuration and current claim.
    Show {
        /// Exit 2 when the account is claimed by a different guid.
        #[arg(long)]
        guid: Option<String>,
    },

    /// Claim the account for this host.
    Claim {
        #[arg(long)]
        hostname: String,
        /// Reuse an existing claim guid instead of generating one.
        #[arg(long)]
        guid: Option<String>,
        /// Overwrite a claim held by another host.
        #[arg(long)]
        force: bool,
    },
}

/// Execute the context subcommand.
pub async fn run_context(args: &ContextArgs, globals: &GlobalArgs) -> Result<u8> {
    let client = crate::connect(globals).await?;
    let context = client.context();

    match &args.command {
        ContextCommand::Show { guid } => {
            let current = context.get().await?;
            crate::print_json(&describe(&current))?;
            let conflict = guid.as_ref().is_some_and(|guid| {
                current.conflicts_with(&ClientContext {
                    hostname: String::new(),
                    guid: guid.clone(),
                })
            });
            Ok(if conflict { 2 } else { 0 })
        }
        ContextCommand::Claim { hostname, guid, force } => {
            let mine = match guid {
                Some(guid) => ClientContext {
                    hostname: hostname.clone(),
                    guid: guid.clone(),
                },
                None => ClientContext::new(hostname.as_str()),
            };

            let current = context.get().await?;
            if current.conflicts_with(&mine) {
                let holder = current
                    .client_context
                    .as_ref()
                    .map(|c| c.hostname.as_str())
                    .unwrap_or_default();
                if !*force {
                    tracing::error!(holder, "account is claimed by another host; pass --force to take it over");
                    return Ok(2);
                }
                tracing::warn!(holder, "taking over the account claim");
            }

            let updated = context.update(&mine).await?;
            crate::print_json(&describe(&updated))?;
            Ok(0)
        }
    }
}

fn describe(config: &ClientConfig) -> serde_json::Value {
    json!({
        "clientContext": config.client_context,
        "countryCode": config.country_code,
        "email": config.email,
        "appleId": config.apple_id,
        "facilitatorMemberId": config.facilitator_member_id,
        "organizationIdHash": config.organization_id_hash,
        "locationName": config.location_name,
    })
}
