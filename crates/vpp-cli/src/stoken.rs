//! # SToken Subcommand
//!
//! Decodes a downloaded sToken file offline. The token secret itself is
//! never printed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use serde_json::json;

use vpp_client::config::read_token_file;
use vpp_client::SToken;

use crate::GlobalArgs;

/// Arguments for the `vpp stoken` subcommand.
#[derive(Args, Debug)]
pub struct STokenArgs {
    #[command(subcommand)]
    pub command: STokenCommand,
}

/// SToken subcommands.
#[derive(Subcommand, Debug)]
pub enum STokenCommand {
    /// Print the organisation and expiry of a token file.
    Decode {
        /// Token file. Defaults to `--stoken-file`.
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

/// Execute the stoken subcommand. Exits `2` when the token has expired.
pub fn run_stoken(args: &STokenArgs, globals: &GlobalArgs) -> Result<u8> {
    let STokenCommand::Decode { file } = &args.command;
    let path = crate::token_path(file.as_deref(), globals)
        .context("no token file: pass FILE or --stoken-file")?;

    let text = read_token_file(&path.to_string_lossy())?;
    let token = SToken::decode(&text).with_context(|| format!("decoding {}", path.display()))?;
    let expires_at = token.expires_at()?;
    let expired = token.is_expired_at(Utc::now())?;

    crate::print_json(&json!({
        "orgName": token.org_name,
        "expDate": token.exp_date,
        "expiresAt": expires_at.to_rfc3339(),
        "expired": expired,
    }))?;

    if expired {
        tracing::warn!(org = %token.org_name, "sToken has expired");
        Ok(2)
    } else {
        Ok(0)
    }
}
