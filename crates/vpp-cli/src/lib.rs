//! # vpp-cli -- command-line access to the VPP licensing service
//!
//! Provides the `vpp` command-line interface on top of `vpp-client`.
//!
//! ## Subcommands
//!
//! - `vpp config` -- bootstrap and print the published endpoint map.
//! - `vpp users` -- list, get, register, retire and edit users.
//! - `vpp licenses` -- list licenses and run bulk assign/unassign batches.
//! - `vpp assets` -- list licensed products with their counts.
//! - `vpp context` -- show or claim the account for a management host.
//! - `vpp stoken` -- decode a downloaded sToken file offline.
//!
//! ```bash
//! vpp --stoken-file org.vpptoken users list --include-retired
//! vpp --base-url http://127.0.0.1:9001/ --stoken-file sim.token assets list --counts
//! ```

pub mod assets;
pub mod config;
pub mod context;
pub mod licenses;
pub mod stoken;
pub mod users;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use vpp_client::config::{read_token_file, DEFAULT_BASE_URL};
use vpp_client::users::VppUser;
use vpp_client::{VppClient, VppConfig};

/// Connection flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Service base URL. Falls back to `VPP_BASE_URL`, then the production service.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to the downloaded sToken file. Falls back to `VPP_STOKEN` / `VPP_STOKEN_FILE`.
    #[arg(long, global = true)]
    pub stoken_file: Option<PathBuf>,
}

/// Resolve the client configuration from flags, then the environment.
pub fn load_config(args: &GlobalArgs) -> Result<VppConfig> {
    let config = match &args.stoken_file {
        Some(path) => {
            let token = read_token_file(&path.to_string_lossy())?;
            let base_url = std::env::var("VPP_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
            VppConfig::new(&base_url, token)?.with_env_timings()
        }
        None => VppConfig::from_env().context("no sToken: pass --stoken-file or set VPP_STOKEN")?,
    };

    match &args.base_url {
        Some(base_url) => {
            let mut rebased = VppConfig::new(base_url, config.s_token.as_str())?;
            rebased.timeout_secs = config.timeout_secs;
            rebased.default_retry_delay = config.default_retry_delay;
            rebased.max_retry_delay = config.max_retry_delay;
            Ok(rebased)
        }
        None => Ok(config),
    }
}

/// Bootstrap a client for the resolved configuration.
pub async fn connect(args: &GlobalArgs) -> Result<VppClient> {
    let config = load_config(args)?;
    tracing::debug!(base_url = %config.base_url, "connecting");
    VppClient::connect(config)
        .await
        .context("failed to bootstrap the service configuration")
}

/// Print a JSON document to stdout.
pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A user addressed only by its `clientUserIdStr`.
pub fn user_by_client_id(client_user_id: &str) -> VppUser {
    VppUser {
        client_user_id_str: Some(client_user_id.to_string()),
        ..VppUser::default()
    }
}

/// The token file given explicitly, else the global one.
pub fn token_path<'a>(explicit: Option<&'a Path>, globals: &'a GlobalArgs) -> Option<&'a Path> {
    explicit.or(globals.stoken_file.as_deref())
}
