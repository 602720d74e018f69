//! # Assets Subcommand

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use vpp_client::assets::GetAssetsOptions;
use vpp_client::licenses::PricingParam;

use crate::GlobalArgs;

/// Arguments for the `vpp assets` subcommand.
#[derive(Args, Debug)]
pub struct AssetsArgs {
    #[command(subcommand)]
    pub command: AssetsCommand,
}

/// Assets subcommands.
#[derive(Subcommand, Debug)]
pub enum AssetsCommand {
    /// List products the organisation holds licenses for.
    List {
        /// Include total/assigned/available/retired counts.
        #[arg(long)]
        counts: bool,
        /// STDQ or PLUS.
        #[arg(long)]
        pricing: Option<PricingParam>,
    },
}

/// Execute the assets subcommand.
pub async fn run_assets(args: &AssetsArgs, globals: &GlobalArgs) -> Result<u8> {
    let AssetsCommand::List { counts, pricing } = &args.command;

    let mut options = GetAssetsOptions::new().include_license_counts(*counts);
    if let Some(pricing) = pricing {
        options = options.pricing_param(*pricing);
    }

    let client = crate::connect(globals).await?;
    let assets = client.assets().list(&options).await?;
    crate::print_json(&json!({ "assets": assets }))?;
    Ok(0)
}
