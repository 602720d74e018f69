//! # vpp CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Every handler returns the process exit code: `0` on success, `2` when
//! the operation ran but reported a problem (rejected targets, a foreign
//! claim, an expired token), `1` on error.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vpp_cli::assets::{run_assets, AssetsArgs};
use vpp_cli::config::{run_config, ConfigArgs};
use vpp_cli::context::{run_context, ContextArgs};
use vpp_cli::licenses::{run_licenses, LicensesArgs};
use vpp_cli::stoken::{run_stoken, STokenArgs};
use vpp_cli::users::{run_users, UsersArgs};
use vpp_cli::GlobalArgs;

/// Command-line client for the VPP licensing service.
///
/// Manages users, license assignments and the account claim of a
/// volume-purchasing organisation.
#[derive(Parser, Debug)]
#[command(name = "vpp", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the endpoints and limits the service publishes.
    Config(ConfigArgs),

    /// List, get, register, retire and edit users.
    Users(UsersArgs),

    /// List licenses and run bulk assign/unassign batches.
    Licenses(LicensesArgs),

    /// List licensed products.
    Assets(AssetsArgs),

    /// Show or claim the account for a management host.
    Context(ContextArgs),

    /// Inspect a downloaded sToken file.
    #[command(name = "stoken")]
    SToken(STokenArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("vpp CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Commands::Config(args) => run_config(args, &cli.globals).await,
        Commands::Users(args) => run_users(args, &cli.globals).await,
        Commands::Licenses(args) => run_licenses(args, &cli.globals).await,
        Commands::Assets(args) => run_assets(args, &cli.globals).await,
        Commands::Context(args) => run_context(args, &cli.globals).await,
        Commands::SToken(args) => run_stoken(args, &cli.globals),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use vpp_cli::licenses::LicensesCommand;
    use vpp_cli::users::UsersCommand;
    use vpp_client::licenses::PricingParam;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vpp",
            "users",
            "list",
            "--include-retired",
            "--base-url",
            "http://127.0.0.1:9001/",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.globals.base_url.as_deref(), Some("http://127.0.0.1:9001/"));
        let Commands::Users(args) = cli.command else {
            panic!("expected users");
        };
        assert!(matches!(
            args.command,
            UsersCommand::List {
                include_retired: true,
                since: None
            }
        ));
    }

    #[test]
    fn manage_collects_repeated_targets() {
        let cli = Cli::try_parse_from([
            "vpp",
            "licenses",
            "manage",
            "--adam-id",
            "408709785",
            "--pricing",
            "plus",
            "--assign-serial",
            "C02A",
            "--assign-serial",
            "C02B",
            "--unassign-user",
            "u-1",
        ])
        .unwrap();
        let Commands::Licenses(args) = cli.command else {
            panic!("expected licenses");
        };
        let LicensesCommand::Manage {
            pricing,
            assign_serials,
            unassign_users,
            ..
        } = args.command
        else {
            panic!("expected manage");
        };
        assert_eq!(pricing, PricingParam::Plus);
        assert_eq!(assign_serials, ["C02A", "C02B"]);
        assert_eq!(unassign_users, ["u-1"]);
    }

    #[test]
    fn unknown_pricing_is_rejected() {
        assert!(Cli::try_parse_from(["vpp", "licenses", "list", "--pricing", "GOLD"]).is_err());
    }

    #[test]
    fn claim_requires_hostname() {
        assert!(Cli::try_parse_from(["vpp", "context", "claim"]).is_err());
    }
}
