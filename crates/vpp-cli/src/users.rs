//! # Users Subcommand
//!
//! List, look up, register, retire and edit VPP users. Users are addressed
//! by their `clientUserIdStr`.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use vpp_client::users::{GetUsersOptions, VppUser};
use vpp_client::BatchCursor;

use crate::GlobalArgs;

/// Arguments for the `vpp users` subcommand.
#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

/// Users subcommands.
#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// List every user, or only those changed since a previous listing.
    List {
        /// Include retired users.
        #[arg(long)]
        include_retired: bool,
        /// `sinceModifiedToken` from an earlier listing.
        #[arg(long)]
        since: Option<String>,
    },

    /// Fetch one user.
    Get {
        #[arg(value_name = "CLIENT_USER_ID")]
        client_user_id: String,
    },

    /// Register a new user. A UUID id is generated when none is given.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        client_user_id: Option<String>,
    },

    /// Retire a user, releasing their licenses.
    Retire {
        #[arg(value_name = "CLIENT_USER_ID")]
        client_user_id: String,
    },

    /// Change a user's email address.
    Edit {
        #[arg(value_name = "CLIENT_USER_ID")]
        client_user_id: String,
        #[arg(long)]
        email: String,
    },
}

/// Execute the users subcommand.
pub async fn run_users(args: &UsersArgs, globals: &GlobalArgs) -> Result<u8> {
    let client = crate::connect(globals).await?;
    let users = client.users();

    match &args.command {
        UsersCommand::List { include_retired, since } => {
            let mut cursor = match since {
                Some(token) => BatchCursor::since_modified(token.clone())?,
                None => BatchCursor::new(),
            };
            let options = GetUsersOptions::new().include_retired(*include_retired);
            let found = users.list_all(&options, &mut cursor).await?;
            crate::print_json(&json!({
                "users": found,
                "sinceModifiedToken": cursor.since_modified_token(),
            }))?;
        }
        UsersCommand::Get { client_user_id } => {
            let user = users.get(client_user_id).await?;
            crate::print_json(&serde_json::to_value(&user)?)?;
        }
        UsersCommand::Register { email, client_user_id } => {
            let user = VppUser::new(email.as_str(), client_user_id.as_deref());
            let registered = users.register(&user).await?;
            crate::print_json(&serde_json::to_value(&registered)?)?;
        }
        UsersCommand::Retire { client_user_id } => {
            let Some(retired) = users.retire(&crate::user_by_client_id(client_user_id)).await? else {
                bail!("service did not return the retired user {client_user_id}");
            };
            crate::print_json(&serde_json::to_value(&retired)?)?;
        }
        UsersCommand::Edit { client_user_id, email } => {
            let mut user = crate::user_by_client_id(client_user_id);
            user.email = Some(email.clone());
            match users.edit(&user).await? {
                Some(edited) => crate::print_json(&serde_json::to_value(&edited)?)?,
                None => tracing::info!(client_user_id = %client_user_id, "user updated"),
            }
        }
    }
    Ok(0)
}
