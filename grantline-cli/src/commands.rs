//! Command tree and dispatch onto the operations layer

use anyhow::Result;
use clap::{ArgAction, Subcommand};
use grantline_core::ops::{CommandResult, Operations, Sender};
use grantline_core::store::LoadOutcome;
use grantline_core::Engine;
use uuid::Uuid;

#[derive(Subcommand, Debug)]
#[command(rename_all = "lower")]
pub enum Command {
    /// Create a user, or refresh the stored name of an existing one
    AddUser {
        name: String,
        /// Use this UUID instead of generating one
        #[arg(long)]
        uuid: Option<Uuid>,
    },
    /// Act on a user, by name or UUID
    User {
        user: String,
        #[command(subcommand)]
        action: UserAction,
    },
    /// Act on a group
    Group {
        group: String,
        #[command(subcommand)]
        action: GroupAction,
    },
    CreateGroup { name: String },
    DeleteGroup { name: String },
    CreateTrack { name: String },
    DeleteTrack { name: String },
    /// Edit a track's ladder
    Track {
        track: String,
        #[command(subcommand)]
        action: TrackAction,
    },
    /// List known names starting with a prefix
    Complete {
        #[command(subcommand)]
        target: CompleteTarget,
    },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "lower")]
pub enum UserAction {
    AddGroup { group: String, server: Option<String> },
    RemoveGroup { group: String, server: Option<String> },
    Set {
        permission: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
        server: Option<String>,
    },
    Unset { permission: String, server: Option<String> },
    SetPrimaryGroup { group: String },
    Promote { track: String, server: Option<String> },
    Demote { track: String, server: Option<String> },
    Check { permission: String, server: Option<String> },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "lower")]
pub enum GroupAction {
    Set {
        permission: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
        server: Option<String>,
    },
    Unset { permission: String, server: Option<String> },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "lower")]
pub enum TrackAction {
    Append { group: String },
    /// Insert at a 1-based position
    Insert { group: String, position: usize },
    Remove { group: String },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "lower")]
pub enum CompleteTarget {
    Groups {
        #[arg(default_value = "")]
        prefix: String,
    },
    Tracks {
        #[arg(default_value = "")]
        prefix: String,
    },
}

/// Run one command as the console
pub async fn dispatch(engine: &Engine, ops: &Operations, command: Command) -> Result<CommandResult> {
    let console = Sender::console();
    let result = match command {
        Command::AddUser { name, uuid } => {
            let uuid = uuid.unwrap_or_else(Uuid::new_v4);
            match engine.login(uuid, &name).await {
                LoadOutcome::Found(_) => {
                    println!("User {} is stored as {}.", name, uuid);
                    CommandResult::Success
                }
                LoadOutcome::NotFound => anyhow::bail!("user {} could not be created", name),
                LoadOutcome::Failed(err) => return Err(err.into()),
            }
        }
        Command::User { user, action } => run_user(ops, &console, &user, action).await,
        Command::Group { group, action } => match action {
            GroupAction::Set {
                permission,
                value,
                server,
            } => {
                ops.group_set_permission(&console, &group, &permission, value, server.as_deref())
                    .await
            }
            GroupAction::Unset { permission, server } => {
                ops.group_unset_permission(&console, &group, &permission, server.as_deref())
                    .await
            }
        },
        Command::CreateGroup { name } => ops.create_group(&console, &name).await,
        Command::DeleteGroup { name } => ops.delete_group(&console, &name).await,
        Command::CreateTrack { name } => ops.create_track(&console, &name).await,
        Command::DeleteTrack { name } => ops.delete_track(&console, &name).await,
        Command::Track { track, action } => match action {
            TrackAction::Append { group } => ops.track_append(&console, &track, &group).await,
            TrackAction::Insert { group, position } => {
                ops.track_insert(&console, &track, &group, position).await
            }
            TrackAction::Remove { group } => ops.track_remove(&console, &track, &group).await,
        },
        Command::Complete { target } => {
            let names = match target {
                CompleteTarget::Groups { prefix } => ops.tab_complete_groups(&prefix).await,
                CompleteTarget::Tracks { prefix } => ops.tab_complete_tracks(&prefix).await,
            };
            for name in names {
                println!("{}", name);
            }
            CommandResult::Success
        }
    };
    Ok(result)
}

async fn run_user(
    ops: &Operations,
    console: &Sender,
    user: &str,
    action: UserAction,
) -> CommandResult {
    match action {
        UserAction::AddGroup { group, server } => {
            ops.user_add_group(console, user, &group, server.as_deref()).await
        }
        UserAction::RemoveGroup { group, server } => {
            ops.user_remove_group(console, user, &group, server.as_deref())
                .await
        }
        UserAction::Set {
            permission,
            value,
            server,
        } => {
            ops.user_set_permission(console, user, &permission, value, server.as_deref())
                .await
        }
        UserAction::Unset { permission, server } => {
            ops.user_unset_permission(console, user, &permission, server.as_deref())
                .await
        }
        UserAction::SetPrimaryGroup { group } => {
            ops.user_set_primary_group(console, user, &group).await
        }
        UserAction::Promote { track, server } => {
            ops.promote(console, user, &track, server.as_deref()).await
        }
        UserAction::Demote { track, server } => {
            ops.demote(console, user, &track, server.as_deref()).await
        }
        UserAction::Check { permission, server } => {
            ops.check_permission(console, user, &permission, server.as_deref())
                .await
        }
    }
}
