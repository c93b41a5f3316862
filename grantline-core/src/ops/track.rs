//! Track verbs

use super::{CommandResult, Message, Operations, Permission, Sender};
use crate::model::{validate_name, TrackError};
use crate::propagation::UpdateScope;
use crate::store::LoadOutcome;
use tracing::info;

impl Operations {
    pub async fn create_track(&self, sender: &Sender, name: &str) -> CommandResult {
        if !self.authorize(sender, Permission::CreateTrack) {
            return CommandResult::NoPermission;
        }
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(err) => {
                self.report(
                    sender,
                    Message::InvalidName {
                        name: name.to_string(),
                        reason: err.to_string(),
                    },
                );
                return CommandResult::InvalidArgs;
            }
        };

        if self.state.tracks.contains(&name).await {
            self.report(sender, Message::AlreadyExists { name });
            return CommandResult::StateError;
        }
        match self.state.datastore.load_track(&name).await {
            LoadOutcome::Found(track) => {
                self.state.tracks.get_or_insert(track).await;
                self.report(sender, Message::AlreadyExists { name });
                return CommandResult::StateError;
            }
            LoadOutcome::NotFound => {}
            LoadOutcome::Failed(_) => {
                self.report(sender, Message::CreateError { name });
                return CommandResult::LoadError;
            }
        }

        match self.state.datastore.create_and_load_track(&name).await {
            LoadOutcome::Found(track) => {
                self.state.tracks.get_or_insert(track).await;
                self.state.propagate(UpdateScope::Track(name.clone()));
                info!(sender = %sender, track = %name, "Track created");
                self.report(sender, Message::CreateSuccess { name });
                CommandResult::Success
            }
            _ => {
                self.report(sender, Message::CreateError { name });
                CommandResult::SaveError
            }
        }
    }

    /// Delete a track. Groups and users on it are left untouched.
    pub async fn delete_track(&self, sender: &Sender, name: &str) -> CommandResult {
        if !self.authorize(sender, Permission::DeleteTrack) {
            return CommandResult::NoPermission;
        }
        let name = name.to_lowercase();
        if let Err(result) = self.find_track(sender, &name).await {
            return result;
        }

        if !self.state.datastore.delete_track(&name).await.is_success() {
            self.report(sender, Message::DeleteTrackError { track: name });
            return CommandResult::SaveError;
        }
        self.state.tracks.remove(&name).await;
        self.state.propagate(UpdateScope::Track(name.clone()));
        info!(sender = %sender, track = %name, "Track deleted");
        self.report(sender, Message::DeleteSuccess { name });
        CommandResult::Success
    }

    pub async fn track_append(&self, sender: &Sender, track: &str, group: &str) -> CommandResult {
        if !self.authorize(sender, Permission::TrackAppend) {
            return CommandResult::NoPermission;
        }
        self.edit_track(sender, track, group, |track, group| {
            track.append_group(group)?;
            Ok(Message::TrackAppendSuccess {
                track: track.name().to_string(),
                group: group.to_string(),
            })
        })
        .await
    }

    /// Insert `group` at 1-based `position` (clamped to the track's length)
    pub async fn track_insert(
        &self,
        sender: &Sender,
        track: &str,
        group: &str,
        position: usize,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::TrackInsert) {
            return CommandResult::NoPermission;
        }
        self.edit_track(sender, track, group, |track, group| {
            track.insert_group(group, position.saturating_sub(1))?;
            Ok(Message::TrackInsertSuccess {
                track: track.name().to_string(),
                group: group.to_string(),
                position: track.index_of(group).map(|i| i + 1).unwrap_or(position),
            })
        })
        .await
    }

    pub async fn track_remove(&self, sender: &Sender, track: &str, group: &str) -> CommandResult {
        if !self.authorize(sender, Permission::TrackRemove) {
            return CommandResult::NoPermission;
        }
        let handle = match self.find_track(sender, track).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let group = group.to_lowercase();
        let mut track = handle.write().await;
        let before = track.clone();
        if track.remove_group(&group).is_err() {
            self.report(
                sender,
                Message::TrackDoesNotContain {
                    track: track.name().to_string(),
                    group,
                },
            );
            return CommandResult::StateError;
        }

        if !self.persist_track(sender, &mut track, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::TrackRemoveSuccess {
                track: track.name().to_string(),
                group,
            },
        );
        CommandResult::Success
    }

    /// Add an existing group to a track through `edit`. Errors are reported
    /// like any other track error.
    async fn edit_track<F>(&self, sender: &Sender, track: &str, group: &str, edit: F) -> CommandResult
    where
        F: FnOnce(&mut crate::model::Track, &str) -> Result<Message, TrackError>,
    {
        let group = match self.find_group(sender, group).await {
            Ok(handle) => handle.read().await.name().to_string(),
            Err(result) => return result,
        };
        let handle = match self.find_track(sender, track).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let mut track = handle.write().await;
        let before = track.clone();
        let message = match edit(&mut track, &group) {
            Ok(message) => message,
            Err(err) => {
                let name = track.name().to_string();
                return self.report_track_error(sender, &name, err);
            }
        };

        if !self.persist_track(sender, &mut track, before).await {
            return CommandResult::SaveError;
        }
        self.report(sender, message);
        CommandResult::Success
    }
}
