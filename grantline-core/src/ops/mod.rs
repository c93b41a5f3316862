/*
    ops - Command verbs over the engine

    Every verb checks the authorizer, finds its entities (cache first, then
    the store gateway), mutates them under the entity's write lock, saves
    while still holding the lock, and on success invalidates resolved views
    and propagates the change. Every outcome, good or bad, goes through the
    message sink.
*/

mod complete;
mod group;
mod message;
mod sender;
mod track;
mod user;

pub use complete::complete;
pub use message::{CollectingSink, Message, MessageSink, TracingSink};
pub use sender::{AllowAll, Authorizer, ConsoleOnly, Permission, Sender};

use crate::engine::EngineState;
use crate::manager::Shared;
use crate::model::{Group, PermissionHolder, Track, User};
use crate::propagation::UpdateScope;
use crate::store::{LoadOutcome, WriteOutcome};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Coarse result of an operation; details travel through the message sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    /// The request conflicts with current state (already member, not on track, ...)
    StateError,
    InvalidArgs,
    NoPermission,
    LoadError,
    SaveError,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success)
    }
}

#[derive(Clone)]
pub struct Operations {
    state: Arc<EngineState>,
    authorizer: Arc<dyn Authorizer>,
    sink: Arc<dyn MessageSink>,
}

impl Operations {
    pub fn new(
        state: Arc<EngineState>,
        authorizer: Arc<dyn Authorizer>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            state,
            authorizer,
            sink,
        }
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    fn report(&self, sender: &Sender, message: Message) {
        self.sink.send(sender, message);
    }

    fn authorize(&self, sender: &Sender, permission: Permission) -> bool {
        if self.authorizer.is_authorized(sender, permission) {
            true
        } else {
            debug!(sender = %sender, permission = permission.node(), "Operation refused");
            self.report(sender, Message::NoPermission);
            false
        }
    }

    /// Find a user by UUID or name
    async fn find_user(&self, sender: &Sender, input: &str) -> Result<Shared<User>, CommandResult> {
        let uuid = match Uuid::parse_str(input) {
            Ok(uuid) => uuid,
            Err(_) => self.lookup_user_name(sender, input).await?,
        };

        if let Some(handle) = self.state.users.get(&uuid).await {
            return Ok(handle);
        }
        match self.state.datastore.load_user(uuid).await {
            LoadOutcome::Found(user) => Ok(self.state.users.get_or_insert(user).await),
            LoadOutcome::NotFound => {
                self.report(sender, Message::UserNotFound { user: input.to_string() });
                Err(CommandResult::LoadError)
            }
            LoadOutcome::Failed(_) => {
                self.report(sender, Message::UserLoadError { user: input.to_string() });
                Err(CommandResult::LoadError)
            }
        }
    }

    async fn lookup_user_name(&self, sender: &Sender, name: &str) -> Result<Uuid, CommandResult> {
        for handle in self.state.users.handles().await {
            let user = handle.read().await;
            if user.name().eq_ignore_ascii_case(name) {
                return Ok(user.uuid());
            }
        }
        match self.state.datastore.lookup_user(name).await {
            LoadOutcome::Found(uuid) => Ok(uuid),
            LoadOutcome::NotFound => {
                self.report(sender, Message::UserNotFound { user: name.to_string() });
                Err(CommandResult::LoadError)
            }
            LoadOutcome::Failed(_) => {
                self.report(sender, Message::UserLoadError { user: name.to_string() });
                Err(CommandResult::LoadError)
            }
        }
    }

    async fn find_group(&self, sender: &Sender, name: &str) -> Result<Shared<Group>, CommandResult> {
        let name = name.to_lowercase();
        if let Some(handle) = self.state.groups.get(&name).await {
            return Ok(handle);
        }
        match self.state.datastore.load_group(&name).await {
            LoadOutcome::Found(group) => Ok(self.state.groups.get_or_insert(group).await),
            LoadOutcome::NotFound => {
                self.report(sender, Message::GroupDoesNotExist { group: name });
                Err(CommandResult::InvalidArgs)
            }
            LoadOutcome::Failed(_) => {
                self.report(sender, Message::GroupLoadError { group: name });
                Err(CommandResult::LoadError)
            }
        }
    }

    async fn find_track(&self, sender: &Sender, name: &str) -> Result<Shared<Track>, CommandResult> {
        let name = name.to_lowercase();
        if let Some(handle) = self.state.tracks.get(&name).await {
            return Ok(handle);
        }
        match self.state.datastore.load_track(&name).await {
            LoadOutcome::Found(track) => Ok(self.state.tracks.get_or_insert(track).await),
            LoadOutcome::NotFound => {
                self.report(sender, Message::TrackDoesNotExist { track: name });
                Err(CommandResult::InvalidArgs)
            }
            LoadOutcome::Failed(_) => {
                self.report(sender, Message::TrackLoadError { track: name });
                Err(CommandResult::LoadError)
            }
        }
    }

    /// Save a mutated user; call with the user's write lock held
    ///
    /// `before` is the user as it was when the lock was taken. A failed save
    /// puts it back, so the cache never shows a change the store lacks.
    async fn persist_user(&self, sender: &Sender, user: &mut User, before: User) -> bool {
        let revision = user.revision();
        match self.state.datastore.save_user(user).await {
            WriteOutcome::Failed(_) => {
                self.report(sender, Message::UserSaveError { user: user.name().to_string() });
                *user = before;
                false
            }
            _ => {
                user.mark_saved(revision);
                self.state.resolved.invalidate_user(user.uuid());
                self.state.propagate(UpdateScope::User(user.uuid()));
                true
            }
        }
    }

    /// Save a mutated group; call with the group's write lock held. A failed
    /// save restores `before`.
    async fn persist_group(&self, sender: &Sender, group: &mut Group, before: Group) -> bool {
        let revision = group.revision();
        match self.state.datastore.save_group(group).await {
            WriteOutcome::Failed(_) => {
                self.report(sender, Message::SaveError { name: group.name().to_string() });
                *group = before;
                false
            }
            _ => {
                group.mark_saved(revision);
                self.state.resolved.invalidate_all();
                self.state.propagate(UpdateScope::Group(group.name().to_string()));
                true
            }
        }
    }

    /// Save a mutated track; call with the track's write lock held. A failed
    /// save restores `before`.
    async fn persist_track(&self, sender: &Sender, track: &mut Track, before: Track) -> bool {
        let revision = track.revision();
        match self.state.datastore.save_track(track).await {
            WriteOutcome::Failed(_) => {
                self.report(sender, Message::SaveError { name: track.name().to_string() });
                *track = before;
                false
            }
            _ => {
                track.mark_saved(revision);
                self.state.propagate(UpdateScope::Track(track.name().to_string()));
                true
            }
        }
    }

    /// Known group names starting with `prefix`
    pub async fn tab_complete_groups(&self, prefix: &str) -> Vec<String> {
        complete(prefix, self.state.groups.ids().await)
    }

    /// Known track names starting with `prefix`
    pub async fn tab_complete_tracks(&self, prefix: &str) -> Vec<String> {
        complete(prefix, self.state.tracks.ids().await)
    }

    /// Permissions seen by checks so far, starting with `prefix`
    pub fn tab_complete_permissions(&self, prefix: &str) -> Vec<String> {
        complete(prefix, self.state.registry.known())
    }
}

/// Reject empty permissions and ones containing whitespace
fn valid_permission(permission: &str) -> bool {
    !permission.is_empty() && !permission.chars().any(char::is_whitespace)
}
