//! Named outcomes reported to the caller
//!
//! The core never renders text. Each outcome is a `Message` with a stable
//! kind and ordered interpolation arguments; the surrounding surface turns
//! those into whatever language it speaks.

use super::sender::Sender;
use crate::resolve::Tristate;
use std::sync::{Mutex, PoisonError};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    NoPermission,
    InvalidName { name: String, reason: String },
    InvalidPermission { permission: String },

    UserNotFound { user: String },
    UserLoadError { user: String },
    UserSaveError { user: String },
    UserAddGroupSuccess { user: String, group: String, server: Option<String> },
    UserAlreadyMemberOf { user: String, group: String },
    UserRemoveGroupSuccess { user: String, group: String },
    UserRemoveGroupServerSuccess { user: String, group: String, server: String },
    UserRemoveGroupErrorPrimary,
    UserNotMemberOf { user: String, group: String },
    PrimaryGroupSet { user: String, group: String },
    PrimaryGroupNotMember { user: String, group: String },

    GroupDoesNotExist { group: String },
    GroupLoadError { group: String },
    DeleteGroupErrorDefault { group: String },
    DeleteGroupError { group: String },

    SetSuccess { permission: String, value: bool, holder: String, server: Option<String> },
    UnsetSuccess { permission: String, holder: String, server: Option<String> },
    AlreadyHasPermission { holder: String, permission: String },
    DoesNotHavePermission { holder: String, permission: String },

    TrackDoesNotExist { track: String },
    TrackLoadError { track: String },
    TrackEmpty { track: String },
    TrackAlreadyContains { track: String, group: String },
    TrackDoesNotContain { track: String, group: String },
    TrackAppendSuccess { track: String, group: String },
    TrackInsertSuccess { track: String, group: String, position: usize },
    TrackRemoveSuccess { track: String, group: String },
    DeleteTrackError { track: String },

    PromoteSuccess { user: String, track: String, from: Option<String>, to: String },
    DemoteSuccess { user: String, track: String, from: String, to: Option<String> },
    AlreadyAtTopOfTrack { user: String, track: String },
    AlreadyAtBottomOfTrack { user: String, track: String },
    UserNotOnTrack { user: String, track: String },
    TrackAmbiguous { user: String, track: String, groups: Vec<String> },

    CreateSuccess { name: String },
    AlreadyExists { name: String },
    CreateError { name: String },
    DeleteSuccess { name: String },
    SaveError { name: String },

    CheckResult { user: String, permission: String, server: Option<String>, result: Tristate },
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| crate::model::GLOBAL_CONTEXT.to_string())
}

impl Message {
    /// Stable identifier of the outcome
    pub fn kind(&self) -> &'static str {
        match self {
            Message::NoPermission => "NO_PERMISSION",
            Message::InvalidName { .. } => "INVALID_NAME",
            Message::InvalidPermission { .. } => "INVALID_PERMISSION",
            Message::UserNotFound { .. } => "USER_NOT_FOUND",
            Message::UserLoadError { .. } => "USER_LOAD_ERROR",
            Message::UserSaveError { .. } => "USER_SAVE_ERROR",
            Message::UserAddGroupSuccess { .. } => "USER_ADDGROUP_SUCCESS",
            Message::UserAlreadyMemberOf { .. } => "USER_ALREADY_MEMBER_OF",
            Message::UserRemoveGroupSuccess { .. } => "USER_REMOVEGROUP_SUCCESS",
            Message::UserRemoveGroupServerSuccess { .. } => "USER_REMOVEGROUP_SERVER_SUCCESS",
            Message::UserRemoveGroupErrorPrimary => "USER_REMOVEGROUP_ERROR_PRIMARY",
            Message::UserNotMemberOf { .. } => "USER_NOT_MEMBER_OF",
            Message::PrimaryGroupSet { .. } => "PRIMARY_GROUP_SET",
            Message::PrimaryGroupNotMember { .. } => "PRIMARY_GROUP_NOT_MEMBER",
            Message::GroupDoesNotExist { .. } => "GROUP_DOES_NOT_EXIST",
            Message::GroupLoadError { .. } => "GROUP_LOAD_ERROR",
            Message::DeleteGroupErrorDefault { .. } => "DELETE_GROUP_ERROR_DEFAULT",
            Message::DeleteGroupError { .. } => "DELETE_GROUP_ERROR",
            Message::SetSuccess { .. } => "SET_SUCCESS",
            Message::UnsetSuccess { .. } => "UNSET_SUCCESS",
            Message::AlreadyHasPermission { .. } => "ALREADY_HAS_PERMISSION",
            Message::DoesNotHavePermission { .. } => "DOES_NOT_HAVE_PERMISSION",
            Message::TrackDoesNotExist { .. } => "TRACK_DOES_NOT_EXIST",
            Message::TrackLoadError { .. } => "TRACK_LOAD_ERROR",
            Message::TrackEmpty { .. } => "TRACK_EMPTY",
            Message::TrackAlreadyContains { .. } => "TRACK_ALREADY_CONTAINS",
            Message::TrackDoesNotContain { .. } => "TRACK_DOES_NOT_CONTAIN",
            Message::TrackAppendSuccess { .. } => "TRACK_APPEND_SUCCESS",
            Message::TrackInsertSuccess { .. } => "TRACK_INSERT_SUCCESS",
            Message::TrackRemoveSuccess { .. } => "TRACK_REMOVE_SUCCESS",
            Message::DeleteTrackError { .. } => "DELETE_TRACK_ERROR",
            Message::PromoteSuccess { .. } => "PROMOTE_SUCCESS",
            Message::DemoteSuccess { .. } => "DEMOTE_SUCCESS",
            Message::AlreadyAtTopOfTrack { .. } => "ALREADY_AT_TOP_OF_TRACK",
            Message::AlreadyAtBottomOfTrack { .. } => "ALREADY_AT_BOTTOM_OF_TRACK",
            Message::UserNotOnTrack { .. } => "USER_NOT_ON_TRACK",
            Message::TrackAmbiguous { .. } => "TRACK_AMBIGUOUS",
            Message::CreateSuccess { .. } => "CREATE_SUCCESS",
            Message::AlreadyExists { .. } => "ALREADY_EXISTS",
            Message::CreateError { .. } => "CREATE_ERROR",
            Message::DeleteSuccess { .. } => "DELETE_SUCCESS",
            Message::SaveError { .. } => "SAVE_ERROR",
            Message::CheckResult { .. } => "CHECK_RESULT",
        }
    }

    /// Interpolation values, in template order
    pub fn args(&self) -> Vec<String> {
        match self {
            Message::NoPermission | Message::UserRemoveGroupErrorPrimary => Vec::new(),
            Message::InvalidName { name, reason } => vec![name.clone(), reason.clone()],
            Message::InvalidPermission { permission } => vec![permission.clone()],
            Message::UserNotFound { user }
            | Message::UserLoadError { user }
            | Message::UserSaveError { user } => vec![user.clone()],
            Message::UserAddGroupSuccess { user, group, server } => {
                vec![user.clone(), group.clone(), opt(server)]
            }
            Message::UserAlreadyMemberOf { user, group }
            | Message::UserRemoveGroupSuccess { user, group }
            | Message::UserNotMemberOf { user, group }
            | Message::PrimaryGroupSet { user, group }
            | Message::PrimaryGroupNotMember { user, group } => vec![user.clone(), group.clone()],
            Message::UserRemoveGroupServerSuccess { user, group, server } => {
                vec![user.clone(), group.clone(), server.clone()]
            }
            Message::GroupDoesNotExist { group }
            | Message::GroupLoadError { group }
            | Message::DeleteGroupErrorDefault { group }
            | Message::DeleteGroupError { group } => vec![group.clone()],
            Message::SetSuccess {
                permission,
                value,
                holder,
                server,
            } => vec![permission.clone(), value.to_string(), holder.clone(), opt(server)],
            Message::UnsetSuccess {
                permission,
                holder,
                server,
            } => vec![permission.clone(), holder.clone(), opt(server)],
            Message::AlreadyHasPermission { holder, permission }
            | Message::DoesNotHavePermission { holder, permission } => {
                vec![holder.clone(), permission.clone()]
            }
            Message::TrackDoesNotExist { track }
            | Message::TrackLoadError { track }
            | Message::TrackEmpty { track }
            | Message::DeleteTrackError { track } => vec![track.clone()],
            Message::TrackAlreadyContains { track, group }
            | Message::TrackDoesNotContain { track, group }
            | Message::TrackAppendSuccess { track, group }
            | Message::TrackRemoveSuccess { track, group } => vec![track.clone(), group.clone()],
            Message::TrackInsertSuccess {
                track,
                group,
                position,
            } => vec![track.clone(), group.clone(), position.to_string()],
            Message::PromoteSuccess {
                user,
                track,
                from,
                to,
            } => vec![
                user.clone(),
                track.clone(),
                from.clone().unwrap_or_default(),
                to.clone(),
            ],
            Message::DemoteSuccess {
                user,
                track,
                from,
                to,
            } => vec![
                user.clone(),
                track.clone(),
                from.clone(),
                to.clone().unwrap_or_default(),
            ],
            Message::AlreadyAtTopOfTrack { user, track }
            | Message::AlreadyAtBottomOfTrack { user, track }
            | Message::UserNotOnTrack { user, track } => vec![user.clone(), track.clone()],
            Message::TrackAmbiguous {
                user,
                track,
                groups,
            } => vec![user.clone(), track.clone(), groups.join(", ")],
            Message::CreateSuccess { name }
            | Message::AlreadyExists { name }
            | Message::CreateError { name }
            | Message::DeleteSuccess { name }
            | Message::SaveError { name } => vec![name.clone()],
            Message::CheckResult {
                user,
                permission,
                server,
                result,
            } => vec![
                user.clone(),
                permission.clone(),
                opt(server),
                result.to_string(),
            ],
        }
    }
}

/// One-way reporting channel for outcomes
pub trait MessageSink: Send + Sync {
    fn send(&self, sender: &Sender, message: Message);
}

/// Logs each outcome at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn send(&self, sender: &Sender, message: Message) {
        info!(sender = %sender, kind = message.kind(), args = ?message.args(), "Operation outcome");
    }
}

/// Keeps every outcome in memory, for tests and for surfaces that render
/// after the operation finishes
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<Message>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.messages().iter().map(Message::kind).collect()
    }

    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn last(&self) -> Option<Message> {
        self.messages().last().cloned()
    }
}

impl MessageSink for CollectingSink {
    fn send(&self, _sender: &Sender, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_args() {
        let message = Message::UserRemoveGroupServerSuccess {
            user: "alice".to_string(),
            group: "mod".to_string(),
            server: "servera".to_string(),
        };
        assert_eq!(message.kind(), "USER_REMOVEGROUP_SERVER_SUCCESS");
        assert_eq!(message.args(), vec!["alice", "mod", "servera"]);

        let message = Message::UserAddGroupSuccess {
            user: "alice".to_string(),
            group: "mod".to_string(),
            server: None,
        };
        assert_eq!(message.args()[2], "global");
        assert!(Message::UserRemoveGroupErrorPrimary.args().is_empty());
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        let sender = Sender::console();
        sink.send(&sender, Message::NoPermission);
        sink.send(
            &sender,
            Message::DeleteSuccess {
                name: "staff".to_string(),
            },
        );

        assert_eq!(sink.kinds(), vec!["NO_PERMISSION", "DELETE_SUCCESS"]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.messages().is_empty());
    }
}
