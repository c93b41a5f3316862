//! Plain English rendering of operation outcomes

use grantline_core::ops::{Message, MessageSink, Sender};

fn server(server: &Option<String>) -> String {
    match server {
        Some(server) => format!(" on server {}", server),
        None => String::new(),
    }
}

pub fn render(message: &Message) -> String {
    match message {
        Message::NoPermission => "You do not have permission to do that.".to_string(),
        Message::InvalidName { name, reason } => format!("'{}' is not a valid name: {}", name, reason),
        Message::InvalidPermission { permission } => {
            format!("'{}' is not a valid permission.", permission)
        }
        Message::UserNotFound { user } => format!("User {} could not be found.", user),
        Message::UserLoadError { user } => format!("Failed to load user {}.", user),
        Message::UserSaveError { user } => format!("Failed to save user {}.", user),
        Message::UserAddGroupSuccess { user, group, server: at } => {
            format!("{} now inherits from {}{}.", user, group, server(at))
        }
        Message::UserAlreadyMemberOf { user, group } => {
            format!("{} is already a member of {}.", user, group)
        }
        Message::UserRemoveGroupSuccess { user, group } => {
            format!("{} no longer inherits from {}.", user, group)
        }
        Message::UserRemoveGroupServerSuccess { user, group, server } => {
            format!("{} no longer inherits from {} on server {}.", user, group, server)
        }
        Message::UserRemoveGroupErrorPrimary => {
            "You cannot remove a user from their primary group.".to_string()
        }
        Message::UserNotMemberOf { user, group } => {
            format!("{} is not a member of {}.", user, group)
        }
        Message::PrimaryGroupSet { user, group } => {
            format!("{}'s primary group is now {}.", user, group)
        }
        Message::PrimaryGroupNotMember { user, group } => {
            format!("{} must be a member of {} before it can be their primary group.", user, group)
        }
        Message::GroupDoesNotExist { group } => format!("Group {} does not exist.", group),
        Message::GroupLoadError { group } => format!("Failed to load group {}.", group),
        Message::DeleteGroupErrorDefault { group } => {
            format!("{} is the default group and cannot be deleted.", group)
        }
        Message::DeleteGroupError { group } => format!("Failed to delete group {}.", group),
        Message::SetSuccess {
            permission,
            value,
            holder,
            server: at,
        } => format!("Set {} to {} for {}{}.", permission, value, holder, server(at)),
        Message::UnsetSuccess {
            permission,
            holder,
            server: at,
        } => format!("Unset {} for {}{}.", permission, holder, server(at)),
        Message::AlreadyHasPermission { holder, permission } => {
            format!("{} already has {} set.", holder, permission)
        }
        Message::DoesNotHavePermission { holder, permission } => {
            format!("{} does not have {} set.", holder, permission)
        }
        Message::TrackDoesNotExist { track } => format!("Track {} does not exist.", track),
        Message::TrackLoadError { track } => format!("Failed to load track {}.", track),
        Message::TrackEmpty { track } => format!("Track {} has no groups.", track),
        Message::TrackAlreadyContains { track, group } => {
            format!("Track {} already contains {}.", track, group)
        }
        Message::TrackDoesNotContain { track, group } => {
            format!("Track {} does not contain {}.", track, group)
        }
        Message::TrackAppendSuccess { track, group } => {
            format!("Appended {} to track {}.", group, track)
        }
        Message::TrackInsertSuccess {
            track,
            group,
            position,
        } => format!("Inserted {} into track {} at position {}.", group, track, position),
        Message::TrackRemoveSuccess { track, group } => {
            format!("Removed {} from track {}.", group, track)
        }
        Message::DeleteTrackError { track } => format!("Failed to delete track {}.", track),
        Message::PromoteSuccess {
            user,
            track,
            from,
            to,
        } => match from {
            Some(from) => format!("Promoted {} along {} from {} to {}.", user, track, from, to),
            None => format!("Added {} to {} on track {}.", user, to, track),
        },
        Message::DemoteSuccess {
            user,
            track,
            from,
            to,
        } => match to {
            Some(to) => format!("Demoted {} along {} from {} to {}.", user, track, from, to),
            None => format!("Removed {} from {} on track {}.", user, from, track),
        },
        Message::AlreadyAtTopOfTrack { user, track } => {
            format!("{} is already at the top of track {}.", user, track)
        }
        Message::AlreadyAtBottomOfTrack { user, track } => {
            format!("{} is already at the bottom of track {}.", user, track)
        }
        Message::UserNotOnTrack { user, track } => {
            format!("{} is not on track {}.", user, track)
        }
        Message::TrackAmbiguous {
            user,
            track,
            groups,
        } => format!(
            "{} is in more than one group on track {}: {}.",
            user,
            track,
            groups.join(", ")
        ),
        Message::CreateSuccess { name } => format!("{} was created.", name),
        Message::AlreadyExists { name } => format!("{} already exists.", name),
        Message::CreateError { name } => format!("Failed to create {}.", name),
        Message::DeleteSuccess { name } => format!("{} was deleted.", name),
        Message::SaveError { name } => format!("Failed to save {}.", name),
        Message::CheckResult {
            user,
            permission,
            server: at,
            result,
        } => format!("{} has {} set to {}{}.", user, permission, result, server(at)),
    }
}

/// Prints every outcome to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintSink;

impl MessageSink for PrintSink {
    fn send(&self, _sender: &Sender, message: Message) {
        println!("{}", render(&message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantline_core::Tristate;

    #[test]
    fn test_render_scoped_outcomes() {
        let message = Message::UserAddGroupSuccess {
            user: "Luck".to_string(),
            group: "mod".to_string(),
            server: Some("factions".to_string()),
        };
        assert_eq!(render(&message), "Luck now inherits from mod on server factions.");

        let message = Message::SetSuccess {
            permission: "build".to_string(),
            value: false,
            holder: "default".to_string(),
            server: None,
        };
        assert_eq!(render(&message), "Set build to false for default.");
    }

    #[test]
    fn test_render_track_edges() {
        let first = Message::PromoteSuccess {
            user: "Luck".to_string(),
            track: "staff".to_string(),
            from: None,
            to: "helper".to_string(),
        };
        assert_eq!(render(&first), "Added Luck to helper on track staff.");

        let last = Message::DemoteSuccess {
            user: "Luck".to_string(),
            track: "staff".to_string(),
            from: "helper".to_string(),
            to: None,
        };
        assert_eq!(render(&last), "Removed Luck from helper on track staff.");
    }

    #[test]
    fn test_render_check_result() {
        let message = Message::CheckResult {
            user: "Luck".to_string(),
            permission: "fly".to_string(),
            server: None,
            result: Tristate::Undefined,
        };
        assert_eq!(render(&message), "Luck has fly set to undefined.");
    }
}
