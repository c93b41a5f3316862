//! Error types for the permission model

use thiserror::Error;

/// Errors raised by node set mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// No node matches the (permission, context) key
    #[error("{holder} has no node {permission} in context {}", .context.as_deref().unwrap_or("global"))]
    ObjectLacksNode {
        holder: String,
        permission: String,
        context: Option<String>,
    },

    /// The removal would drop the user's last membership in their primary group
    #[error("{group} is the primary group of {holder}")]
    PrimaryGroupMembership { holder: String, group: String },

    /// The user is not an unconditional member of the group
    #[error("{holder} is not a member of {group}")]
    NotAMember { holder: String, group: String },
}

/// Errors raised by track mutations and promotions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    #[error("track {track} already contains {group}")]
    AlreadyContains { track: String, group: String },

    #[error("track {track} does not contain {group}")]
    DoesNotContain { track: String, group: String },

    #[error("track {track} has no groups")]
    Empty { track: String },

    #[error("user is already at the top of track {track}")]
    AlreadyAtTopOfTrack { track: String },

    #[error("user is already at the bottom of track {track}")]
    AlreadyAtBottomOfTrack { track: String },

    #[error("user is not on track {track}")]
    NotOnTrack { track: String },

    /// The user holds memberships in more than one group of the track
    #[error("user is in more than one group of track {track}: {groups:?}")]
    Ambiguous { track: String, groups: Vec<String> },

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Errors raised while constructing entities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lacks_node_display() {
        let err = NodeError::ObjectLacksNode {
            holder: "alice".to_string(),
            permission: "group.mod".to_string(),
            context: None,
        };
        assert_eq!(err.to_string(), "alice has no node group.mod in context global");

        let err = NodeError::ObjectLacksNode {
            holder: "alice".to_string(),
            permission: "group.mod".to_string(),
            context: Some("servera".to_string()),
        };
        assert!(err.to_string().ends_with("context servera"));
    }

    #[test]
    fn test_track_error_from_node_error() {
        let err: TrackError = NodeError::NotAMember {
            holder: "bob".to_string(),
            group: "admin".to_string(),
        }
        .into();
        assert!(matches!(err, TrackError::Node(_)));
    }
}
