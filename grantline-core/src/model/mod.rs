/*
    model - Permission entities

    Defines:
    - Nodes: single (permission, value, context, expiry) grants
    - Holders: anything that owns a node set (users and groups)
    - Users, Groups and Tracks
*/

pub mod errors;
pub mod group;
pub mod holder;
pub mod node;
pub mod track;
pub mod types;
pub mod user;

pub use errors::{ModelError, NodeError, TrackError};
pub use group::Group;
pub use holder::{NodeChange, NodeMap, PermissionHolder};
pub use node::{group_node, normalize_permission, Node, NodeKey, GLOBAL_CONTEXT, GROUP_NODE_PREFIX};
pub use track::Track;
pub use types::{normalize_context, validate_name, Timestamp};
pub use user::User;
