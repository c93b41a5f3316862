//! Permission nodes
//!
//! A node is a single grant: a permission string, a boolean value, an optional
//! context restricting where it applies and an optional expiry. Nodes are unique
//! per (permission, context) within a holder.

use super::types::{normalize_context, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of nodes that encode group membership / inheritance
pub const GROUP_NODE_PREFIX: &str = "group.";

/// Context value that is treated as "no context"
pub const GLOBAL_CONTEXT: &str = "global";

/// Build the membership permission for a group name
pub fn group_node(group: &str) -> String {
    format!("{}{}", GROUP_NODE_PREFIX, group.to_lowercase())
}

/// Lowercase the group segment of `group.<name>` permissions; group names
/// are case-insensitive
pub fn normalize_permission(permission: String) -> String {
    match permission.strip_prefix(GROUP_NODE_PREFIX) {
        Some(group) if group.chars().any(char::is_uppercase) => group_node(group),
        _ => permission,
    }
}

/// Uniqueness key of a node within a holder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub permission: String,
    pub context: Option<String>,
}

impl NodeKey {
    pub fn new(permission: impl Into<String>, context: Option<&str>) -> Self {
        NodeKey {
            permission: normalize_permission(permission.into()),
            context: normalize_context(context),
        }
    }

    /// Key of the membership node for `group`
    pub fn group(group: &str, context: Option<&str>) -> Self {
        NodeKey::new(group_node(group), context)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.permission, context),
            None => write!(f, "{}", self.permission),
        }
    }
}

/// A single permission grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub permission: String,
    pub value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
}

impl Node {
    /// Create an unscoped, permanent node
    pub fn new(permission: impl Into<String>, value: bool) -> Self {
        Node {
            permission: normalize_permission(permission.into()),
            value,
            context: None,
            expiry: None,
        }
    }

    /// Unscoped, permanent membership node for `group`
    pub fn group(group: &str) -> Self {
        Node::new(group_node(group), true)
    }

    /// Scope the node to a context (`global` clears the scope)
    pub fn with_context(mut self, context: Option<&str>) -> Self {
        self.context = normalize_context(context);
        self
    }

    /// Re-apply the construction rules to a node read from storage
    pub fn normalized(mut self) -> Self {
        self.permission = normalize_permission(self.permission);
        self.context = normalize_context(self.context.as_deref());
        self
    }

    /// Make the node expire at `expiry`
    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            permission: self.permission.clone(),
            context: self.context.clone(),
        }
    }

    pub fn matches(&self, key: &NodeKey) -> bool {
        self.permission == key.permission && self.context == key.context
    }

    /// Whether the node is past its expiry at `now`
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expiry, Some(expiry) if expiry <= now)
    }

    pub fn is_temporary(&self) -> bool {
        self.expiry.is_some()
    }

    /// Group named by a `group.<name>` node
    pub fn group_name(&self) -> Option<&str> {
        self.permission
            .strip_prefix(GROUP_NODE_PREFIX)
            .filter(|name| !name.is_empty())
    }

    /// Whether this node makes its holder inherit from a group
    pub fn is_membership(&self) -> bool {
        self.value && self.group_name().is_some()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.permission, self.value)?;
        if let Some(context) = &self.context {
            write!(f, " [{}]", context)?;
        }
        if let Some(expiry) = &self.expiry {
            write!(f, " (expires {})", expiry)?;
        }
        Ok(())
    }
}
