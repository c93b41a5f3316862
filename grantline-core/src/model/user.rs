//! Users: node sets with a protected primary group

use super::errors::NodeError;
use super::holder::{ChangeTracker, NodeChange, NodeMap, PermissionHolder};
use super::node::{Node, NodeKey, GROUP_NODE_PREFIX};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    uuid: Uuid,
    name: String,
    primary_group: String,
    #[serde(default)]
    nodes: NodeMap,
    #[serde(skip)]
    tracker: ChangeTracker,
}

impl User {
    /// Create a user that is an unconditional member of `default_group`,
    /// which also becomes its primary group.
    pub fn new(uuid: Uuid, name: impl Into<String>, default_group: &str) -> Self {
        let primary_group = default_group.to_lowercase();
        let mut user = User {
            uuid,
            name: name.into(),
            primary_group: primary_group.clone(),
            nodes: NodeMap::new(),
            tracker: ChangeTracker::default(),
        };
        user.set_node(Node::group(&primary_group));
        user
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name != self.name {
            self.name = name;
            self.mark_dirty();
        }
    }

    pub fn primary_group(&self) -> &str {
        &self.primary_group
    }

    /// Switch the primary group. The user must hold an unscoped membership node for it.
    pub fn set_primary_group(&mut self, group: &str) -> Result<(), NodeError> {
        let group = group.to_lowercase();
        let member = self
            .nodes
            .get(&NodeKey::group(&group, None))
            .map(|node| node.value)
            .unwrap_or(false);
        if !member {
            return Err(NodeError::NotAMember {
                holder: self.name.clone(),
                group,
            });
        }
        if group != self.primary_group {
            self.primary_group = group;
            self.mark_dirty();
        }
        Ok(())
    }

    /// Whether the user holds a membership node for `group` in exactly `context`
    pub fn is_member_of(&self, group: &str, context: Option<&str>) -> bool {
        self.nodes
            .get(&NodeKey::group(group, context))
            .map(|node| node.value)
            .unwrap_or(false)
    }

    /// Add a membership node for `group`
    pub fn add_group(&mut self, group: &str, context: Option<&str>) -> NodeChange {
        self.set_node(Node::group(group).with_context(context))
    }

    /// Remove the membership node for `group` in `context`
    pub fn remove_group(&mut self, group: &str, context: Option<&str>) -> Result<Node, NodeError> {
        self.unset_node(&NodeKey::group(group, context))
    }

    /// Groups named by any membership node, in grant order, without duplicates
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for name in self.nodes.iter().filter(|n| n.is_membership()).filter_map(|n| n.group_name()) {
            if !groups.iter().any(|g| g == name) {
                groups.push(name.to_string());
            }
        }
        groups
    }
}

impl PermissionHolder for User {
    fn object_name(&self) -> String {
        self.name.clone()
    }

    fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    fn nodes_mut(&mut self) -> &mut NodeMap {
        &mut self.nodes
    }

    fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Refuse to negate the unscoped primary group membership or make it expire
    fn check_set(&self, node: &Node) -> Result<(), NodeError> {
        let weakened = !node.value || node.is_temporary();
        if weakened && node.key() == NodeKey::group(&self.primary_group, None) {
            return Err(NodeError::PrimaryGroupMembership {
                holder: self.name.clone(),
                group: self.primary_group.clone(),
            });
        }
        Ok(())
    }

    /// Refuse to drop the primary group membership.
    ///
    /// Unscoped removals of the primary group are always refused. A scoped
    /// removal is refused when the node it targets is the user's last
    /// membership node for the primary group.
    fn check_unset(&self, key: &NodeKey) -> Result<(), NodeError> {
        let group = match key.permission.strip_prefix(GROUP_NODE_PREFIX) {
            Some(group) if group == self.primary_group => group,
            _ => return Ok(()),
        };

        let last_membership = self.nodes.memberships_of(group).count() <= 1;
        if key.context.is_none() || (self.nodes.contains(key) && last_membership) {
            return Err(NodeError::PrimaryGroupMembership {
                holder: self.name.clone(),
                group: group.to_string(),
            });
        }
        Ok(())
    }
}
