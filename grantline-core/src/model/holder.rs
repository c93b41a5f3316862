//! Node sets and the holder trait shared by users and groups

use super::errors::NodeError;
use super::node::{Node, NodeKey};
use super::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Result of upserting a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeChange {
    /// No node existed for the key
    Added,
    /// A node with the same key was replaced; holds the previous node
    Replaced(Node),
    /// An identical node was already present
    Unchanged,
}

impl NodeChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, NodeChange::Unchanged)
    }
}

/// Insertion-ordered set of nodes, unique per (permission, context).
///
/// Order matters: resolution walks membership nodes in the order they were
/// granted, so the set keeps nodes in a `Vec` rather than a sorted map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct NodeMap {
    nodes: Vec<Node>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.iter().find(|node| node.matches(key))
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Upsert by key. A replaced node keeps its position.
    pub fn set(&mut self, node: Node) -> NodeChange {
        let key = node.key();
        match self.nodes.iter_mut().find(|existing| existing.matches(&key)) {
            Some(existing) if *existing == node => NodeChange::Unchanged,
            Some(existing) => NodeChange::Replaced(std::mem::replace(existing, node)),
            None => {
                self.nodes.push(node);
                NodeChange::Added
            }
        }
    }

    pub fn unset(&mut self, key: &NodeKey) -> Option<Node> {
        let index = self.nodes.iter().position(|node| node.matches(key))?;
        Some(self.nodes.remove(index))
    }

    /// Keep only the nodes matching the predicate, returning the removed ones
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Node>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut removed = Vec::new();
        self.nodes.retain(|node| {
            if predicate(node) {
                removed.push(node.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Membership nodes (any context) naming `group`
    pub fn memberships_of<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .iter()
            .filter(move |node| node.is_membership() && node.group_name() == Some(group))
    }
}

impl From<Vec<Node>> for NodeMap {
    fn from(nodes: Vec<Node>) -> Self {
        let mut map = NodeMap::new();
        for node in nodes.into_iter().map(Node::normalized) {
            // first occurrence wins for duplicated keys in stored data
            if !map.contains(&node.key()) {
                map.nodes.push(node);
            }
        }
        map
    }
}

impl From<NodeMap> for Vec<Node> {
    fn from(map: NodeMap) -> Self {
        map.nodes
    }
}

/// Dirty flag plus a revision counter bumped on every mutation.
///
/// The revision lets a completed save clear the dirty flag only when nothing
/// changed the entity after the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    dirty: bool,
    revision: u64,
}

impl ChangeTracker {
    pub fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clear the dirty flag if `revision` is still current
    pub fn mark_saved(&mut self, revision: u64) -> bool {
        if self.revision == revision {
            self.dirty = false;
            true
        } else {
            false
        }
    }
}

/// An entity that owns a node set (users and groups)
pub trait PermissionHolder {
    /// Name used in messages and errors
    fn object_name(&self) -> String;

    fn nodes(&self) -> &NodeMap;

    /// Raw access to the node set. Does not run guards or mark the holder dirty.
    fn nodes_mut(&mut self) -> &mut NodeMap;

    fn tracker(&self) -> &ChangeTracker;

    fn tracker_mut(&mut self) -> &mut ChangeTracker;

    /// Veto hook run before a node is upserted
    fn check_set(&self, _node: &Node) -> Result<(), NodeError> {
        Ok(())
    }

    /// Veto hook run before a node is removed
    fn check_unset(&self, _key: &NodeKey) -> Result<(), NodeError> {
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.tracker().is_dirty()
    }

    fn revision(&self) -> u64 {
        self.tracker().revision()
    }

    fn mark_dirty(&mut self) {
        self.tracker_mut().touch();
    }

    fn mark_saved(&mut self, revision: u64) -> bool {
        self.tracker_mut().mark_saved(revision)
    }

    fn mark_clean(&mut self) {
        let revision = self.revision();
        self.mark_saved(revision);
    }

    fn has_node(&self, key: &NodeKey) -> bool {
        self.nodes().contains(key)
    }

    /// Upsert a node by (permission, context)
    fn set_node(&mut self, node: Node) -> NodeChange {
        let change = self.nodes_mut().set(node);
        if change.is_change() {
            self.mark_dirty();
        }
        change
    }

    /// Upsert a node after running the `check_set` guard
    fn try_set_node(&mut self, node: Node) -> Result<NodeChange, NodeError> {
        self.check_set(&node)?;
        Ok(self.set_node(node))
    }

    /// Remove the node matching `key`
    fn unset_node(&mut self, key: &NodeKey) -> Result<Node, NodeError> {
        self.check_unset(key)?;
        match self.nodes_mut().unset(key) {
            Some(node) => {
                self.mark_dirty();
                Ok(node)
            }
            None => Err(NodeError::ObjectLacksNode {
                holder: self.object_name(),
                permission: key.permission.clone(),
                context: key.context.clone(),
            }),
        }
    }

    /// Drop nodes whose expiry has passed
    fn prune_expired(&mut self, now: Timestamp) -> Vec<Node> {
        let removed = self.nodes_mut().remove_where(|node| node.is_expired(now));
        if !removed.is_empty() {
            self.mark_dirty();
        }
        removed
    }

    /// Groups this holder inherits from when resolving in `context`
    fn inherited_groups(&self, context: Option<&str>, now: Timestamp) -> Vec<String> {
        self.nodes()
            .iter()
            .filter(|node| node.is_membership() && !node.is_expired(now))
            .filter(|node| node.context.is_none() || node.context.as_deref() == context)
            .filter_map(|node| node.group_name().map(str::to_string))
            .collect()
    }
}
