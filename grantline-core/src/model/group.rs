//! Groups: named node sets that other holders inherit from

use super::errors::ModelError;
use super::holder::{ChangeTracker, NodeMap, PermissionHolder};
use super::types::validate_name;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    name: String,
    #[serde(default)]
    nodes: NodeMap,
    #[serde(skip)]
    tracker: ChangeTracker,
}

impl Group {
    /// Create an empty group. The name is lowercased.
    pub fn new(name: &str) -> Result<Self, ModelError> {
        let mut group = Group {
            name: validate_name(name)?,
            nodes: NodeMap::new(),
            tracker: ChangeTracker::default(),
        };
        group.tracker.touch();
        Ok(group)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PermissionHolder for Group {
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
}
