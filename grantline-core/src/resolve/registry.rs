//! Registry of permission strings seen in checks and grants

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

/// Known permission strings, used for tab completion
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    known: RwLock<BTreeSet<String>>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a permission string
    pub fn offer(&self, permission: &str) {
        if permission.is_empty() {
            return;
        }
        let mut known = self.known.write().unwrap_or_else(PoisonError::into_inner);
        if !known.contains(permission) {
            known.insert(permission.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.known.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known permissions, sorted
    pub fn known(&self) -> Vec<String> {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
