//! Resolved permission views

use hashlink::LinkedHashMap;
use std::fmt;

/// Result of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tristate {
    True,
    False,
    /// Nothing in the resolved set decides the permission
    Undefined,
}

impl Tristate {
    pub fn as_bool(&self) -> bool {
        matches!(self, Tristate::True)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map(Tristate::from).unwrap_or(Tristate::Undefined)
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tristate::True => "true",
            Tristate::False => "false",
            Tristate::Undefined => "undefined",
        };
        write!(f, "{}", s)
    }
}

/// Effective permissions of a holder in one context, in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPermissions {
    pub(crate) permissions: LinkedHashMap<String, bool>,
    pub(crate) groups: Vec<String>,
    pub(crate) missing_groups: Vec<String>,
    pub(crate) cycles: Vec<(String, String)>,
    pub(crate) apply_wildcards: bool,
}

impl ResolvedPermissions {
    pub fn get(&self, permission: &str) -> Option<bool> {
        self.permissions.get(permission).copied()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// (permission, value) pairs, highest priority first
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.permissions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Groups that contributed, in traversal order
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Referenced groups that do not exist
    pub fn missing_groups(&self) -> &[String] {
        &self.missing_groups
    }

    /// Inheritance edges `(from, to)` that close a cycle
    pub fn cycles(&self) -> &[(String, String)] {
        &self.cycles
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Check a permission.
    ///
    /// The exact key wins. With wildcards enabled the closest `prefix.*`
    /// ancestor decides next, then `*`.
    pub fn check(&self, permission: &str) -> Tristate {
        if let Some(value) = self.get(permission) {
            return value.into();
        }
        if !self.apply_wildcards {
            return Tristate::Undefined;
        }

        let mut prefix = permission;
        while let Some(index) = prefix.rfind('.') {
            prefix = &prefix[..index];
            if let Some(value) = self.get(&format!("{}.*", prefix)) {
                return value.into();
            }
        }
        self.get("*").into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(pairs: &[(&str, bool)]) -> ResolvedPermissions {
        let mut resolved = ResolvedPermissions {
            apply_wildcards: true,
            ..Default::default()
        };
        for (permission, value) in pairs {
            resolved.permissions.insert(permission.to_string(), *value);
        }
        resolved
    }

    #[test]
    fn test_exact_match() {
        let perms = resolved(&[("chat.send", true), ("chat.color", false)]);
        assert_eq!(perms.check("chat.send"), Tristate::True);
        assert_eq!(perms.check("chat.color"), Tristate::False);
        assert_eq!(perms.check("chat.mute"), Tristate::Undefined);
    }

    #[test]
    fn test_wildcards_most_specific_first() {
        let perms = resolved(&[("chat.*", true), ("chat.admin.*", false), ("*", true)]);
        assert_eq!(perms.check("chat.send"), Tristate::True);
        assert_eq!(perms.check("chat.admin.kick"), Tristate::False);
        assert_eq!(perms.check("build"), Tristate::True);
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let perms = resolved(&[("chat.*", true), ("chat.color", false)]);
        assert_eq!(perms.check("chat.color"), Tristate::False);
    }

    #[test]
    fn test_wildcards_disabled() {
        let mut perms = resolved(&[("chat.*", true)]);
        perms.apply_wildcards = false;
        assert_eq!(perms.check("chat.send"), Tristate::Undefined);
    }

    #[test]
    fn test_tristate_conversions() {
        assert_eq!(Tristate::from(None), Tristate::Undefined);
        assert!(Tristate::from(Some(true)).as_bool());
        assert_eq!(Tristate::False.to_string(), "false");
    }
}
