//! Update signals exchanged between cluster nodes

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which cached entities a receiving node should reload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum UpdateScope {
    All,
    User(Uuid),
    Group(String),
    Track(String),
}

impl fmt::Display for UpdateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateScope::All => write!(f, "all"),
            UpdateScope::User(uuid) => write!(f, "user {}", uuid),
            UpdateScope::Group(name) => write!(f, "group {}", name),
            UpdateScope::Track(name) => write!(f, "track {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSignal {
    /// Unique per signal; receivers drop ids they have already handled
    pub id: Uuid,
    /// Node that published the signal
    pub origin: Uuid,
    pub scope: UpdateScope,
}

impl UpdateSignal {
    pub fn new(origin: Uuid, scope: UpdateScope) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            scope,
        }
    }

    /// JSON encoding for transports that carry bytes
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_encoding() {
        let signal = UpdateSignal::new(Uuid::new_v4(), UpdateScope::Group("admin".to_string()));
        let json = String::from_utf8(signal.encode().unwrap()).unwrap();
        assert!(json.contains(r#""scope":{"type":"group","id":"admin"}"#));

        let decoded = UpdateSignal::decode(json.as_bytes()).unwrap();
        assert_eq!(decoded, signal);
    }

    #[test]
    fn test_all_scope_has_no_id() {
        let json = serde_json::to_string(&UpdateScope::All).unwrap();
        assert_eq!(json, r#"{"type":"all"}"#);
    }
}
