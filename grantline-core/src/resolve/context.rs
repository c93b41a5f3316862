//! Query contexts and resolution options

use crate::config::ResolutionConfig;
use crate::model::{normalize_context, Node};
use std::fmt;

/// The context a resolution is requested for
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryContext {
    server: Option<String>,
}

impl QueryContext {
    /// No server context: only unscoped nodes apply
    pub fn global() -> Self {
        QueryContext { server: None }
    }

    pub fn server(name: &str) -> Self {
        QueryContext {
            server: normalize_context(Some(name)),
        }
    }

    pub fn from_option(server: Option<&str>) -> Self {
        QueryContext {
            server: normalize_context(server),
        }
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Whether `node` contributes when resolving in this context
    pub fn applies(&self, node: &Node, include_global: bool) -> bool {
        match &node.context {
            None => include_global,
            Some(context) => self.server.as_deref() == Some(context.as_str()),
        }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.server.as_deref().unwrap_or(crate::model::GLOBAL_CONTEXT))
    }
}

/// Tunables for the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionOptions {
    /// Let `a.b.*` and `*` answer checks for more specific permissions
    pub apply_wildcards: bool,
    /// Let unscoped nodes contribute in every context
    pub include_global: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        ResolutionOptions {
            apply_wildcards: true,
            include_global: true,
        }
    }
}

impl From<&ResolutionConfig> for ResolutionOptions {
    fn from(config: &ResolutionConfig) -> Self {
        ResolutionOptions {
            apply_wildcards: config.apply_wildcards,
            include_global: config.include_global,
        }
    }
}
