/*
    engine.rs - Breadth-first permission resolution

    Groups are looked up by name through a `GroupSource` (an arena keyed by
    group name), never by following object references, and traversal keeps an
    explicit visited set. Malformed cyclic inheritance therefore terminates;
    the cycles are reported on the result and logged, not resolved implicitly.
*/

use super::context::{QueryContext, ResolutionOptions};
use super::resolved::ResolvedPermissions;
use crate::model::{Group, NodeMap, PermissionHolder, Timestamp};
use hashlink::LinkedHashMap;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{trace, warn};

/// Lookup table of groups by (lowercase) name
pub trait GroupSource {
    fn group(&self, name: &str) -> Option<&Group>;
}

impl GroupSource for HashMap<String, Group> {
    fn group(&self, name: &str) -> Option<&Group> {
        self.get(name)
    }
}

impl GroupSource for BTreeMap<String, Group> {
    fn group(&self, name: &str) -> Option<&Group> {
        self.get(name)
    }
}

impl GroupSource for HashMap<String, Arc<Group>> {
    fn group(&self, name: &str) -> Option<&Group> {
        self.get(name).map(Arc::as_ref)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

/// Resolves holders against a fixed set of groups
pub struct Resolver<'a, S: GroupSource + ?Sized> {
    groups: &'a S,
    options: ResolutionOptions,
    now: Timestamp,
}

impl<'a, S: GroupSource + ?Sized> Resolver<'a, S> {
    pub fn new(groups: &'a S, options: ResolutionOptions) -> Self {
        Resolver {
            groups,
            options,
            now: Timestamp::now(),
        }
    }

    /// Evaluate expiry against `now` instead of the wall clock
    pub fn at(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }

    /// Compute the effective permissions of `holder` in `query`
    pub fn resolve<H: PermissionHolder + ?Sized>(
        &self,
        holder: &H,
        query: &QueryContext,
    ) -> ResolvedPermissions {
        ::metrics::counter!(crate::metrics::RESOLUTION_RUNS).increment(1);

        let mut resolved = ResolvedPermissions {
            apply_wildcards: self.options.apply_wildcards,
            ..Default::default()
        };

        let roots = self.fold(holder.nodes(), query, &mut resolved.permissions);
        let mut queue: VecDeque<String> = roots.iter().cloned().collect();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            match self.groups.group(&name) {
                Some(group) => {
                    let refs = self.fold(group.nodes(), query, &mut resolved.permissions);
                    resolved.groups.push(name);
                    queue.extend(refs.into_iter().filter(|r| !visited.contains(r)));
                }
                None => resolved.missing_groups.push(name),
            }
        }

        resolved.cycles = self.detect_cycles(&roots, query);
        if !resolved.cycles.is_empty() {
            ::metrics::counter!(crate::metrics::RESOLUTION_CYCLES).increment(1);
            warn!(
                holder = %holder.object_name(),
                cycles = ?resolved.cycles,
                "Cyclic group inheritance detected"
            );
        }

        trace!(
            holder = %holder.object_name(),
            context = %query,
            permissions = resolved.permissions.len(),
            groups = resolved.groups.len(),
            "Resolved permissions"
        );
        resolved
    }

    /// Fold one holder's applicable nodes into `into` (first value wins) and
    /// return the groups it inherits from, in node order.
    fn fold(
        &self,
        nodes: &NodeMap,
        query: &QueryContext,
        into: &mut LinkedHashMap<String, bool>,
    ) -> Vec<String> {
        let applicable: Vec<_> = nodes
            .iter()
            .filter(|node| !node.is_expired(self.now))
            .filter(|node| query.applies(node, self.options.include_global))
            .collect();

        // scoped nodes are more specific, so they go first
        let scoped = applicable.iter().filter(|node| node.context.is_some());
        let unscoped = applicable.iter().filter(|node| node.context.is_none());
        for node in scoped.chain(unscoped) {
            if !into.contains_key(&node.permission) {
                into.insert(node.permission.clone(), node.value);
            }
        }

        let mut refs: Vec<String> = Vec::new();
        for node in applicable.iter().filter(|node| node.is_membership()) {
            // a higher priority `group.x = false` blocks the inheritance
            if into.get(&node.permission) != Some(&true) {
                continue;
            }
            if let Some(name) = node.group_name() {
                if !refs.iter().any(|r| r == name) {
                    refs.push(name.to_string());
                }
            }
        }
        refs
    }

    /// Inheritance edges of a group in `query`
    fn edges(&self, name: &str, query: &QueryContext) -> Vec<String> {
        match self.groups.group(name) {
            Some(group) => {
                let mut scratch = LinkedHashMap::new();
                self.fold(group.nodes(), query, &mut scratch)
            }
            None => Vec::new(),
        }
    }

    /// Iterative DFS over the reachable inheritance graph, collecting back edges
    fn detect_cycles(&self, roots: &[String], query: &QueryContext) -> Vec<(String, String)> {
        let mut marks: HashMap<String, Mark> = HashMap::new();
        let mut cycles = Vec::new();

        for root in roots {
            if marks.contains_key(root) {
                continue;
            }
            marks.insert(root.clone(), Mark::Active);
            let mut stack: Vec<(String, Vec<String>, usize)> =
                vec![(root.clone(), self.edges(root, query), 0)];

            loop {
                let step = match stack.last_mut() {
                    None => break,
                    Some((name, children, next)) => {
                        if *next < children.len() {
                            *next += 1;
                            Some((name.clone(), children[*next - 1].clone()))
                        } else {
                            None
                        }
                    }
                };

                match step {
                    Some((parent, child)) => match marks.get(&child) {
                        Some(Mark::Active) => cycles.push((parent, child)),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child.clone(), Mark::Active);
                            let children = self.edges(&child, query);
                            stack.push((child, children, 0));
                        }
                    },
                    None => {
                        if let Some((name, _, _)) = stack.pop() {
                            marks.insert(name, Mark::Done);
                        }
                    }
                }
            }
        }
        cycles
    }
}
