//! Group verbs

use super::{valid_permission, CommandResult, Message, Operations, Permission, Sender};
use crate::model::{normalize_context, validate_name, Node, NodeChange, NodeKey, PermissionHolder};
use crate::propagation::UpdateScope;
use crate::store::LoadOutcome;
use tracing::info;

impl Operations {
    pub async fn group_set_permission(
        &self,
        sender: &Sender,
        group: &str,
        permission: &str,
        value: bool,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::GroupSetPermission) {
            return CommandResult::NoPermission;
        }
        if !valid_permission(permission) {
            self.report(
                sender,
                Message::InvalidPermission {
                    permission: permission.to_string(),
                },
            );
            return CommandResult::InvalidArgs;
        }
        let handle = match self.find_group(sender, group).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let server = normalize_context(server);
        let mut group = handle.write().await;
        let before = group.clone();
        let node = Node::new(permission, value).with_context(server.as_deref());
        if group.set_node(node) == NodeChange::Unchanged {
            self.report(
                sender,
                Message::AlreadyHasPermission {
                    holder: group.name().to_string(),
                    permission: permission.to_string(),
                },
            );
            return CommandResult::StateError;
        }

        if !self.persist_group(sender, &mut group, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::SetSuccess {
                permission: permission.to_string(),
                value,
                holder: group.name().to_string(),
                server,
            },
        );
        CommandResult::Success
    }

    pub async fn group_unset_permission(
        &self,
        sender: &Sender,
        group: &str,
        permission: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::GroupUnsetPermission) {
            return CommandResult::NoPermission;
        }
        let handle = match self.find_group(sender, group).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let server = normalize_context(server);
        let mut group = handle.write().await;
        let before = group.clone();
        if group
            .unset_node(&NodeKey::new(permission, server.as_deref()))
            .is_err()
        {
            self.report(
                sender,
                Message::DoesNotHavePermission {
                    holder: group.name().to_string(),
                    permission: permission.to_string(),
                },
            );
            return CommandResult::StateError;
        }

        if !self.persist_group(sender, &mut group, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::UnsetSuccess {
                permission: permission.to_string(),
                holder: group.name().to_string(),
                server,
            },
        );
        CommandResult::Success
    }

    pub async fn create_group(&self, sender: &Sender, name: &str) -> CommandResult {
        if !self.authorize(sender, Permission::CreateGroup) {
            return CommandResult::NoPermission;
        }
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(err) => {
                self.report(
                    sender,
                    Message::InvalidName {
                        name: name.to_string(),
                        reason: err.to_string(),
                    },
                );
                return CommandResult::InvalidArgs;
            }
        };

        if self.state.groups.contains(&name).await {
            self.report(sender, Message::AlreadyExists { name });
            return CommandResult::StateError;
        }
        match self.state.datastore.load_group(&name).await {
            LoadOutcome::Found(group) => {
                self.state.groups.get_or_insert(group).await;
                self.report(sender, Message::AlreadyExists { name });
                return CommandResult::StateError;
            }
            LoadOutcome::NotFound => {}
            LoadOutcome::Failed(_) => {
                self.report(sender, Message::CreateError { name });
                return CommandResult::LoadError;
            }
        }

        match self.state.datastore.create_and_load_group(&name).await {
            LoadOutcome::Found(group) => {
                self.state.groups.get_or_insert(group).await;
                self.state.propagate(UpdateScope::Group(name.clone()));
                info!(sender = %sender, group = %name, "Group created");
                self.report(sender, Message::CreateSuccess { name });
                CommandResult::Success
            }
            _ => {
                self.report(sender, Message::CreateError { name });
                CommandResult::SaveError
            }
        }
    }

    /// Delete a group after stripping every cached membership node naming it
    pub async fn delete_group(&self, sender: &Sender, name: &str) -> CommandResult {
        if !self.authorize(sender, Permission::DeleteGroup) {
            return CommandResult::NoPermission;
        }
        let name = name.to_lowercase();
        if name == self.state.default_group() {
            self.report(sender, Message::DeleteGroupErrorDefault { group: name });
            return CommandResult::StateError;
        }
        if let Err(result) = self.find_group(sender, &name).await {
            return result;
        }

        self.strip_group_references(sender, &name).await;

        if !self.state.datastore.delete_group(&name).await.is_success() {
            self.report(sender, Message::DeleteGroupError { group: name });
            return CommandResult::SaveError;
        }
        self.state.groups.remove(&name).await;
        self.state.resolved.invalidate_all();
        self.state.propagate(UpdateScope::Group(name.clone()));
        info!(sender = %sender, group = %name, "Group deleted");
        self.report(sender, Message::DeleteSuccess { name });
        CommandResult::Success
    }

    async fn strip_group_references(&self, sender: &Sender, name: &str) {
        let default_group = self.state.default_group().to_string();

        for handle in self.state.users.handles().await {
            let mut user = handle.write().await;
            let before = user.clone();
            let removed = user
                .nodes_mut()
                .remove_where(|node| node.group_name() == Some(name));
            if removed.is_empty() {
                continue;
            }
            user.mark_dirty();
            if user.primary_group() == name {
                user.add_group(&default_group, None);
                // membership was just added, so this cannot fail
                let _ = user.set_primary_group(&default_group);
            }
            self.persist_user(sender, &mut user, before).await;
        }

        for handle in self.state.groups.handles().await {
            let mut group = handle.write().await;
            if group.name() == name {
                continue;
            }
            let before = group.clone();
            let removed = group
                .nodes_mut()
                .remove_where(|node| node.group_name() == Some(name));
            if removed.is_empty() {
                continue;
            }
            group.mark_dirty();
            self.persist_group(sender, &mut group, before).await;
        }
    }
}
