//! User verbs

use super::{valid_permission, CommandResult, Message, Operations, Permission, Sender};
use crate::model::{normalize_context, Node, NodeChange, NodeError, NodeKey, PermissionHolder, TrackError};
use crate::resolve::QueryContext;
use crate::tracks::{apply_demotion, apply_promotion, plan_demotion, plan_promotion, Demotion, Promotion};

impl Operations {
    /// Add `user` to `group`, optionally only in `server`
    pub async fn user_add_group(
        &self,
        sender: &Sender,
        user: &str,
        group: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserAddGroup) {
            return CommandResult::NoPermission;
        }
        let group = match self.find_group(sender, group).await {
            Ok(handle) => handle.read().await.name().to_string(),
            Err(result) => return result,
        };
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let server = normalize_context(server);
        let mut user = handle.write().await;
        let before = user.clone();
        if user.is_member_of(&group, server.as_deref()) {
            self.report(
                sender,
                Message::UserAlreadyMemberOf {
                    user: user.name().to_string(),
                    group,
                },
            );
            return CommandResult::StateError;
        }

        user.add_group(&group, server.as_deref());
        if !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::UserAddGroupSuccess {
                user: user.name().to_string(),
                group,
                server,
            },
        );
        CommandResult::Success
    }

    /// Remove `user` from `group` in `server` (or the unscoped membership)
    ///
    /// The primary group can only be left through a scoped removal that
    /// leaves another membership node for it in place.
    pub async fn user_remove_group(
        &self,
        sender: &Sender,
        user: &str,
        group: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserRemoveGroup) {
            return CommandResult::NoPermission;
        }
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let group = group.to_lowercase();
        let server = normalize_context(server);
        let mut user = handle.write().await;
        let before = user.clone();

        if server.is_none() && user.primary_group() == group {
            self.report(sender, Message::UserRemoveGroupErrorPrimary);
            return CommandResult::StateError;
        }

        match user.remove_group(&group, server.as_deref()) {
            Ok(_) => {}
            Err(NodeError::PrimaryGroupMembership { .. }) => {
                self.report(sender, Message::UserRemoveGroupErrorPrimary);
                return CommandResult::StateError;
            }
            Err(_) => {
                self.report(
                    sender,
                    Message::UserNotMemberOf {
                        user: user.name().to_string(),
                        group,
                    },
                );
                return CommandResult::StateError;
            }
        }

        if !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }
        let name = user.name().to_string();
        let message = match server {
            Some(server) => Message::UserRemoveGroupServerSuccess {
                user: name,
                group,
                server,
            },
            None => Message::UserRemoveGroupSuccess { user: name, group },
        };
        self.report(sender, message);
        CommandResult::Success
    }

    pub async fn user_set_permission(
        &self,
        sender: &Sender,
        user: &str,
        permission: &str,
        value: bool,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserSetPermission) {
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
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let server = normalize_context(server);
        let mut user = handle.write().await;
        let before = user.clone();
        let node = Node::new(permission, value).with_context(server.as_deref());
        match user.try_set_node(node) {
            Ok(NodeChange::Unchanged) => {
                self.report(
                    sender,
                    Message::AlreadyHasPermission {
                        holder: user.name().to_string(),
                        permission: permission.to_string(),
                    },
                );
                return CommandResult::StateError;
            }
            Ok(_) => {}
            Err(_) => {
                self.report(sender, Message::UserRemoveGroupErrorPrimary);
                return CommandResult::StateError;
            }
        }

        if !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::SetSuccess {
                permission: permission.to_string(),
                value,
                holder: user.name().to_string(),
                server,
            },
        );
        CommandResult::Success
    }

    pub async fn user_unset_permission(
        &self,
        sender: &Sender,
        user: &str,
        permission: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserUnsetPermission) {
            return CommandResult::NoPermission;
        }
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let server = normalize_context(server);
        let mut user = handle.write().await;
        let before = user.clone();
        match user.unset_node(&NodeKey::new(permission, server.as_deref())) {
            Ok(_) => {}
            Err(NodeError::PrimaryGroupMembership { .. }) => {
                self.report(sender, Message::UserRemoveGroupErrorPrimary);
                return CommandResult::StateError;
            }
            Err(_) => {
                self.report(
                    sender,
                    Message::DoesNotHavePermission {
                        holder: user.name().to_string(),
                        permission: permission.to_string(),
                    },
                );
                return CommandResult::StateError;
            }
        }

        if !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::UnsetSuccess {
                permission: permission.to_string(),
                holder: user.name().to_string(),
                server,
            },
        );
        CommandResult::Success
    }

    pub async fn user_set_primary_group(
        &self,
        sender: &Sender,
        user: &str,
        group: &str,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserSetPrimaryGroup) {
            return CommandResult::NoPermission;
        }
        let group = match self.find_group(sender, group).await {
            Ok(handle) => handle.read().await.name().to_string(),
            Err(result) => return result,
        };
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let mut user = handle.write().await;
        let before = user.clone();
        if user.set_primary_group(&group).is_err() {
            self.report(
                sender,
                Message::PrimaryGroupNotMember {
                    user: user.name().to_string(),
                    group,
                },
            );
            return CommandResult::StateError;
        }

        if user.is_dirty() && !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }
        self.report(
            sender,
            Message::PrimaryGroupSet {
                user: user.name().to_string(),
                group,
            },
        );
        CommandResult::Success
    }

    /// Move `user` one step up `track`, joining its first group if not on it
    pub async fn promote(
        &self,
        sender: &Sender,
        user: &str,
        track: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserPromote) {
            return CommandResult::NoPermission;
        }
        let track = match self.find_track(sender, track).await {
            Ok(handle) => handle.read().await.clone(),
            Err(result) => return result,
        };
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let mut user = handle.write().await;
        let before = user.clone();
        let promotion = match plan_promotion(&user, &track, server) {
            Ok(promotion) => promotion,
            Err(err) => return self.report_track_error(sender, user.name(), err),
        };

        let target = match &promotion {
            Promotion::Joined { group, .. } | Promotion::Moved { to: group, .. } => group.clone(),
        };
        // the target must exist before anyone is moved into it
        if let Err(result) = self.find_group(sender, &target).await {
            return result;
        }

        if let Err(err) = apply_promotion(&mut user, &promotion) {
            return self.report_track_error(sender, user.name(), err);
        }
        if !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }

        let from = match promotion {
            Promotion::Joined { .. } => None,
            Promotion::Moved { from, .. } => Some(from),
        };
        self.report(
            sender,
            Message::PromoteSuccess {
                user: user.name().to_string(),
                track: track.name().to_string(),
                from,
                to: target,
            },
        );
        CommandResult::Success
    }

    /// Move `user` one step down `track`; demoting from the first group leaves the track
    pub async fn demote(
        &self,
        sender: &Sender,
        user: &str,
        track: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserDemote) {
            return CommandResult::NoPermission;
        }
        let track = match self.find_track(sender, track).await {
            Ok(handle) => handle.read().await.clone(),
            Err(result) => return result,
        };
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let mut user = handle.write().await;
        let before = user.clone();
        let demotion = match plan_demotion(&user, &track, server) {
            Ok(demotion) => demotion,
            Err(err) => return self.report_track_error(sender, user.name(), err),
        };

        if let Demotion::Moved { to, .. } = &demotion {
            if let Err(result) = self.find_group(sender, to).await {
                return result;
            }
        }

        if let Err(err) = apply_demotion(&mut user, &demotion) {
            return self.report_track_error(sender, user.name(), err);
        }
        if !self.persist_user(sender, &mut user, before).await {
            return CommandResult::SaveError;
        }

        let (from, to) = match demotion {
            Demotion::Moved { from, to, .. } => (from, Some(to)),
            Demotion::Removed { from, .. } => (from, None),
        };
        self.report(
            sender,
            Message::DemoteSuccess {
                user: user.name().to_string(),
                track: track.name().to_string(),
                from,
                to,
            },
        );
        CommandResult::Success
    }

    pub(super) fn report_track_error(
        &self,
        sender: &Sender,
        user: &str,
        err: TrackError,
    ) -> CommandResult {
        let user = user.to_string();
        let message = match err {
            TrackError::AlreadyAtTopOfTrack { track } => Message::AlreadyAtTopOfTrack { user, track },
            TrackError::AlreadyAtBottomOfTrack { track } => {
                Message::AlreadyAtBottomOfTrack { user, track }
            }
            TrackError::NotOnTrack { track } => Message::UserNotOnTrack { user, track },
            TrackError::Ambiguous { track, groups } => Message::TrackAmbiguous {
                user,
                track,
                groups,
            },
            TrackError::Empty { track } => Message::TrackEmpty { track },
            TrackError::AlreadyContains { track, group } => {
                Message::TrackAlreadyContains { track, group }
            }
            TrackError::DoesNotContain { track, group } => {
                Message::TrackDoesNotContain { track, group }
            }
            TrackError::Node(NodeError::PrimaryGroupMembership { .. }) => {
                Message::UserRemoveGroupErrorPrimary
            }
            TrackError::Node(NodeError::NotAMember { group, .. }) => {
                Message::PrimaryGroupNotMember { user, group }
            }
            TrackError::Node(NodeError::ObjectLacksNode { permission, .. }) => {
                Message::DoesNotHavePermission {
                    holder: user,
                    permission,
                }
            }
        };
        self.report(sender, message);
        CommandResult::StateError
    }

    /// Resolve `permission` for `user` and report the result
    pub async fn check_permission(
        &self,
        sender: &Sender,
        user: &str,
        permission: &str,
        server: Option<&str>,
    ) -> CommandResult {
        if !self.authorize(sender, Permission::UserCheck) {
            return CommandResult::NoPermission;
        }
        let handle = match self.find_user(sender, user).await {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let query = match server {
            Some(_) => QueryContext::from_option(server),
            None => self.state.local_context(),
        };
        let user = handle.read().await;
        let result = self.state.check(&user, permission, &query).await;

        self.report(
            sender,
            Message::CheckResult {
                user: user.name().to_string(),
                permission: permission.to_string(),
                server: query.server_name().map(str::to_string),
                result,
            },
        );
        CommandResult::Success
    }
}
