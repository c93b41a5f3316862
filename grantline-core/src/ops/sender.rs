//! Who invokes an operation and whether they may

use std::fmt;
use uuid::Uuid;

/// The subject issuing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    name: String,
    uuid: Option<Uuid>,
}

impl Sender {
    pub const CONSOLE_NAME: &'static str = "Console";

    pub fn console() -> Self {
        Self {
            name: Self::CONSOLE_NAME.to_string(),
            uuid: None,
        }
    }

    pub fn user(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: Some(uuid),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn is_console(&self) -> bool {
        self.uuid.is_none()
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Administrative permissions gating each operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    UserAddGroup,
    UserRemoveGroup,
    UserSetPermission,
    UserUnsetPermission,
    UserSetPrimaryGroup,
    UserPromote,
    UserDemote,
    UserCheck,
    GroupSetPermission,
    GroupUnsetPermission,
    CreateGroup,
    DeleteGroup,
    CreateTrack,
    DeleteTrack,
    TrackAppend,
    TrackInsert,
    TrackRemove,
}

impl Permission {
    /// Permission node an authorizer may look up
    pub fn node(&self) -> &'static str {
        match self {
            Permission::UserAddGroup => "grantline.user.addgroup",
            Permission::UserRemoveGroup => "grantline.user.removegroup",
            Permission::UserSetPermission => "grantline.user.setpermission",
            Permission::UserUnsetPermission => "grantline.user.unsetpermission",
            Permission::UserSetPrimaryGroup => "grantline.user.setprimarygroup",
            Permission::UserPromote => "grantline.user.promote",
            Permission::UserDemote => "grantline.user.demote",
            Permission::UserCheck => "grantline.user.check",
            Permission::GroupSetPermission => "grantline.group.setpermission",
            Permission::GroupUnsetPermission => "grantline.group.unsetpermission",
            Permission::CreateGroup => "grantline.creategroup",
            Permission::DeleteGroup => "grantline.deletegroup",
            Permission::CreateTrack => "grantline.createtrack",
            Permission::DeleteTrack => "grantline.deletetrack",
            Permission::TrackAppend => "grantline.track.append",
            Permission::TrackInsert => "grantline.track.insert",
            Permission::TrackRemove => "grantline.track.remove",
        }
    }
}

/// Authorization gate consulted before any operation runs
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, sender: &Sender, permission: Permission) -> bool;
}

/// Lets everyone do everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _sender: &Sender, _permission: Permission) -> bool {
        true
    }
}

/// Only the console is authorized
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOnly;

impl Authorizer for ConsoleOnly {
    fn is_authorized(&self, sender: &Sender, _permission: Permission) -> bool {
        sender.is_console()
    }
}

impl<F> Authorizer for F
where
    F: Fn(&Sender, Permission) -> bool + Send + Sync,
{
    fn is_authorized(&self, sender: &Sender, permission: Permission) -> bool {
        self(sender, permission)
    }
}
