/*
    operations.rs - Command verbs end to end on a single node

    Every verb runs against an in-memory engine; outcomes are read back from
    a collecting sink and from the store.
*/

use grantline_core::model::{NodeKey, PermissionHolder};
use grantline_core::ops::{CommandResult, ConsoleOnly, Message, Sender};
use grantline_core::propagation::LocalBus;
use grantline_core::store::{LoadOutcome, MemoryBackend};
use grantline_core::test_utils::TestNode;
use grantline_core::Tristate;
use std::sync::Arc;
use uuid::Uuid;

async fn node_with_user(name: &str) -> (TestNode, Uuid) {
    let node = TestNode::standalone().await;
    let uuid = Uuid::new_v4();
    assert!(node.engine.login(uuid, name).await.is_found());
    (node, uuid)
}

#[tokio::test]
async fn test_remove_unscoped_primary_group_is_rejected() {
    let (node, uuid) = node_with_user("Luck").await;
    let console = node.console();

    for server in [None, Some("global")] {
        let result = node
            .ops
            .user_remove_group(&console, "Luck", "default", server)
            .await;
        assert_eq!(result, CommandResult::StateError);
        assert_eq!(node.sink.last(), Some(Message::UserRemoveGroupErrorPrimary));
    }

    let handle = node.engine.state().users().get(&uuid).await.unwrap();
    assert!(handle.read().await.is_member_of("default", None));
}

#[tokio::test]
async fn test_scoped_removal_of_primary_group() {
    let (node, uuid) = node_with_user("Luck").await;
    let console = node.console();

    assert_eq!(
        node.ops
            .user_add_group(&console, "Luck", "default", Some("factions"))
            .await,
        CommandResult::Success
    );

    // the unscoped membership still stands, so the scoped node may go
    let result = node
        .ops
        .user_remove_group(&console, "Luck", "default", Some("factions"))
        .await;
    assert_eq!(result, CommandResult::Success);
    assert_eq!(
        node.sink.last(),
        Some(Message::UserRemoveGroupServerSuccess {
            user: "Luck".to_string(),
            group: "default".to_string(),
            server: "factions".to_string(),
        })
    );

    let handle = node.engine.state().users().get(&uuid).await.unwrap();
    let user = handle.read().await;
    assert!(!user.is_member_of("default", Some("factions")));
    assert!(user.is_member_of("default", None));
}

#[tokio::test]
async fn test_remove_group_after_primary_changes() {
    let (node, _) = node_with_user("Luck").await;
    let console = node.console();

    node.ops.create_group(&console, "mod").await;
    node.ops.user_add_group(&console, "Luck", "mod", None).await;
    assert_eq!(
        node.ops.user_set_primary_group(&console, "Luck", "mod").await,
        CommandResult::Success
    );

    let result = node
        .ops
        .user_remove_group(&console, "Luck", "default", None)
        .await;
    assert_eq!(result, CommandResult::Success);
    assert_eq!(node.sink.last().unwrap().kind(), "USER_REMOVEGROUP_SUCCESS");

    let result = node
        .ops
        .user_remove_group(&console, "Luck", "default", None)
        .await;
    assert_eq!(result, CommandResult::StateError);
    assert_eq!(node.sink.last().unwrap().kind(), "USER_NOT_MEMBER_OF");
}

#[tokio::test]
async fn test_primary_group_membership_cannot_be_negated() {
    let (node, uuid) = node_with_user("Luck").await;
    let console = node.console();

    let result = node
        .ops
        .user_set_permission(&console, "Luck", "group.default", false, None)
        .await;
    assert_eq!(result, CommandResult::StateError);
    assert_eq!(node.sink.last(), Some(Message::UserRemoveGroupErrorPrimary));

    let handle = node.engine.state().users().get(&uuid).await.unwrap();
    let user = handle.read().await;
    assert!(user.is_member_of("default", None));
    assert!(!user.is_dirty());
}

#[tokio::test]
async fn test_group_node_names_are_case_insensitive() {
    let (node, uuid) = node_with_user("Luck").await;
    let console = node.console();
    node.ops.create_group(&console, "mod").await;
    node.ops
        .group_set_permission(&console, "mod", "kick", true, None)
        .await;

    assert_eq!(
        node.ops
            .user_set_permission(&console, "Luck", "group.Mod", true, None)
            .await,
        CommandResult::Success
    );
    assert_eq!(node.engine.check(uuid, "kick").await, Tristate::True);

    assert_eq!(
        node.ops
            .user_unset_permission(&console, "Luck", "GROUP.mod", None)
            .await,
        CommandResult::StateError
    );
    assert_eq!(
        node.ops
            .user_unset_permission(&console, "Luck", "group.MOD", None)
            .await,
        CommandResult::Success
    );
    assert_eq!(node.engine.check(uuid, "kick").await, Tristate::Undefined);
}

#[tokio::test]
async fn test_failed_save_leaves_no_change_behind() {
    let backend = MemoryBackend::new();
    let node = TestNode::start(&backend, &LocalBus::new(8)).await;
    let console = node.console();
    let uuid = Uuid::new_v4();
    assert!(node.engine.login(uuid, "Luck").await.is_found());
    node.ops.create_group(&console, "mod").await;

    backend.set_failing(true);
    assert_eq!(
        node.ops.user_add_group(&console, "Luck", "mod", None).await,
        CommandResult::SaveError
    );
    assert_eq!(
        node.sink.last(),
        Some(Message::UserSaveError {
            user: "Luck".to_string()
        })
    );
    {
        let handle = node.engine.state().users().get(&uuid).await.unwrap();
        let user = handle.read().await;
        assert!(!user.is_member_of("mod", None));
        assert!(!user.is_dirty());
    }
    assert_eq!(
        node.ops
            .group_set_permission(&console, "mod", "kick", true, None)
            .await,
        CommandResult::SaveError
    );

    backend.set_failing(false);
    assert_eq!(
        node.ops.user_add_group(&console, "Luck", "mod", None).await,
        CommandResult::Success
    );
    assert_eq!(
        node.ops
            .group_set_permission(&console, "mod", "kick", true, None)
            .await,
        CommandResult::Success
    );
    assert!(!node.engine.is_user_dirty(uuid).await);

    let stored = match node.engine.state().datastore().load_user(uuid).await {
        LoadOutcome::Found(user) => user,
        _ => panic!("user was not stored"),
    };
    assert!(stored.is_member_of("mod", None));
    assert_eq!(node.engine.check(uuid, "kick").await, Tristate::True);
}

#[tokio::test]
async fn test_primary_group_requires_membership() {
    let (node, _) = node_with_user("Luck").await;
    let console = node.console();
    node.ops.create_group(&console, "mod").await;

    let result = node.ops.user_set_primary_group(&console, "Luck", "mod").await;
    assert_eq!(result, CommandResult::StateError);
    assert_eq!(node.sink.last().unwrap().kind(), "PRIMARY_GROUP_NOT_MEMBER");
}

#[tokio::test]
async fn test_staff_ladder() {
    let (node, uuid) = node_with_user("Luck").await;
    node.staff_ladder().await;
    let console = node.console();

    assert_eq!(
        node.ops.demote(&console, "Luck", "staff", None).await,
        CommandResult::StateError
    );
    assert_eq!(node.sink.last().unwrap().kind(), "USER_NOT_ON_TRACK");

    for expected in ["helper", "mod", "admin"] {
        assert_eq!(
            node.ops.promote(&console, "Luck", "staff", None).await,
            CommandResult::Success
        );
        match node.sink.last() {
            Some(Message::PromoteSuccess { to, .. }) => assert_eq!(to, expected),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(
        node.ops.promote(&console, "Luck", "staff", None).await,
        CommandResult::StateError
    );
    assert_eq!(node.sink.last().unwrap().kind(), "ALREADY_AT_TOP_OF_TRACK");

    for _ in 0..2 {
        node.ops.demote(&console, "Luck", "staff", None).await;
    }
    assert_eq!(
        node.ops.demote(&console, "Luck", "staff", None).await,
        CommandResult::Success
    );
    assert_eq!(
        node.sink.last(),
        Some(Message::DemoteSuccess {
            user: "Luck".to_string(),
            track: "staff".to_string(),
            from: "helper".to_string(),
            to: None,
        })
    );

    let handle = node.engine.state().users().get(&uuid).await.unwrap();
    let user = handle.read().await;
    assert_eq!(user.groups(), vec!["default".to_string()]);
    assert!(!node.engine.is_user_dirty(uuid).await);
}

#[tokio::test]
async fn test_promote_into_missing_group() {
    let (node, _) = node_with_user("Luck").await;
    node.staff_ladder().await;
    let console = node.console();

    node.ops.delete_group(&console, "helper").await;
    // the track still names the deleted group
    let result = node.ops.promote(&console, "Luck", "staff", None).await;
    assert_eq!(result, CommandResult::InvalidArgs);
    assert_eq!(node.sink.last().unwrap().kind(), "GROUP_DOES_NOT_EXIST");
}

#[tokio::test]
async fn test_delete_track_leaves_groups_and_users() {
    let (node, uuid) = node_with_user("Luck").await;
    node.staff_ladder().await;
    let console = node.console();
    node.ops.promote(&console, "Luck", "staff", None).await;

    assert_eq!(
        node.ops.delete_track(&console, "staff").await,
        CommandResult::Success
    );
    assert_eq!(
        node.sink.last(),
        Some(Message::DeleteSuccess {
            name: "staff".to_string()
        })
    );
    assert!(!node.engine.state().tracks().contains(&"staff".to_string()).await);
    assert!(matches!(
        node.engine.state().datastore().load_track("staff").await,
        LoadOutcome::NotFound
    ));

    for group in ["helper", "mod", "admin"] {
        assert!(node.engine.state().groups().contains(&group.to_string()).await);
    }
    let handle = node.engine.state().users().get(&uuid).await.unwrap();
    assert!(handle.read().await.is_member_of("helper", None));

    assert_eq!(
        node.ops.delete_track(&console, "staff").await,
        CommandResult::InvalidArgs
    );
    assert_eq!(node.sink.last().unwrap().kind(), "TRACK_DOES_NOT_EXIST");
}

#[tokio::test]
async fn test_delete_group_strips_memberships() {
    let (node, uuid) = node_with_user("Luck").await;
    let console = node.console();
    node.ops.create_group(&console, "mod").await;
    node.ops.create_group(&console, "admin").await;
    node.ops
        .group_set_permission(&console, "admin", "group.mod", true, None)
        .await;
    node.ops.user_add_group(&console, "Luck", "mod", None).await;
    node.ops.user_set_primary_group(&console, "Luck", "mod").await;
    node.ops
        .user_remove_group(&console, "Luck", "default", None)
        .await;

    assert_eq!(
        node.ops.delete_group(&console, "mod").await,
        CommandResult::Success
    );

    let handle = node.engine.state().users().get(&uuid).await.unwrap();
    {
        let user = handle.read().await;
        assert_eq!(user.primary_group(), "default");
        assert!(user.is_member_of("default", None));
        assert!(!user.is_member_of("mod", None));
    }
    let admin = node.engine.state().groups().get(&"admin".to_string()).await.unwrap();
    assert!(!admin.read().await.has_node(&NodeKey::group("mod", None)));

    let stored = node.engine.state().datastore().load_user(uuid).await;
    assert_eq!(stored.found().unwrap().primary_group(), "default");
}

#[tokio::test]
async fn test_default_group_cannot_be_deleted() {
    let node = TestNode::standalone().await;
    let console = node.console();
    assert_eq!(
        node.ops.delete_group(&console, "default").await,
        CommandResult::StateError
    );
    assert_eq!(node.sink.last().unwrap().kind(), "DELETE_GROUP_ERROR_DEFAULT");
}

#[tokio::test]
async fn test_create_validates_and_detects_duplicates() {
    let node = TestNode::standalone().await;
    let console = node.console();

    assert_eq!(
        node.ops.create_group(&console, "no spaces").await,
        CommandResult::InvalidArgs
    );
    assert_eq!(node.sink.last().unwrap().kind(), "INVALID_NAME");

    assert_eq!(node.ops.create_group(&console, "Mod").await, CommandResult::Success);
    assert_eq!(
        node.ops.create_group(&console, "mod").await,
        CommandResult::StateError
    );
    assert_eq!(node.sink.last().unwrap().kind(), "ALREADY_EXISTS");

    assert_eq!(node.ops.create_track(&console, "staff").await, CommandResult::Success);
    assert_eq!(
        node.ops.create_track(&console, "staff").await,
        CommandResult::StateError
    );
}

#[tokio::test]
async fn test_track_editing() {
    let node = TestNode::standalone().await;
    node.staff_ladder().await;
    let console = node.console();

    assert_eq!(
        node.ops.track_append(&console, "staff", "mod").await,
        CommandResult::StateError
    );
    assert_eq!(
        node.sink.last(),
        Some(Message::TrackAlreadyContains {
            track: "staff".to_string(),
            group: "mod".to_string(),
        })
    );

    assert_eq!(
        node.ops.track_append(&console, "staff", "ghost").await,
        CommandResult::InvalidArgs
    );
    assert_eq!(node.sink.last().unwrap().kind(), "GROUP_DOES_NOT_EXIST");

    node.ops.create_group(&console, "trainee").await;
    assert_eq!(
        node.ops.track_insert(&console, "staff", "trainee", 1).await,
        CommandResult::Success
    );
    assert_eq!(
        node.ops.track_remove(&console, "staff", "mod").await,
        CommandResult::Success
    );
    assert_eq!(
        node.ops.track_remove(&console, "staff", "mod").await,
        CommandResult::StateError
    );

    let track = node.engine.state().tracks().get(&"staff".to_string()).await.unwrap();
    assert_eq!(track.read().await.groups(), ["trainee", "helper", "admin"]);
}

#[tokio::test]
async fn test_permissions_and_checks() {
    let (node, uuid) = node_with_user("Luck").await;
    let console = node.console();

    assert_eq!(
        node.ops
            .group_set_permission(&console, "default", "chat.*", true, None)
            .await,
        CommandResult::Success
    );
    assert_eq!(
        node.ops
            .user_set_permission(&console, "Luck", "chat.color", false, None)
            .await,
        CommandResult::Success
    );
    assert_eq!(
        node.ops
            .user_set_permission(&console, "Luck", "chat.color", false, None)
            .await,
        CommandResult::StateError
    );
    assert_eq!(node.sink.last().unwrap().kind(), "ALREADY_HAS_PERMISSION");

    assert_eq!(node.engine.check(uuid, "chat.send").await, Tristate::True);
    assert_eq!(node.engine.check(uuid, "chat.color").await, Tristate::False);
    assert_eq!(node.engine.check(uuid, "build").await, Tristate::Undefined);

    node.ops
        .user_unset_permission(&console, "Luck", "chat.color", None)
        .await;
    assert_eq!(node.engine.check(uuid, "chat.color").await, Tristate::True);

    node.ops
        .check_permission(&console, "Luck", "chat.send", Some("factions"))
        .await;
    assert_eq!(
        node.sink.last(),
        Some(Message::CheckResult {
            user: "Luck".to_string(),
            permission: "chat.send".to_string(),
            server: Some("factions".to_string()),
            result: Tristate::True,
        })
    );
    assert!(node
        .ops
        .tab_complete_permissions("chat.")
        .contains(&"chat.send".to_string()));
}

#[tokio::test]
async fn test_unauthorized_sender_is_refused() {
    let node = TestNode::standalone().await;
    let ops = node
        .engine
        .operations(Arc::new(ConsoleOnly), node.sink.clone());
    let player = Sender::user(Uuid::new_v4(), "Player");

    assert_eq!(
        ops.create_group(&player, "mod").await,
        CommandResult::NoPermission
    );
    assert_eq!(node.sink.last(), Some(Message::NoPermission));
    assert!(!node.engine.state().groups().contains(&"mod".to_string()).await);
}

#[tokio::test]
async fn test_tab_completion() {
    let node = TestNode::standalone().await;
    node.staff_ladder().await;

    let groups = node.ops.tab_complete_groups("").await;
    assert_eq!(groups.len(), 4);
    assert_eq!(node.ops.tab_complete_groups("a").await, vec!["admin".to_string()]);
    assert_eq!(node.ops.tab_complete_tracks("ST").await, vec!["staff".to_string()]);
}
