//! Event channel integration tests

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use teamsync::client::{ClientError, SyncApi};
use teamsync::shared::{RoomRef, ServerEvent, ServerFrame};
use tokio_tungstenite::tungstenite;

use crate::common::*;

#[tokio::test]
async fn test_added_member_sees_team_without_refresh() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;

    let mut bob_socket = TestSocket::connect(&server.ws_url, &bob.token).await;
    assert_eq!(
        bob_socket.join(RoomRef::user(bob.user.id)).await,
        ServerFrame::Joined { room: RoomRef::user(bob.user.id) }
    );

    let team = alice.api.create_team("Foo").await.unwrap();
    alice.api.add_member(team.id, &bob.user.email).await.unwrap();

    let event = bob_socket.next_event().await.expect("member_added event");
    assert_matches!(event, ServerEvent::MemberAdded { team: ref t, member } => {
        assert_eq!(t.name, "Foo");
        assert_eq!(member, bob.user.id);
        assert!(t.has_member(bob.user.id));
    });

    // Membership now allows the team room
    assert_eq!(
        bob_socket.join(RoomRef::team(team.id)).await,
        ServerFrame::Joined { room: RoomRef::team(team.id) }
    );
}

#[tokio::test]
async fn test_denied_join_receives_no_events() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let mallory = server.register("Mallory").await;
    let team = alice.api.create_team("Foo").await.unwrap();

    let mut socket = TestSocket::connect(&server.ws_url, &mallory.token).await;
    assert_eq!(
        socket.join(RoomRef::team(team.id)).await,
        ServerFrame::Denied { room: RoomRef::team(team.id) }
    );
    assert_eq!(
        socket.join(RoomRef::user(alice.user.id)).await,
        ServerFrame::Denied { room: RoomRef::user(alice.user.id) }
    );

    alice.api.rename_team(team.id, "Bar").await.unwrap();
    assert!(socket.next_event_within(QUIET_WAIT).await.is_none());
}

#[tokio::test]
async fn test_message_delivered_once_to_overlapping_rooms() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let conversation = alice.api.start_conversation(&bob.user.email).await.unwrap();

    let mut socket = TestSocket::connect(&server.ws_url, &bob.token).await;
    socket.join(RoomRef::user(bob.user.id)).await;
    assert_eq!(
        socket.join(RoomRef::conversation(conversation.id)).await,
        ServerFrame::Joined { room: RoomRef::conversation(conversation.id) }
    );

    let sent = alice.api.send_message(conversation.id, "hello").await.unwrap();

    let event = socket.next_event().await.expect("message_sent event");
    assert_matches!(event, ServerEvent::MessageSent { message, conversation: c } => {
        assert_eq!(message.id, sent.id);
        assert_eq!(c.last_message.map(|m| m.id), Some(sent.id));
    });
    assert!(socket.next_event_within(QUIET_WAIT).await.is_none());
}

#[tokio::test]
async fn test_message_reaches_personal_room_without_conversation_room() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let conversation = alice.api.start_conversation(&bob.user.email).await.unwrap();

    let mut socket = TestSocket::connect(&server.ws_url, &bob.token).await;
    socket.join(RoomRef::user(bob.user.id)).await;
    alice.api.send_message(conversation.id, "ping").await.unwrap();

    assert_matches!(
        socket.next_event().await,
        Some(ServerEvent::MessageSent { message, .. }) if message.content == "ping"
    );
}

#[tokio::test]
async fn test_handshake_without_valid_token_is_rejected() {
    let server = TestServer::spawn().await;

    for url in [server.ws_url.clone(), format!("{}?token=garbage", server.ws_url)] {
        match tokio_tungstenite::connect_async(url).await {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status().as_u16(), 401),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("handshake should have been rejected"),
        }
    }
}

#[tokio::test]
async fn test_team_delete_notifies_and_closes_rooms() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let team = alice.api.create_team("Foo").await.unwrap();
    alice.api.add_member(team.id, &bob.user.email).await.unwrap();

    let mut socket = TestSocket::connect(&server.ws_url, &bob.token).await;
    socket.join(RoomRef::team(team.id)).await;

    alice.api.delete_team(team.id).await.unwrap();
    assert_eq!(
        socket.next_event().await,
        Some(ServerEvent::TeamDeleted { team_id: team.id })
    );
    assert!(socket.expect_left(RoomRef::team(team.id)).await);

    // The team is gone, so the room cannot be joined again
    assert_eq!(
        socket.join(RoomRef::team(team.id)).await,
        ServerFrame::Denied { room: RoomRef::team(team.id) }
    );
}

#[tokio::test]
async fn test_removed_member_is_evicted() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let team = alice.api.create_team("Foo").await.unwrap();
    alice.api.add_member(team.id, &bob.user.email).await.unwrap();

    let mut socket = TestSocket::connect(&server.ws_url, &bob.token).await;
    socket.join(RoomRef::user(bob.user.id)).await;
    socket.join(RoomRef::team(team.id)).await;

    alice.api.remove_member(team.id, bob.user.id).await.unwrap();
    assert_matches!(
        socket.next_event().await,
        Some(ServerEvent::MemberRemoved { member, .. }) if member == bob.user.id
    );
    assert!(socket.expect_left(RoomRef::team(team.id)).await);

    alice.api.rename_team(team.id, "Bar").await.unwrap();
    assert!(socket.next_event_within(QUIET_WAIT).await.is_none());
}

#[tokio::test]
async fn test_only_creator_may_delete_team() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let team = alice.api.create_team("Foo").await.unwrap();
    alice.api.add_member(team.id, &bob.user.email).await.unwrap();

    let result = bob.api.delete_team(team.id).await;
    assert_matches!(result, Err(ClientError::AuthorizationDenied { .. }));
    assert_eq!(alice.api.list_teams().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let result = alice.api.list_projects(teamsync::shared::TeamId::new()).await;
    assert_matches!(result, Err(ClientError::NotFound { .. }));
}
