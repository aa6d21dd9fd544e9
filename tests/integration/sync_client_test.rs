//! SyncClient against a real server

use std::time::Duration;

use teamsync::client::{SyncApi, SyncClient, TransportEvent, View};
use teamsync::shared::{RoomRef, ServerFrame};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use crate::common::*;

/// Feed transport events into `client` until `done` holds or `wait` passes
async fn pump_for<F>(
    client: &mut SyncClient,
    events: &mut mpsc::Receiver<TransportEvent>,
    wait: Duration,
    done: F,
) -> bool
where
    F: Fn(&SyncClient, &TransportEvent) -> bool,
{
    let deadline = Instant::now() + wait;
    while let Ok(Some(event)) = timeout(deadline.saturating_duration_since(Instant::now()), events.recv()).await {
        client.handle_transport_event(event.clone()).await;
        if done(client, &event) {
            return true;
        }
    }
    false
}

async fn pump_until<F>(client: &mut SyncClient, events: &mut mpsc::Receiver<TransportEvent>, done: F) -> bool
where
    F: Fn(&SyncClient, &TransportEvent) -> bool,
{
    pump_for(client, events, Duration::from_secs(5), done).await
}

async fn connect(server: &TestServer, user: &TestUser) -> (SyncClient, mpsc::Receiver<TransportEvent>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = server.client_config().with_token(user.token.clone());
    config.app.store_path = Some(dir.path().join("client.db"));
    let (mut client, mut events) = SyncClient::connect(config).await.unwrap();

    let me = RoomRef::user(user.user.id);
    let joined = pump_until(&mut client, &mut events, |_, event| {
        matches!(event, TransportEvent::Frame(ServerFrame::Joined { room }) if *room == me)
    })
    .await;
    assert!(joined, "user room was never joined");
    (client, events, dir)
}

#[tokio::test]
async fn test_unread_badge_and_history() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let (mut client, mut events, _dir) = connect(&server, &bob).await;
    assert_eq!(client.engine().view(), View::Dashboard);

    let conversation = alice.api.start_conversation(&bob.user.email).await.unwrap();
    alice.api.send_message(conversation.id, "hello").await.unwrap();

    assert!(pump_until(&mut client, &mut events, |c, _| c.unread().total() == 1).await);
    // Let any duplicate delivery arrive before checking the count again
    pump_for(&mut client, &mut events, QUIET_WAIT, |_, _| false).await;
    assert_eq!(client.unread().total(), 1);
    assert!(client.notices().contains("New message from Alice"));

    client.open_conversation(conversation.id).await.unwrap();
    assert_eq!(client.unread().count(conversation.id), 0);
    assert_eq!(client.engine().view(), View::Inbox);
    let contents: Vec<&str> = client
        .engine()
        .open_messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["hello"]);
}

#[tokio::test]
async fn test_team_appears_and_disappears_live() {
    let server = TestServer::spawn().await;
    let alice = server.register("Alice").await;
    let bob = server.register("Bob").await;
    let (mut client, mut events, _dir) = connect(&server, &bob).await;

    let team = alice.api.create_team("Foo").await.unwrap();
    alice.api.add_member(team.id, &bob.user.email).await.unwrap();
    assert!(pump_until(&mut client, &mut events, |c, _| c.engine().teams().contains(&team.id)).await);
    assert_eq!(client.engine().teams().get(&team.id).map(|t| t.name.as_str()), Some("Foo"));

    // The engine asked to join the team room; wait for the ack before deleting
    let room = RoomRef::team(team.id);
    assert!(
        pump_until(&mut client, &mut events, |_, event| {
            matches!(event, TransportEvent::Frame(ServerFrame::Joined { room: r }) if *r == room)
        })
        .await
    );

    alice.api.delete_team(team.id).await.unwrap();
    assert!(pump_until(&mut client, &mut events, |c, _| c.engine().teams().is_empty()).await);
}
