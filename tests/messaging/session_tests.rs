//! Session Lifecycle Tests
//!
//! Teardown, heartbeats, idle timeouts and cross-process fan-out.

use std::time::Duration;

use axum::extract::ws::Message;
use pretty_assertions::assert_eq;

use chatapp_server::domain::Topic;

use crate::common::*;

#[tokio::test]
async fn test_client_close_tears_down_both_loops() {
    let app = TestApp::new();
    let bob = app.private_socket(BOB, ALICE);
    let inbox = Topic::private_inbox(BOB);
    app.wait_for_subscribers(&inbox, 1).await;

    let (code, reason) = bob.close().await;

    assert_eq!(code, 1000);
    assert_eq!(reason, "");
    // The send loop is gone, and with it the subscription.
    assert_eq!(app.bus.subscriber_count(&inbox), 0);
}

#[tokio::test]
async fn test_dropped_client_releases_subscription() {
    let app = TestApp::new();
    let inbox = Topic::private_inbox(CAROL);
    let carol = app.notifications_socket(CAROL);
    app.wait_for_subscribers(&inbox, 1).await;

    carol.disconnect().await;

    assert_eq!(app.bus.subscriber_count(&inbox), 0);
}

#[tokio::test]
async fn test_idle_connection_is_closed_after_pings() {
    let app = TestApp::with_timeouts(Duration::from_millis(40), Duration::from_millis(200));
    let mut alice = app.notifications_socket(ALICE);

    let (pings, frame) = alice.count_pings_until_frame().await;

    assert!(pings >= 2, "expected heartbeats before the idle close, got {pings}");
    match frame {
        Some(Message::Close(Some(close))) => {
            assert_eq!(close.code, 1001);
            assert_eq!(close.reason.as_str(), "Idle timeout");
        }
        other => panic!("expected an idle close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_notifications_socket_ignores_inbound_frames() {
    let app = TestApp::new();
    let mut alice = app.notifications_socket(ALICE);
    app.wait_for_subscribers(&Topic::private_inbox(ALICE), 1).await;

    alice.send_json(public_frame("nobody reads this"));
    alice.assert_silent(Duration::from_millis(100)).await;

    assert_eq!(alice.close().await.0, 1000);
}

#[tokio::test]
async fn test_notifications_socket_skips_chat_messages() {
    let app = TestApp::new();
    let mut bob_inbox = app.notifications_socket(BOB);
    app.wait_for_subscribers(&Topic::private_inbox(BOB), 1).await;
    let alice = app.private_socket(ALICE, BOB);
    app.wait_for_subscribers(&Topic::private_inbox(ALICE), 1).await;

    alice.send_json(private_frame(BOB, "one"));
    alice.send_json(private_frame(BOB, "two"));

    // Only notifications, one per message, never the message envelopes.
    for expected in ["one", "two"] {
        let frame = bob_inbox.next_json().await;
        assert_eq!(frame["type"], "notification");
        assert_eq!(frame["message"], expected);
    }
    bob_inbox.assert_silent(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_messages_cross_server_processes_through_the_bus() {
    let server_a = TestApp::new();
    let server_b = server_a.replica();

    let mut bob = server_b.private_socket(BOB, ALICE);
    server_b.wait_for_subscribers(&Topic::private_inbox(BOB), 1).await;
    let alice = server_a.private_socket(ALICE, BOB);
    server_a.wait_for_subscribers(&Topic::private_inbox(ALICE), 1).await;

    alice.send_json(private_frame(BOB, "across the wire"));

    let delivered = bob.next_json().await;
    assert_eq!(delivered["message"], "across the wire");
    assert_eq!(delivered["from"]["id"], ALICE);
}

#[tokio::test]
async fn test_every_process_gets_its_own_copy_of_a_room_message() {
    let server_a = TestApp::new();
    let server_b = server_a.replica();
    let chat_id = server_a.public_chat(ALICE, "multi-node", &[BOB, CAROL]).await;

    let mut bob = server_a.public_socket(BOB, chat_id);
    let mut carol = server_b.public_socket(CAROL, chat_id);
    let alice = server_b.public_socket(ALICE, chat_id);
    server_a.wait_for_subscribers(&Topic::public_chat(chat_id), 3).await;

    alice.send_json(public_frame("hello both"));

    assert_eq!(bob.next_json().await["message"], "hello both");
    assert_eq!(carol.next_json().await["message"], "hello both");
}
