//! Public Chat Messaging Tests

use std::time::Duration;

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;

use chatapp_server::domain::Topic;

use crate::common::*;

#[tokio::test]
async fn test_message_fans_out_to_members_without_echo() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "book-club", &[BOB, CAROL]).await;

    let mut alice = app.public_socket(ALICE, chat_id);
    let mut bob = app.public_socket(BOB, chat_id);
    let mut carol = app.public_socket(CAROL, chat_id);
    app.wait_for_subscribers(&Topic::public_chat(chat_id), 3).await;

    alice.send_json(public_frame("welcome"));

    for member in [&mut bob, &mut carol] {
        let delivered = member.next_json().await;
        assert_eq!(delivered["type"], "message");
        assert_eq!(delivered["message"], "welcome");
        assert_eq!(delivered["chat_id"], chat_id);
        assert_eq!(delivered["from"]["id"], ALICE);
        assert!(delivered.get("to").is_none());
    }
    alice.assert_silent(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_non_member_is_rejected_as_if_chat_did_not_exist() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "private-club", &[BOB]).await;

    let mut dave = app.public_socket(DAVE, chat_id);
    assert_eq!(dave.expect_close().await, (1008, "Chat does not exist".to_owned()));

    let mut lost = app.public_socket(DAVE, 987_654);
    assert_eq!(lost.expect_close().await, (1008, "Chat does not exist".to_owned()));

    assert_eq!(app.bus.subscriber_count(&Topic::public_chat(chat_id)), 0);
}

#[tokio::test]
async fn test_removed_member_loses_write_access_mid_connection() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "moderated", &[BOB]).await;

    let mut bob = app.public_socket(BOB, chat_id);
    app.wait_for_subscribers(&Topic::public_chat(chat_id), 1).await;

    app.state
        .chat_service
        .remove_member(ALICE, chat_id, BOB)
        .await
        .unwrap();

    bob.send_json(public_frame("still here?"));
    assert_eq!(bob.expect_close().await, (1008, "Chat does not exist".to_owned()));

    let (_, page) = app.get(&format!("/api/chats/{chat_id}/messages"), ALICE).await;
    assert_eq!(page["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_removed_member_stops_receiving_room_messages() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "need-to-know", &[BOB]).await;
    let room = Topic::public_chat(chat_id);

    let alice = app.public_socket(ALICE, chat_id);
    let mut bob = app.public_socket(BOB, chat_id);
    app.wait_for_subscribers(&room, 2).await;

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/chats/{chat_id}/members/{BOB}"),
            Some(ALICE),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    alice.send_json(public_frame("secret after removal"));

    // The close arrives before anything sent after the removal.
    assert_eq!(bob.expect_close().await, (1008, "Chat does not exist".to_owned()));
    bob.finished().await;
    assert_eq!(app.bus.subscriber_count(&room), 1);
}

#[tokio::test]
async fn test_deleting_the_chat_closes_every_member_socket() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "ephemeral", &[BOB, CAROL]).await;
    let room = Topic::public_chat(chat_id);

    let mut bob = app.public_socket(BOB, chat_id);
    let mut carol = app.public_socket(CAROL, chat_id);
    app.wait_for_subscribers(&room, 2).await;

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/chats/{chat_id}"), Some(ALICE), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for member in [&mut bob, &mut carol] {
        assert_eq!(member.expect_close().await, (1008, "Chat does not exist".to_owned()));
        member.finished().await;
    }
    assert_eq!(app.bus.subscriber_count(&room), 0);
}

#[tokio::test]
async fn test_public_message_notifies_other_members() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "announcements", &[BOB, CAROL]).await;

    let mut alice_inbox = app.notifications_socket(ALICE);
    let mut carol_inbox = app.notifications_socket(CAROL);
    app.wait_for_subscribers(&Topic::private_inbox(ALICE), 1).await;
    app.wait_for_subscribers(&Topic::private_inbox(CAROL), 1).await;

    let alice = app.public_socket(ALICE, chat_id);
    app.wait_for_subscribers(&Topic::public_chat(chat_id), 1).await;
    alice.send_json(public_frame("release tonight"));

    let notification = carol_inbox.next_json().await;
    assert_eq!(notification["type"], "notification");
    assert_eq!(notification["chat_id"], chat_id);
    assert_eq!(notification["message"], "release tonight");
    assert_eq!(notification["from"]["id"], ALICE);

    alice_inbox.assert_silent(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_blank_message_is_a_protocol_violation() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "quiet", &[]).await;

    let mut alice = app.public_socket(ALICE, chat_id);
    app.wait_for_subscribers(&Topic::public_chat(chat_id), 1).await;
    alice.send_json(public_frame("   "));

    let error = alice.next_json().await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["detail"], "Message must not be empty");
    assert_eq!(alice.expect_close().await, (1008, "Malformed frame".to_owned()));
}

#[tokio::test]
async fn test_members_in_two_chats_only_hear_their_room() {
    let app = TestApp::new();
    let first = app.public_chat(ALICE, "first-room", &[BOB]).await;
    let second = app.public_chat(CAROL, "second-room", &[BOB]).await;

    let mut bob_first = app.public_socket(BOB, first);
    let mut bob_second = app.public_socket(BOB, second);
    let carol = app.public_socket(CAROL, second);
    app.wait_for_subscribers(&Topic::public_chat(first), 1).await;
    app.wait_for_subscribers(&Topic::public_chat(second), 2).await;

    carol.send_json(public_frame("second only"));

    assert_eq!(bob_second.next_json().await["message"], "second only");
    bob_first.assert_silent(Duration::from_millis(100)).await;
}
