//! Chat Control Plane API Tests

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_create_chat_makes_creator_owner() {
    let app = TestApp::new();

    let (status, chat) = app
        .request(
            Method::POST,
            "/api/chats",
            Some(ALICE),
            Some(json!({"name": "general", "members": [{"id": BOB, "is_admin": true}, {"id": CAROL}]})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(chat["name"], "general");
    assert_eq!(chat["private"], false);
    assert_eq!(chat["members_count"], 3);

    let chat_id = chat["id"].as_i64().unwrap();
    let (status, members) = app.get(&format!("/api/chats/{chat_id}/members"), CAROL).await;
    assert_eq!(status, StatusCode::OK);

    let members = members.as_array().unwrap();
    let owners: Vec<i64> = members
        .iter()
        .filter(|m| m["is_owner"] == true)
        .map(|m| m["user_id"].as_i64().unwrap())
        .collect();
    assert_eq!(owners, vec![ALICE]);
    let bob = members.iter().find(|m| m["user_id"] == BOB).unwrap();
    assert_eq!(bob["is_admin"], true);
}

#[tokio::test]
async fn test_create_chat_rejects_duplicates_and_bad_input() {
    let app = TestApp::new();
    app.public_chat(ALICE, "taken", &[]).await;

    let (status, body) = app
        .request(Method::POST, "/api/chats", Some(BOB), Some(json!({"name": "taken"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Chat with given name already exists.");

    let (status, _) = app
        .request(Method::POST, "/api/chats", Some(BOB), Some(json!({"name": ""})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(Method::POST, "/api/chats", None, Some(json!({"name": "anonymous"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rename_requires_admin() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "old-name", &[BOB]).await;
    let uri = format!("/api/chats/{chat_id}");

    let (status, _) = app
        .request(Method::PUT, &uri, Some(BOB), Some(json!({"name": "hijacked"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, chat) = app
        .request(Method::PUT, &uri, Some(ALICE), Some(json!({"name": "new-name"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chat["name"], "new-name");
}

#[tokio::test]
async fn test_invite_and_enroll() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "invite-only", &[BOB]).await;
    let invite_uri = format!("/api/chats/{chat_id}/invite");
    let members_uri = format!("/api/chats/{chat_id}/members");

    let (status, _) = app.get(&invite_uri, BOB).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, invite) = app.get(&invite_uri, ALICE).await;
    assert_eq!(status, StatusCode::OK);
    let token = invite["token"].as_str().unwrap().to_owned();

    let (status, _) = app
        .request(Method::POST, &members_uri, Some(DAVE), Some(json!({"token": "garbage"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, member) = app
        .request(Method::POST, &members_uri, Some(DAVE), Some(json!({"token": token})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(member["user_id"], DAVE);
    assert_eq!(member["accepted"], true);
    assert_eq!(member["is_admin"], false);

    let (status, _) = app
        .request(Method::POST, &members_uri, Some(DAVE), Some(json!({"token": token})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invite_for_another_chat_is_rejected() {
    let app = TestApp::new();
    let first = app.public_chat(ALICE, "first", &[]).await;
    let second = app.public_chat(ALICE, "second", &[]).await;

    let (_, invite) = app.get(&format!("/api/chats/{first}/invite"), ALICE).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/chats/{second}/members"),
            Some(DAVE),
            Some(json!({"token": invite["token"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_keeps_admin_and_cannot_be_removed() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "owned", &[BOB]).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/chats/{chat_id}/members/{ALICE}"),
            Some(ALICE),
            Some(json!({"is_admin": false})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, bob) = app
        .request(
            Method::PATCH,
            &format!("/api/chats/{chat_id}/members/{BOB}"),
            Some(ALICE),
            Some(json!({"is_admin": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bob["is_admin"], true);

    // Even an admin cannot remove the owner.
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/chats/{chat_id}/members/{ALICE}"), Some(BOB), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_can_leave_but_not_kick() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "door", &[BOB, CAROL]).await;

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/chats/{chat_id}/members/{CAROL}"), Some(BOB), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/chats/{chat_id}/members/{BOB}"), Some(BOB), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/chats/{chat_id}/members"), BOB).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_transfer_ownership_keeps_exactly_one_owner() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "handover", &[BOB]).await;
    let owner_uri = format!("/api/chats/{chat_id}/owner");

    let (status, _) = app
        .request(Method::POST, &owner_uri, Some(BOB), Some(json!({"user_id": BOB})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::POST, &owner_uri, Some(ALICE), Some(json!({"user_id": DAVE})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(Method::POST, &owner_uri, Some(ALICE), Some(json!({"user_id": BOB})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, members) = app.get(&format!("/api/chats/{chat_id}/members"), ALICE).await;
    let owners: Vec<i64> = members
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["is_owner"] == true)
        .map(|m| m["user_id"].as_i64().unwrap())
        .collect();
    assert_eq!(owners, vec![BOB]);
}

#[tokio::test]
async fn test_delete_chat_requires_owner_and_cascades() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "short-lived", &[BOB]).await;
    let uri = format!("/api/chats/{chat_id}");
    app.state
        .messaging
        .store
        .create_message(chat_id, BOB, "last words")
        .await
        .unwrap();

    let (status, _) = app.request(Method::DELETE, &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.request(Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, ALICE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.messaging.store.history(chat_id, None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_pages_newest_first() {
    let app = TestApp::new();
    let chat_id = app.public_chat(ALICE, "archive", &[BOB]).await;
    for i in 1..=5 {
        app.state
            .messaging
            .store
            .create_message(chat_id, ALICE, &format!("m{i}"))
            .await
            .unwrap();
    }
    let uri = format!("/api/chats/{chat_id}/messages");

    let (status, page) = app.get(&format!("{uri}?limit=2"), BOB).await;
    assert_eq!(status, StatusCode::OK);
    let bodies: Vec<&str> = page["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["m5", "m4"]);

    let cursor = page["next_before"].as_i64().unwrap();
    let (_, older) = app.get(&format!("{uri}?limit=10&before={cursor}"), BOB).await;
    assert_eq!(older["messages"].as_array().unwrap().len(), 3);
    assert!(older.get("next_before").is_none());

    let (status, _) = app.get(&format!("{uri}?limit=0"), BOB).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get(&uri, DAVE).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_private_history_requires_an_existing_chat() {
    let app = TestApp::new();

    let (status, _) = app.get(&format!("/api/chats/users/{BOB}/messages"), ALICE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_private_chat_detail_is_hidden_from_outsiders() {
    let app = TestApp::new();
    let chat = app
        .state
        .messaging
        .store
        .find_or_create_private_chat(ALICE, BOB)
        .await
        .unwrap();
    let uri = format!("/api/chats/{}", chat.id);

    let (status, detail) = app.get(&uri, BOB).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["private"], true);
    assert_eq!(detail["members_count"], 2);

    let (status, _) = app.get(&uri, CAROL).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_private_chat_memberships_cannot_be_changed() {
    let app = TestApp::new();
    let chat = app
        .state
        .messaging
        .store
        .find_or_create_private_chat(ALICE, BOB)
        .await
        .unwrap();
    let members_uri = format!("/api/chats/{}/members", chat.id);

    let (status, _) = app
        .request(Method::DELETE, &format!("{members_uri}/{ALICE}"), Some(ALICE), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("{members_uri}/{BOB}"),
            Some(ALICE),
            Some(json!({"is_admin": true})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&members_uri, ALICE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, detail) = app.get(&format!("/api/chats/{}", chat.id), BOB).await;
    assert_eq!(detail["members_count"], 2);
}

#[tokio::test]
async fn test_search_public_chats_by_keyword() {
    let app = TestApp::new();
    app.public_chat(ALICE, "rust-lovers", &[BOB]).await;
    app.public_chat(BOB, "rustaceans", &[]).await;
    app.public_chat(CAROL, "gophers", &[]).await;
    app.state
        .messaging
        .store
        .find_or_create_private_chat(ALICE, BOB)
        .await
        .unwrap();

    let names = |body: &serde_json::Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_owned())
            .collect()
    };

    let (status, all) = app.request(Method::GET, "/api/chats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&all), vec!["gophers", "rust-lovers", "rustaceans"]);

    let (_, matching) = app.request(Method::GET, "/api/chats?keyword=RUST", None, None).await;
    assert_eq!(names(&matching), vec!["rust-lovers", "rustaceans"]);
    assert_eq!(matching[0]["members_count"], 2);

    let (_, page) = app
        .request(Method::GET, "/api/chats?limit=1&offset=1", None, None)
        .await;
    assert_eq!(names(&page), vec!["rust-lovers"]);

    let (status, _) = app.request(Method::GET, "/api/chats?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_my_chats_are_sorted_by_latest_message() {
    let app = TestApp::new();
    let store = &app.state.messaging.store;
    let quiet = app.public_chat(ALICE, "quiet", &[]).await;
    let busy = app.public_chat(ALICE, "busy", &[BOB]).await;
    let private = store.find_or_create_private_chat(ALICE, BOB).await.unwrap().id;

    store.create_message(busy, BOB, "first").await.unwrap();
    store.create_message(private, BOB, "second").await.unwrap();

    let (status, chats) = app.get("/api/users/me/chats", ALICE).await;
    assert_eq!(status, StatusCode::OK);
    let chats = chats.as_array().unwrap();
    let ids: Vec<i64> = chats.iter().map(|c| c["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![private, busy, quiet]);
    assert_eq!(chats[0]["last_message"]["message"], "second");
    assert_eq!(chats[0]["last_message"]["sender_id"], BOB);
    assert!(chats[2]["last_message"].is_null());

    let (_, filtered) = app.get("/api/users/me/chats?keyword=bus", ALICE).await;
    let filtered = filtered.as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["id"], busy);

    let (_, none) = app.get("/api/users/me/chats", CAROL).await;
    assert!(none.as_array().unwrap().is_empty());

    let (status, _) = app.request(Method::GET, "/api/users/me/chats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
