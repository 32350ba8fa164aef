//! Chat Handlers
//!
//! Control plane of chats and memberships. Handlers parse and validate the
//! request, then delegate to [`ChatService`](crate::application::services::ChatService).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{
    ChatListQuery, ChatResponse, CreateChatRequest, EnrollRequest, HistoryQuery, InviteResponse,
    MemberResponse, MessagePage, TransferOwnershipRequest, UpdateChatRequest, UpdateMemberRequest,
    UserChatResponse,
};
use crate::presentation::http::extractors::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validated;
use crate::startup::AppState;

/// Create a public chat owned by the caller
pub async fn create_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let body = validated(body)?;
    let chat = state.chat_service.create_public_chat(auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// Search public chats by name. Open to anonymous callers.
pub async fn search_chats(
    State(state): State<AppState>,
    Query(query): Query<ChatListQuery>,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    let query = validated(query)?;
    let chats = state.chat_service.search_public_chats(&query).await?;
    Ok(Json(chats))
}

/// The caller's chats with their latest message
pub async fn my_chats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ChatListQuery>,
) -> Result<Json<Vec<UserChatResponse>>, AppError> {
    let query = validated(query)?;
    let chats = state.chat_service.list_user_chats(auth.user_id, &query).await?;
    Ok(Json(chats))
}

/// Get chat by ID
pub async fn get_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<ChatResponse>, AppError> {
    let chat = state.chat_service.get_chat(auth.user_id, chat_id).await?;
    Ok(Json(chat))
}

/// Rename chat
pub async fn update_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
    Json(body): Json<UpdateChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let body = validated(body)?;
    let chat = state
        .chat_service
        .rename_chat(auth.user_id, chat_id, &body.name)
        .await?;
    Ok(Json(chat))
}

/// Delete chat
pub async fn delete_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.chat_service.delete_chat(auth.user_id, chat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue an invitation token
pub async fn create_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<InviteResponse>, AppError> {
    let invite = state.chat_service.invite_token(auth.user_id, chat_id).await?;
    Ok(Json(invite))
}

/// Join a chat with an invitation token
pub async fn enroll(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
    Json(body): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    let body = validated(body)?;
    let member = state
        .chat_service
        .enroll(auth.user_id, chat_id, &body.token)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// List members
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    let members = state.chat_service.list_members(auth.user_id, chat_id).await?;
    Ok(Json(members))
}

/// Grant or revoke admin rights
pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((chat_id, target_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .chat_service
        .update_member(auth.user_id, chat_id, target_id, body.is_admin)
        .await?;
    Ok(Json(member))
}

/// Remove a member, or leave the chat
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((chat_id, target_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    state
        .chat_service
        .remove_member(auth.user_id, chat_id, target_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Transfer ownership
pub async fn transfer_ownership(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
    Json(body): Json<TransferOwnershipRequest>,
) -> Result<StatusCode, AppError> {
    state
        .chat_service
        .transfer_ownership(auth.user_id, chat_id, body.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Message history of a chat
pub async fn chat_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagePage>, AppError> {
    let query = validated(query)?;
    let page = state
        .chat_service
        .chat_history(auth.user_id, chat_id, &query)
        .await?;
    Ok(Json(page))
}

/// Message history of the private chat with another user
pub async fn private_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(target_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagePage>, AppError> {
    let query = validated(query)?;
    let page = state
        .chat_service
        .private_history(auth.user_id, target_id, &query)
        .await?;
    Ok(Json(page))
}
