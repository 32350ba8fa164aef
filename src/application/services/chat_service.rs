//! Chat Service
//!
//! Control-plane operations on chats and memberships. Every administrative
//! action is gated by the membership authorizer and fails with a JSON error,
//! never a socket close. Removing a member or deleting a chat also publishes
//! a revocation to the chat room, so open sockets lose read access at once.

use std::sync::Arc;

use crate::application::dto::{
    ChatListQuery, ChatResponse, CreateChatRequest, Envelope, HistoryQuery, InviteResponse,
    MemberResponse, MessagePage, UserChatResponse,
};
use crate::application::services::MessageStore;
use crate::domain::services::MembershipAuthorizer;
use crate::domain::{
    Chat, ChatListing, ChatRepository, Membership, MembershipRepository, NewMember, NewPublicChat,
    Topic,
};
use crate::infrastructure::auth::JwtAuthenticator;
use crate::infrastructure::bus::BroadcastBus;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Chat administration service
#[derive(Clone)]
pub struct ChatService {
    chats: Arc<dyn ChatRepository>,
    memberships: Arc<dyn MembershipRepository>,
    messages: MessageStore,
    authorizer: MembershipAuthorizer,
    auth: JwtAuthenticator,
    bus: Arc<dyn BroadcastBus>,
    ids: Arc<SnowflakeGenerator>,
}

impl ChatService {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        memberships: Arc<dyn MembershipRepository>,
        messages: MessageStore,
        authorizer: MembershipAuthorizer,
        auth: JwtAuthenticator,
        bus: Arc<dyn BroadcastBus>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            chats,
            memberships,
            messages,
            authorizer,
            auth,
            bus,
            ids,
        }
    }

    /// Public chats, optionally filtered by a name keyword.
    pub async fn search_public_chats(&self, query: &ChatListQuery) -> Result<Vec<ChatResponse>, AppError> {
        let chats = self.chats.search_public(listing(query)).await?;
        Ok(chats.into_iter().map(ChatResponse::from).collect())
    }

    /// The caller's chats, most recently active first.
    pub async fn list_user_chats(&self, user_id: i64, query: &ChatListQuery) -> Result<Vec<UserChatResponse>, AppError> {
        let chats = self.chats.list_by_user(user_id, listing(query)).await?;
        Ok(chats.into_iter().map(UserChatResponse::from).collect())
    }

    /// Create a public chat owned by `user_id`.
    pub async fn create_public_chat(
        &self,
        user_id: i64,
        request: CreateChatRequest,
    ) -> Result<ChatResponse, AppError> {
        let chat = self
            .chats
            .create_public_chat(NewPublicChat {
                id: self.ids.generate(),
                name: request.name,
                owner_id: user_id,
                members: request
                    .members
                    .into_iter()
                    .map(|m| NewMember {
                        user_id: m.id,
                        is_admin: m.is_admin,
                    })
                    .collect(),
            })
            .await?;

        let members_count = self.chats.count_members(chat.id).await?;
        tracing::info!(chat_id = chat.id, owner_id = user_id, "Public chat created");
        Ok(ChatResponse::with_members_count(chat, members_count))
    }

    /// Chat detail with its member count. Private chats are visible to their members only.
    pub async fn get_chat(&self, user_id: i64, chat_id: i64) -> Result<ChatResponse, AppError> {
        let chat = self.find_chat(chat_id).await?;
        if chat.private && self.memberships.find(chat_id, user_id).await?.is_none() {
            return Err(chat_not_found());
        }

        let members_count = self.chats.count_members(chat_id).await?;
        Ok(ChatResponse::with_members_count(chat, members_count))
    }

    /// Rename a public chat (admins only).
    pub async fn rename_chat(&self, user_id: i64, chat_id: i64, name: &str) -> Result<ChatResponse, AppError> {
        self.find_public_chat(chat_id).await?;
        self.authorizer.require_admin(user_id, chat_id).await?;

        let chat = self.chats.rename(chat_id, name).await?;
        Ok(chat.into())
    }

    /// Delete a chat with its memberships and messages (owner only).
    pub async fn delete_chat(&self, user_id: i64, chat_id: i64) -> Result<(), AppError> {
        self.authorizer.require_owner(user_id, chat_id).await?;
        self.chats.delete(chat_id).await?;
        tracing::info!(chat_id, user_id, "Chat deleted");

        self.revoke(chat_id, None).await;
        Ok(())
    }

    /// Issue an invitation token for a public chat (admins only).
    pub async fn invite_token(&self, user_id: i64, chat_id: i64) -> Result<InviteResponse, AppError> {
        self.find_public_chat(chat_id).await?;
        self.authorizer.require_admin(user_id, chat_id).await?;

        let token = self
            .auth
            .issue_invite_token(chat_id)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(InviteResponse { token })
    }

    /// Join a public chat with an invitation token.
    pub async fn enroll(&self, user_id: i64, chat_id: i64, token: &str) -> Result<MemberResponse, AppError> {
        self.find_public_chat(chat_id).await?;

        if self.memberships.find(chat_id, user_id).await?.is_some() {
            return Err(AppError::Conflict("You are already enrolled in this chat.".into()));
        }

        self.auth
            .verify_invite_token(token, chat_id)
            .map_err(|_| AppError::BadRequest("Invite token is invalid or expired.".into()))?;

        let membership = self
            .memberships
            .create(&Membership::member(chat_id, user_id))
            .await?;
        tracing::info!(chat_id, user_id, "User enrolled with invitation");
        Ok(membership.into())
    }

    /// Grant or revoke admin rights (admins only).
    pub async fn update_member(
        &self,
        user_id: i64,
        chat_id: i64,
        target_id: i64,
        is_admin: bool,
    ) -> Result<MemberResponse, AppError> {
        self.find_public_chat(chat_id).await?;
        self.authorizer.require_admin(user_id, chat_id).await?;

        let target = self.find_member(chat_id, target_id).await?;
        if target.is_owner && !is_admin {
            return Err(AppError::Forbidden("Owner always remains an admin.".into()));
        }

        let membership = self.memberships.set_admin(chat_id, target_id, is_admin).await?;
        Ok(membership.into())
    }

    /// Remove a member (admins), or leave the chat (anyone but the owner).
    ///
    /// Private chats always keep both memberships.
    pub async fn remove_member(&self, user_id: i64, chat_id: i64, target_id: i64) -> Result<(), AppError> {
        self.find_public_chat(chat_id).await?;
        if user_id != target_id {
            self.authorizer.require_admin(user_id, chat_id).await?;
        }

        let target = self.find_member(chat_id, target_id).await?;
        if target.is_owner {
            return Err(AppError::Forbidden("Owner cannot be removed from group.".into()));
        }

        self.memberships.delete(chat_id, target_id).await?;
        tracing::info!(chat_id, user_id, target_id, "Member removed");

        self.revoke(chat_id, Some(target_id)).await;
        Ok(())
    }

    /// Hand ownership to another accepted member (owner only).
    pub async fn transfer_ownership(&self, user_id: i64, chat_id: i64, target_id: i64) -> Result<(), AppError> {
        self.authorizer.require_owner(user_id, chat_id).await?;
        if target_id == user_id {
            return Ok(());
        }

        self.find_member(chat_id, target_id).await?;
        self.memberships.transfer_ownership(chat_id, user_id, target_id).await?;
        tracing::info!(chat_id, from = user_id, to = target_id, "Chat ownership transferred");
        Ok(())
    }

    /// Memberships of a chat (members only).
    pub async fn list_members(&self, user_id: i64, chat_id: i64) -> Result<Vec<MemberResponse>, AppError> {
        self.find_public_chat(chat_id).await?;
        self.authorizer.require_member(user_id, chat_id).await?;

        let members = self.memberships.list_by_chat(chat_id).await?;
        Ok(members.into_iter().map(MemberResponse::from).collect())
    }

    /// History of a chat the caller is a member of.
    pub async fn chat_history(&self, user_id: i64, chat_id: i64, query: &HistoryQuery) -> Result<MessagePage, AppError> {
        self.find_chat(chat_id).await?;
        self.authorizer.require_member(user_id, chat_id).await?;

        let limit = query.limit();
        let messages = self.messages.history(chat_id, query.before, limit).await?;
        Ok(MessagePage::new(messages, limit))
    }

    /// History of the private chat with `target_id`.
    pub async fn private_history(&self, user_id: i64, target_id: i64, query: &HistoryQuery) -> Result<MessagePage, AppError> {
        let chat = self
            .messages
            .find_private_chat(user_id, target_id)
            .await?
            .ok_or_else(chat_not_found)?;

        let limit = query.limit();
        let messages = self.messages.history(chat.id, query.before, limit).await?;
        Ok(MessagePage::new(messages, limit))
    }

    /// Tell open sockets of the chat that access was withdrawn. The store
    /// change already happened; a bus failure only delays the close until
    /// the next post is refused.
    async fn revoke(&self, chat_id: i64, user_id: Option<i64>) {
        let topic = Topic::public_chat(chat_id);
        let envelope = Envelope::Revoked { chat_id, user_id };

        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to serialize revocation");
                return;
            }
        };
        if let Err(e) = self.bus.publish(&topic, payload).await {
            tracing::warn!(topic = %topic, error = %e, "Revocation publish failed");
            metrics::record_publish_failure("control");
        }
    }

    async fn find_chat(&self, chat_id: i64) -> Result<Chat, AppError> {
        self.chats.find_by_id(chat_id).await?.ok_or_else(chat_not_found)
    }

    async fn find_public_chat(&self, chat_id: i64) -> Result<Chat, AppError> {
        match self.chats.find_by_id(chat_id).await? {
            Some(chat) if chat.is_public() => Ok(chat),
            _ => Err(AppError::NotFound(
                "Public chat with given id has not been found.".into(),
            )),
        }
    }

    async fn find_member(&self, chat_id: i64, user_id: i64) -> Result<Membership, AppError> {
        self.memberships
            .find(chat_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found.".into()))
    }
}

fn listing(query: &ChatListQuery) -> ChatListing<'_> {
    ChatListing {
        keyword: query.keyword(),
        limit: query.limit(),
        offset: query.offset(),
    }
}

fn chat_not_found() -> AppError {
    AppError::NotFound("Chat not found".into())
}
