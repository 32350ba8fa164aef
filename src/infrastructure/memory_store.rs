//! In-Memory Store
//!
//! Process-local implementation of every repository trait, for single-node
//! development and tests. One lock guards all tables so multi-row writes
//! (private chat creation, ownership transfer) are atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::{
    pair_key, Chat, ChatActivity, ChatListing, ChatRepository, ChatSummary, Membership,
    MembershipRepository, Message, MessageRepository, NewPublicChat, PublicProfile,
    UserRepository,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<i64, PublicProfile>,
    chats: HashMap<i64, Chat>,
    private_pairs: HashMap<String, i64>,
    /// Keyed by (chat_id, user_id).
    memberships: BTreeMap<(i64, i64), Membership>,
    /// Keyed by message id, which is time ordered.
    messages: BTreeMap<i64, Message>,
}

impl Tables {
    fn name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.chats
            .values()
            .any(|c| c.name.as_deref() == Some(name) && Some(c.id) != except)
    }

    fn members_count(&self, chat_id: i64) -> i64 {
        self.memberships
            .range((chat_id, i64::MIN)..=(chat_id, i64::MAX))
            .count() as i64
    }

    fn last_message(&self, chat_id: i64) -> Option<&Message> {
        self.messages.values().rev().find(|m| m.chat_id == chat_id)
    }

    fn remove_chat(&mut self, chat_id: i64) {
        self.chats.remove(&chat_id);
        self.private_pairs.retain(|_, id| *id != chat_id);
        self.memberships.retain(|(c, _), _| *c != chat_id);
        self.messages.retain(|_, m| m.chat_id != chat_id);
    }
}

/// Message store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user in the directory. Accounts are owned elsewhere, so
    /// this is how development setups and tests seed profiles.
    pub fn insert_user(&self, profile: PublicProfile) {
        self.tables.lock().users.insert(profile.id, profile);
    }

    /// Number of chats currently stored.
    pub fn chat_count(&self) -> usize {
        self.tables.lock().chats.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_public_profile(&self, user_id: i64) -> Result<Option<PublicProfile>, AppError> {
        Ok(self.tables.lock().users.get(&user_id).cloned())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        Ok(self.tables.lock().chats.get(&id).cloned())
    }

    async fn find_private_chat(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .private_pairs
            .get(&pair_key(user_a, user_b))
            .and_then(|id| tables.chats.get(id))
            .cloned())
    }

    async fn find_or_create_private_chat(
        &self,
        user_a: i64,
        user_b: i64,
        new_chat_id: i64,
    ) -> Result<(Chat, bool), AppError> {
        let key = pair_key(user_a, user_b);
        let mut tables = self.tables.lock();

        if let Some(chat) = tables.private_pairs.get(&key).and_then(|id| tables.chats.get(id)) {
            return Ok((chat.clone(), false));
        }

        if !tables.users.contains_key(&user_a) || !tables.users.contains_key(&user_b) {
            return Err(AppError::NotFound("Target user not found.".into()));
        }

        let chat = Chat {
            id: new_chat_id,
            name: None,
            private: true,
            created_at: Utc::now(),
        };
        tables.chats.insert(chat.id, chat.clone());
        tables.private_pairs.insert(key, chat.id);
        for user_id in [user_a, user_b] {
            tables
                .memberships
                .insert((chat.id, user_id), Membership::member(chat.id, user_id));
        }

        Ok((chat, true))
    }

    async fn create_public_chat(&self, new_chat: NewPublicChat) -> Result<Chat, AppError> {
        let mut tables = self.tables.lock();

        if tables.name_taken(&new_chat.name, None) {
            return Err(AppError::Conflict("Chat with given name already exists.".into()));
        }

        let unknown = std::iter::once(new_chat.owner_id)
            .chain(new_chat.members.iter().map(|m| m.user_id))
            .any(|id| !tables.users.contains_key(&id));
        if unknown {
            return Err(AppError::NotFound("Nonexistent user passed as a member.".into()));
        }

        let chat = Chat {
            id: new_chat.id,
            name: Some(new_chat.name),
            private: false,
            created_at: Utc::now(),
        };
        tables.chats.insert(chat.id, chat.clone());
        tables.memberships.insert(
            (chat.id, new_chat.owner_id),
            Membership {
                is_admin: true,
                is_owner: true,
                ..Membership::member(chat.id, new_chat.owner_id)
            },
        );
        for member in new_chat.members.iter().filter(|m| m.user_id != new_chat.owner_id) {
            tables
                .memberships
                .entry((chat.id, member.user_id))
                .or_insert_with(|| Membership {
                    is_admin: member.is_admin,
                    ..Membership::member(chat.id, member.user_id)
                });
        }

        Ok(chat)
    }

    async fn rename(&self, chat_id: i64, name: &str) -> Result<Chat, AppError> {
        let mut tables = self.tables.lock();

        if tables.name_taken(name, Some(chat_id)) {
            return Err(AppError::Conflict("Chat with given name already exists.".into()));
        }

        match tables.chats.get_mut(&chat_id) {
            Some(chat) if chat.is_public() => {
                chat.name = Some(name.to_owned());
                Ok(chat.clone())
            }
            _ => Err(AppError::NotFound(
                "Public chat with given id has not been found.".into(),
            )),
        }
    }

    async fn delete(&self, chat_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        if !tables.chats.contains_key(&chat_id) {
            return Err(AppError::NotFound("Chat not found".into()));
        }
        tables.remove_chat(chat_id);
        Ok(())
    }

    async fn count_members(&self, chat_id: i64) -> Result<i64, AppError> {
        Ok(self.tables.lock().members_count(chat_id))
    }

    async fn search_public(&self, listing: ChatListing<'_>) -> Result<Vec<ChatSummary>, AppError> {
        let tables = self.tables.lock();
        let mut chats: Vec<&Chat> = tables
            .chats
            .values()
            .filter(|c| c.is_public() && listing.matches(c.name.as_deref()))
            .collect();
        chats.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(chats
            .into_iter()
            .skip(listing.offset.max(0) as usize)
            .take(listing.limit.max(0) as usize)
            .map(|chat| ChatSummary {
                chat: chat.clone(),
                members_count: tables.members_count(chat.id),
            })
            .collect())
    }

    async fn list_by_user(&self, user_id: i64, listing: ChatListing<'_>) -> Result<Vec<ChatActivity>, AppError> {
        let tables = self.tables.lock();
        let mut chats: Vec<ChatActivity> = tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.chats.get(&m.chat_id))
            .filter(|c| listing.matches(c.name.as_deref()))
            .map(|chat| ChatActivity {
                chat: chat.clone(),
                last_message: tables.last_message(chat.id).cloned(),
            })
            .collect();

        // Message ids are time ordered; `None` sorts below any `Some`.
        chats.sort_by(|a, b| {
            let last = |c: &ChatActivity| c.last_message.as_ref().map(|m| m.id);
            last(b).cmp(&last(a)).then(b.chat.id.cmp(&a.chat.id))
        });

        Ok(chats
            .into_iter()
            .skip(listing.offset.max(0) as usize)
            .take(listing.limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn find(&self, chat_id: i64, user_id: i64) -> Result<Option<Membership>, AppError> {
        Ok(self.tables.lock().memberships.get(&(chat_id, user_id)).cloned())
    }

    async fn list_by_chat(&self, chat_id: i64) -> Result<Vec<Membership>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .memberships
            .range((chat_id, i64::MIN)..=(chat_id, i64::MAX))
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn create(&self, membership: &Membership) -> Result<Membership, AppError> {
        let mut tables = self.tables.lock();
        let key = (membership.chat_id, membership.user_id);

        if !tables.chats.contains_key(&membership.chat_id)
            || !tables.users.contains_key(&membership.user_id)
        {
            return Err(AppError::NotFound("Chat or user not found".into()));
        }
        if tables.memberships.contains_key(&key) {
            return Err(AppError::Conflict("You are already enrolled in this chat.".into()));
        }

        tables.memberships.insert(key, membership.clone());
        Ok(membership.clone())
    }

    async fn set_admin(&self, chat_id: i64, user_id: i64, is_admin: bool) -> Result<Membership, AppError> {
        let mut tables = self.tables.lock();
        let membership = tables
            .memberships
            .get_mut(&(chat_id, user_id))
            .ok_or_else(|| AppError::NotFound("Member not found.".into()))?;
        membership.is_admin = is_admin;
        Ok(membership.clone())
    }

    async fn delete(&self, chat_id: i64, user_id: i64) -> Result<(), AppError> {
        self.tables
            .lock()
            .memberships
            .remove(&(chat_id, user_id))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Member with given id cannot be found in chat.".into()))
    }

    async fn transfer_ownership(&self, chat_id: i64, from_user: i64, to_user: i64) -> Result<(), AppError> {
        let mut tables = self.tables.lock();

        match tables.memberships.get(&(chat_id, from_user)) {
            Some(m) if m.is_owner => {}
            _ => {
                return Err(AppError::Forbidden(
                    "This action is only available for chat owner.".into(),
                ))
            }
        }
        match tables.memberships.get_mut(&(chat_id, to_user)) {
            Some(target) if target.accepted => {
                target.is_owner = true;
                target.is_admin = true;
            }
            _ => return Err(AppError::NotFound("Member not found.".into())),
        }
        if let Some(previous) = tables.memberships.get_mut(&(chat_id, from_user)) {
            previous.is_owner = false;
        }

        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let mut tables = self.tables.lock();
        if !tables.chats.contains_key(&message.chat_id) {
            return Err(AppError::NotFound("Chat does not exist".into()));
        }
        tables.messages.insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn find_by_chat(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let tables = self.tables.lock();
        let upper = before.unwrap_or(i64::MAX);
        Ok(tables
            .messages
            .range(..upper)
            .rev()
            .map(|(_, m)| m)
            .filter(|m| m.chat_id == chat_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
