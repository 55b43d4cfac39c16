//! In-process storefront chat backend.
//!
//! [`ChatStore`] keeps conversations and messages in memory and applies the
//! same rules as the storefront backend: one open conversation per
//! customer, closed conversations reject further changes, customers only
//! see their own conversations. [`InMemoryBackend`] binds a store to one
//! caller identity and implements [`ChatBackend`] on top of it, which makes
//! it the default fixture for service-level tests and offline demos.
//!
//! New messages are published on the store's [`EventBus`] so a fake live
//! channel can forward them to registered participants.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ChatBackend;
use crate::domain::{
    ChatEvent, Conversation, ConversationId, ConversationPolicy, ConversationStatus,
    CustomerView, EventBus, Identity, Message, MessageId, Participant, SenderRole, SupportView,
};
use crate::error::ChatError;

#[derive(Debug, Default)]
struct StoreState {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    calls: HashMap<&'static str, usize>,
}

impl StoreState {
    fn record(&mut self, operation: &'static str) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    fn conversation_mut(
        &mut self,
        operation: &'static str,
        id: &ConversationId,
    ) -> Result<&mut Conversation, ChatError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| rejected(operation, 404, "Conversation not found"))
    }
}

/// Shared in-memory conversation and message store.
#[derive(Debug)]
pub struct ChatStore {
    state: RwLock<StoreState>,
    events: EventBus,
}

impl ChatStore {
    /// Creates an empty store whose event bus has the given capacity.
    #[must_use]
    pub fn new(event_bus_capacity: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            events: EventBus::new(event_bus_capacity),
        }
    }

    /// Bus carrying a [`ChatEvent::MessageReceived`] for every stored message.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Inserts a prepared conversation, replacing one with the same id.
    pub async fn insert_conversation(&self, conversation: Conversation) {
        let mut state = self.state.write().await;
        state.conversations.retain(|c| c.id() != conversation.id());
        state.conversations.push(conversation);
    }

    /// Inserts a prepared message without publishing it.
    pub async fn insert_message(&self, message: Message) {
        self.state.write().await.messages.push(message);
    }

    /// Returns a snapshot of a conversation, if it exists.
    pub async fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.state
            .read()
            .await
            .conversations
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    /// Returns every stored message of a conversation in insertion order.
    pub async fn messages_of(&self, id: &ConversationId) -> Vec<Message> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.conversation_id() == id)
            .cloned()
            .collect()
    }

    /// Number of times `operation` was invoked (successful or not).
    pub async fn call_count(&self, operation: &str) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Opens a conversation for `caller`, or returns their open one.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the HTTP contract.
    pub async fn start_conversation(&self, caller: &Identity) -> Result<Conversation, ChatError> {
        let mut state = self.state.write().await;
        state.record("start_conversation");
        if let Some(open) = state
            .conversations
            .iter()
            .find(|c| c.status().is_open() && c.has_participant(&caller.user_id))
        {
            return Ok(open.clone());
        }
        let conversation = Conversation::new(
            ConversationId::generate(),
            vec![Participant::from(caller)],
            Utc::now(),
        );
        state.conversations.push(conversation.clone());
        tracing::debug!(conversation_id = %conversation.id(), user_id = %caller.user_id, "conversation started");
        Ok(conversation)
    }

    /// Closes a conversation.
    ///
    /// # Errors
    ///
    /// `404` if unknown, `403` if a customer closes someone else's
    /// conversation, `409` if it is already closed.
    pub async fn close_conversation(
        &self,
        caller: &Identity,
        id: &ConversationId,
    ) -> Result<(), ChatError> {
        const OP: &str = "close_conversation";
        let mut state = self.state.write().await;
        state.record(OP);
        let conversation = state.conversation_mut(OP, id)?;
        ensure_access(OP, caller, conversation)?;
        conversation
            .transition_to(ConversationStatus::Closed, Utc::now(), &ConversationPolicy::default())
            .map_err(|_| rejected(OP, 409, "Conversation already closed"))
    }

    /// Conversations `caller` participates in.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the HTTP contract.
    pub async fn list_own(&self, caller: &Identity) -> Result<Vec<Conversation>, ChatError> {
        let mut state = self.state.write().await;
        state.record("list_own_conversations");
        Ok(state
            .conversations
            .iter()
            .filter(|c| c.has_participant(&caller.user_id))
            .cloned()
            .collect())
    }

    /// Every conversation in the store.
    ///
    /// # Errors
    ///
    /// `403` when `caller` is not support staff.
    pub async fn list_all(&self, caller: &Identity) -> Result<Vec<Conversation>, ChatError> {
        let mut state = self.state.write().await;
        state.record("list_all_conversations");
        if !caller.role.is_support() {
            return Err(rejected("list_all_conversations", 403, "Admins only"));
        }
        Ok(state.conversations.clone())
    }

    /// Marks every message of the conversation read.
    ///
    /// # Errors
    ///
    /// `404` if unknown, `403` if the caller may not see it.
    pub async fn mark_read(&self, caller: &Identity, id: &ConversationId) -> Result<(), ChatError> {
        const OP: &str = "mark_read";
        let mut state = self.state.write().await;
        state.record(OP);
        let conversation = state.conversation_mut(OP, id)?;
        ensure_access(OP, caller, conversation)?;
        state
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id() == id)
            .for_each(Message::mark_read);
        Ok(())
    }

    /// Stores a message and publishes it on the event bus.
    ///
    /// Support staff posting into a conversation join it as participants.
    ///
    /// # Errors
    ///
    /// `400` for empty content, `404` if unknown, `403` if the caller may
    /// not see it, `409` if the conversation is closed.
    pub async fn post_message(
        &self,
        caller: &Identity,
        id: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatError> {
        const OP: &str = "send_message";
        let mut state = self.state.write().await;
        state.record(OP);
        if content.trim().is_empty() {
            return Err(rejected(OP, 400, "Message content is required"));
        }
        let conversation = state.conversation_mut(OP, id)?;
        ensure_access(OP, caller, conversation)?;
        if !conversation.status().is_open() {
            return Err(rejected(OP, 409, "Conversation is closed"));
        }
        conversation.add_participant(Participant::from(caller));

        let message = Message::new(
            id.clone(),
            Participant::from(caller),
            SenderRole::from(caller.role),
            content,
            next_timestamp(&state.messages),
        )
        .with_id(MessageId::generate());
        state.messages.push(message.clone());
        drop(state);

        let receivers = self.events.publish(ChatEvent::MessageReceived(message.clone()));
        tracing::debug!(conversation_id = %id, receivers, "message stored");
        Ok(message)
    }

    /// Full history of a conversation.
    ///
    /// # Errors
    ///
    /// `404` if unknown, `403` if the caller may not see it.
    pub async fn history(
        &self,
        caller: &Identity,
        id: &ConversationId,
    ) -> Result<Vec<Message>, ChatError> {
        const OP: &str = "fetch_messages";
        let mut state = self.state.write().await;
        state.record(OP);
        let conversation = state.conversation_mut(OP, id)?;
        ensure_access(OP, caller, conversation)?;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.conversation_id() == id)
            .cloned()
            .collect())
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// [`ChatBackend`] over a shared [`ChatStore`], acting as one caller.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    store: Arc<ChatStore>,
    caller: Identity,
}

impl InMemoryBackend {
    /// Binds `store` to `caller`.
    #[must_use]
    pub fn new(store: Arc<ChatStore>, caller: Identity) -> Self {
        Self { store, caller }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    /// The identity requests are issued as.
    #[must_use]
    pub fn caller(&self) -> &Identity {
        &self.caller
    }
}

impl ChatBackend for InMemoryBackend {
    async fn start_conversation(&self) -> Result<Conversation, ChatError> {
        self.store.start_conversation(&self.caller).await
    }

    async fn close_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.store.close_conversation(&self.caller, id).await
    }

    async fn list_own_conversations(
        &self,
        _view: &CustomerView,
    ) -> Result<Vec<Conversation>, ChatError> {
        self.store.list_own(&self.caller).await
    }

    async fn list_all_conversations(
        &self,
        _view: &SupportView,
    ) -> Result<Vec<Conversation>, ChatError> {
        self.store.list_all(&self.caller).await
    }

    async fn mark_read(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.store.mark_read(&self.caller, id).await
    }

    async fn send_message(&self, id: &ConversationId, content: &str) -> Result<Message, ChatError> {
        self.store.post_message(&self.caller, id, content).await
    }

    async fn fetch_messages(&self, id: &ConversationId) -> Result<Vec<Message>, ChatError> {
        self.store.history(&self.caller, id).await
    }
}

fn rejected(operation: &'static str, status: u16, message: &str) -> ChatError {
    ChatError::Request {
        operation,
        status,
        message: message.to_string(),
    }
}

fn ensure_access(
    operation: &'static str,
    caller: &Identity,
    conversation: &Conversation,
) -> Result<(), ChatError> {
    if caller.role.is_support() || conversation.has_participant(&caller.user_id) {
        Ok(())
    } else {
        Err(rejected(operation, 403, "Not a participant of this conversation"))
    }
}

/// Strictly increasing timestamps keep history order stable even when two
/// messages land within the clock's resolution.
fn next_timestamp(existing: &[Message]) -> DateTime<Utc> {
    let now = Utc::now();
    match existing.iter().map(Message::timestamp).max() {
        Some(last) if last >= now => last + chrono::Duration::microseconds(1),
        _ => now,
    }
}
