//! Session façade tying the chat components together.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::directory::{ConversationDirectory, StatusFilter};
use super::lifecycle::LifecycleController;
use super::message_stream::{LiveOutcome, MessageStream};
use super::view_binder::{BindContext, ChatViewBinder};
use crate::api::ChatBackend;
use crate::config::ChatClientConfig;
use crate::domain::{
    Capability, ChatEvent, Conversation, ConversationId, ConversationStatus, Identity, Message,
    UserId,
};
use crate::error::ChatError;
use crate::ws::{ConnectionManager, ConnectionState, LiveFeed};

/// A live event after it has been applied to the session.
#[derive(Debug, Clone)]
pub enum LiveUpdate {
    /// A pushed message and where it went.
    Message {
        /// The message.
        message: Message,
        /// Whether it was shown, stashed or ignored.
        outcome: LiveOutcome,
    },
    /// The live channel registered.
    Connected {
        /// Registered user.
        user_id: UserId,
    },
    /// The live channel closed.
    Disconnected {
        /// Cause reported by the socket task.
        reason: String,
        /// `true` when the session asked for it.
        requested: bool,
        /// Time the channel closed.
        timestamp: DateTime<Utc>,
    },
}

/// One signed-in chat session.
///
/// Owns the backend, the live channel and the client-side state. Driven
/// from a single task; every mutating operation takes `&mut self`.
#[derive(Debug)]
pub struct ChatClient<B> {
    identity: Identity,
    backend: B,
    connection: ConnectionManager,
    feed: LiveFeed,
    directory: ConversationDirectory,
    stream: MessageStream,
    lifecycle: LifecycleController,
    binder: ChatViewBinder,
    deferred: VecDeque<ChatEvent>,
}

impl<B: ChatBackend> ChatClient<B> {
    /// Creates a session over an existing connection manager.
    #[must_use]
    pub fn new(
        identity: Identity,
        backend: B,
        connection: ConnectionManager,
        config: &ChatClientConfig,
    ) -> Self {
        let feed = connection.on_message();
        let capability = Capability::for_identity(&identity);
        Self {
            identity,
            backend,
            connection,
            feed,
            directory: ConversationDirectory::new(capability),
            stream: MessageStream::new(config.stash_capacity),
            lifecycle: LifecycleController::new(config.policy.clone()),
            binder: ChatViewBinder::new(),
            deferred: VecDeque::new(),
        }
    }

    /// Creates a session with a connection manager built from `config`.
    #[must_use]
    pub fn from_config(identity: Identity, backend: B, config: &ChatClientConfig) -> Self {
        let connection = ConnectionManager::from_config(config);
        Self::new(identity, backend, connection, config)
    }

    /// Signed-in user.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Backend the session talks to.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opens the live channel and registers the session user.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] if the socket cannot be opened.
    pub async fn connect(&mut self) -> Result<(), ChatError> {
        self.connection.connect(&self.identity.user_id).await
    }

    /// Closes the live channel.
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    /// Subscribes to the raw live events of this session's channel,
    /// independent of the session's own feed.
    #[must_use]
    pub fn on_message(&self) -> LiveFeed {
        self.connection.on_message()
    }

    /// Live channel state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns `true` while the live channel is registered.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Reloads the conversation list. Returns the number loaded.
    ///
    /// # Errors
    ///
    /// Propagates the listing error; the previous list is kept.
    pub async fn refresh_conversations(&mut self) -> Result<usize, ChatError> {
        self.directory.load(&self.backend).await
    }

    /// Sets the participant search term.
    pub fn search(&mut self, term: &str) {
        self.directory.search(term);
    }

    /// Sets the status filter.
    pub fn filter_by_status(&mut self, filter: StatusFilter) {
        self.directory.filter_by_status(filter);
    }

    /// Conversations passing the current search and filter.
    #[must_use]
    pub fn conversations(&self) -> Vec<&Conversation> {
        self.directory.visible()
    }

    /// The conversation directory.
    #[must_use]
    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    /// Conversation currently shown, if any.
    #[must_use]
    pub fn active_conversation(&self) -> Option<&ConversationId> {
        self.binder.active()
    }

    /// Messages of the shown conversation.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.stream.messages()
    }

    /// Shows `id`: loads its history and marks it read.
    ///
    /// A history response that arrives after the view moved on is dropped
    /// without error.
    ///
    /// # Errors
    ///
    /// Propagates the history request error.
    pub async fn select_conversation(&mut self, id: &ConversationId) -> Result<(), ChatError> {
        let ctx = BindContext {
            stream: &mut self.stream,
            feed: &mut self.feed,
            lifecycle: &self.lifecycle,
            deferred: &mut self.deferred,
        };
        match self.binder.bind(id, &self.backend, ctx).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_silent() => {
                tracing::debug!(conversation_id = %id, "history response dropped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Starts (or resumes) the caller's conversation and shows it.
    ///
    /// # Errors
    ///
    /// Propagates start and history errors.
    pub async fn start_conversation(&mut self) -> Result<Conversation, ChatError> {
        let conversation = self
            .lifecycle
            .start(&self.backend, &mut self.directory)
            .await?;
        self.select_conversation(conversation.id()).await?;
        Ok(conversation)
    }

    /// Closes a conversation.
    ///
    /// # Errors
    ///
    /// See [`LifecycleController::end`].
    pub async fn end_conversation(&mut self, id: &ConversationId) -> Result<(), ChatError> {
        self.lifecycle
            .end(&self.backend, &mut self.directory, id)
            .await
    }

    /// Marks a conversation read on the backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend error.
    pub async fn mark_read(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.lifecycle.mark_read(&self.backend, id).await
    }

    /// Sends a message into the shown conversation.
    ///
    /// The message is appended locally once the backend returns it.
    ///
    /// # Errors
    ///
    /// [`ChatError::EmptyMessage`] for blank content,
    /// [`ChatError::NoActiveConversation`] when nothing is shown,
    /// [`ChatError::ConversationClosed`] when it is known to be closed,
    /// [`ChatError::NotConnected`] without a live channel. Nothing is sent
    /// in those cases. Backend errors are propagated.
    pub async fn send_message(&mut self, content: &str) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let id = self
            .binder
            .active()
            .cloned()
            .ok_or(ChatError::NoActiveConversation)?;
        if self
            .directory
            .get(&id)
            .is_some_and(|c| c.status() == ConversationStatus::Closed)
        {
            return Err(ChatError::ConversationClosed(id));
        }
        if !self.connection.is_connected() {
            tracing::warn!(conversation_id = %id, "send attempted without live channel");
            return Err(ChatError::NotConnected);
        }

        let message = self.backend.send_message(&id, content).await?;
        self.stream.append_sent(message.clone());
        tracing::debug!(conversation_id = %id, "message sent");
        Ok(message)
    }

    /// Waits for the next live event and applies it.
    ///
    /// Returns `None` once the event bus is gone.
    pub async fn next_live_update(&mut self) -> Option<LiveUpdate> {
        let event = match self.deferred.pop_front() {
            Some(event) => event,
            None => self.feed.next().await?,
        };
        Some(self.apply_event(event))
    }

    /// Applies every live event already queued, without waiting.
    pub fn drain_live_updates(&mut self) -> Vec<LiveUpdate> {
        let mut updates = Vec::new();
        while let Some(event) = self.deferred.pop_front() {
            updates.push(self.apply_event(event));
        }
        while let Some(event) = self.feed.try_next() {
            updates.push(self.apply_event(event));
        }
        updates
    }

    /// Tears the session down: closes the live channel and forgets all
    /// client-side state.
    pub async fn logout(mut self) {
        self.connection.disconnect().await;
        self.binder.detach();
        self.stream.clear();
        self.directory.replace(Vec::new());
        self.deferred.clear();
        tracing::info!(user_id = %self.identity.user_id, "session closed");
    }

    fn apply_event(&mut self, event: ChatEvent) -> LiveUpdate {
        match event {
            ChatEvent::MessageReceived(message) => {
                let outcome = self.stream.on_live_message(message.clone());
                LiveUpdate::Message { message, outcome }
            }
            ChatEvent::Connected { user_id, .. } => LiveUpdate::Connected { user_id },
            ChatEvent::Disconnected {
                reason,
                requested,
                timestamp,
            } => {
                if !requested {
                    tracing::warn!(%reason, "live channel lost; reconnect required");
                }
                LiveUpdate::Disconnected {
                    reason,
                    requested,
                    timestamp,
                }
            }
        }
    }
}
