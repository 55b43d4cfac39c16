//! Binding of the visible chat view to one conversation.

use std::collections::VecDeque;

use super::lifecycle::LifecycleController;
use super::message_stream::MessageStream;
use crate::api::ChatBackend;
use crate::domain::{ChatEvent, ConversationId};
use crate::error::ChatError;
use crate::ws::LiveFeed;

/// Everything a bind touches besides the backend.
#[derive(Debug)]
pub struct BindContext<'a> {
    /// Stream receiving history and live messages.
    pub stream: &'a mut MessageStream,
    /// Feed drained while the history request is in flight.
    pub feed: &'a mut LiveFeed,
    /// Issues the read receipt after the load.
    pub lifecycle: &'a LifecycleController,
    /// Non-message events seen during the load, kept for the caller.
    pub deferred: &'a mut VecDeque<ChatEvent>,
}

/// Holds the conversation the view shows.
#[derive(Debug, Default)]
pub struct ChatViewBinder {
    active: Option<ConversationId>,
}

impl ChatViewBinder {
    /// Creates an unbound binder.
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Conversation currently bound.
    #[must_use]
    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Unbinds the view.
    pub fn detach(&mut self) {
        if let Some(id) = self.active.take() {
            tracing::debug!(conversation_id = %id, "view detached");
        }
    }

    /// Binds the view to `id`: loads the history while applying live
    /// messages, switches the view over, then marks the conversation read.
    ///
    /// The previous binding stays in place until the history has been
    /// applied. Binding the conversation that is already bound reloads it.
    /// A failed read receipt is logged and does not fail the bind. Returns
    /// the number of messages shown.
    ///
    /// # Errors
    ///
    /// Propagates the history request error; the view keeps its previous
    /// conversation. Returns [`ChatError::StaleResponse`] if a newer load
    /// overtook this one.
    pub async fn bind<B: ChatBackend>(
        &mut self,
        id: &ConversationId,
        backend: &B,
        ctx: BindContext<'_>,
    ) -> Result<usize, ChatError> {
        let BindContext {
            stream,
            feed,
            lifecycle,
            deferred,
        } = ctx;

        let ticket = stream.begin_load(id);
        let fetch = backend.fetch_messages(id);
        tokio::pin!(fetch);

        let mut feed_open = true;
        let fetched = loop {
            tokio::select! {
                result = &mut fetch => break result,
                event = feed.next(), if feed_open => match event {
                    Some(ChatEvent::MessageReceived(message)) => {
                        stream.on_live_message(message);
                    }
                    Some(other) => deferred.push_back(other),
                    None => feed_open = false,
                },
            }
        };
        let history = match fetched {
            Ok(history) => history,
            Err(err) => {
                stream.abandon_load(&ticket);
                return Err(err);
            }
        };

        let count = stream.apply_load(&ticket, history)?;
        if let Some(previous) = self.active.as_ref().filter(|p| *p != id) {
            tracing::debug!(from = %previous, to = %id, "switched conversation");
        }
        self.active = Some(id.clone());

        if let Err(err) = lifecycle.mark_read(backend, id).await {
            tracing::warn!(conversation_id = %id, error = %err, "read receipt failed");
        }
        tracing::debug!(conversation_id = %id, messages = count, "view bound");
        Ok(count)
    }
}
