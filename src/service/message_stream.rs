//! Ordered message buffer of the active conversation.

use std::collections::{HashMap, VecDeque};

use crate::domain::{ConversationId, Message};
use crate::error::ChatError;

/// Id-less messages remembered for pairing a send reply with its echo.
const ECHO_WINDOW: usize = 32;

/// Identifies one in-flight history load.
///
/// Only the most recent ticket is accepted by [`MessageStream::apply_load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    conversation_id: ConversationId,
    seq: u64,
}

impl LoadTicket {
    /// Conversation the load was issued for.
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

/// What happened to a message handed to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// Appended to the active buffer.
    Appended,
    /// Already present; ignored.
    Duplicate,
    /// Belongs to another conversation; kept until it becomes active.
    Stashed,
    /// Belongs to another conversation and stashing is disabled.
    Dropped,
}

/// Message buffer for the active conversation plus a bounded stash for
/// the others.
///
/// Messages are kept in arrival order, history first. A history load only
/// takes over the buffer once its response is applied; until then the
/// previous conversation stays on display and live messages for the
/// conversation being loaded are held aside. Every live message the
/// fetched history does not contain is re-appended after it.
#[derive(Debug)]
pub struct MessageStream {
    active: Option<ConversationId>,
    buffer: Vec<Message>,
    stash: HashMap<ConversationId, VecDeque<Message>>,
    stash_capacity: usize,
    next_seq: u64,
    pending: Option<LoadTicket>,
    loading: Vec<Message>,
    sent_unechoed: VecDeque<Message>,
    live_unclaimed: VecDeque<Message>,
}

impl MessageStream {
    /// Creates an empty stream. Each inactive conversation keeps at most
    /// `stash_capacity` messages.
    #[must_use]
    pub fn new(stash_capacity: usize) -> Self {
        Self {
            active: None,
            buffer: Vec::new(),
            stash: HashMap::new(),
            stash_capacity,
            next_seq: 0,
            pending: None,
            loading: Vec::new(),
            sent_unechoed: VecDeque::new(),
            live_unclaimed: VecDeque::new(),
        }
    }

    /// Makes `id` the active conversation.
    ///
    /// Switching conversations discards the old buffer, cancels any pending
    /// load and seeds the new buffer with the messages stashed for `id`.
    /// Activating the already active conversation keeps its buffer.
    pub fn activate(&mut self, id: &ConversationId) {
        if self.active.as_ref() == Some(id) {
            return;
        }
        self.buffer = self.stash.remove(id).map(Vec::from).unwrap_or_default();
        self.cancel_pending();
        self.sent_unechoed.clear();
        self.live_unclaimed.clear();
        tracing::debug!(
            conversation_id = %id,
            stashed = self.buffer.len(),
            "message stream activated"
        );
        self.active = Some(id.clone());
    }

    /// Drops the active conversation and every stashed message.
    pub fn clear(&mut self) {
        self.active = None;
        self.buffer.clear();
        self.stash.clear();
        self.pending = None;
        self.loading.clear();
        self.sent_unechoed.clear();
        self.live_unclaimed.clear();
    }

    /// The active conversation, if any.
    #[must_use]
    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Messages of the active conversation in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.buffer
    }

    /// Number of messages stashed for an inactive conversation.
    #[must_use]
    pub fn stashed_count(&self, id: &ConversationId) -> usize {
        self.stash.get(id).map_or(0, VecDeque::len)
    }

    /// Conversation of the load in flight, if any.
    #[must_use]
    pub fn loading(&self) -> Option<&ConversationId> {
        self.pending.as_ref().map(LoadTicket::conversation_id)
    }

    /// Starts a history load for `id`.
    ///
    /// The active conversation and its buffer are left alone until the
    /// load is applied. Any earlier ticket becomes stale.
    pub fn begin_load(&mut self, id: &ConversationId) -> LoadTicket {
        if self.loading() != Some(id) {
            self.cancel_pending();
        }
        self.next_seq = self.next_seq.wrapping_add(1);
        let ticket = LoadTicket {
            conversation_id: id.clone(),
            seq: self.next_seq,
        };
        self.pending = Some(ticket.clone());
        ticket
    }

    /// Gives up on `ticket` after its request failed.
    ///
    /// The active conversation is unchanged. Live messages held for the
    /// abandoned conversation move to its stash.
    pub fn abandon_load(&mut self, ticket: &LoadTicket) {
        if self.pending.as_ref() == Some(ticket) {
            self.cancel_pending();
            tracing::debug!(
                conversation_id = %ticket.conversation_id,
                seq = ticket.seq,
                "history load abandoned"
            );
        }
    }

    /// Applies a fetched history for `ticket` and makes its conversation
    /// the active one.
    ///
    /// Returns the resulting buffer length.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::StaleResponse`] if the load was cancelled by a
    /// switch or overtaken by a newer load; the buffer is unchanged.
    pub fn apply_load(
        &mut self,
        ticket: &LoadTicket,
        history: Vec<Message>,
    ) -> Result<usize, ChatError> {
        if self.pending.as_ref() != Some(ticket) {
            tracing::debug!(
                conversation_id = %ticket.conversation_id,
                seq = ticket.seq,
                "discarding stale history response"
            );
            return Err(ChatError::StaleResponse {
                conversation_id: ticket.conversation_id.clone(),
            });
        }
        self.pending = None;
        let held = std::mem::take(&mut self.loading);
        self.activate(&ticket.conversation_id);

        let mut live = std::mem::replace(&mut self.buffer, history);
        live.extend(held);
        let history_len = self.buffer.len();
        let mut claimed = vec![false; history_len];
        for message in live {
            if !self.claim_in_history(&message, &mut claimed) {
                self.buffer.push(message);
            }
        }
        tracing::debug!(
            conversation_id = %ticket.conversation_id,
            total = self.buffer.len(),
            carried = self.buffer.len().saturating_sub(history_len),
            "history applied"
        );
        Ok(self.buffer.len())
    }

    /// Routes a live message to the active buffer, the load in flight or
    /// the stash.
    pub fn on_live_message(&mut self, message: Message) -> LiveOutcome {
        if self.active.as_ref() != Some(message.conversation_id()) {
            return self.hold_inactive(message);
        }
        if message.id().is_none() {
            if take_matching(&mut self.sent_unechoed, &message) {
                return LiveOutcome::Duplicate;
            }
            remember(&mut self.live_unclaimed, &message);
        } else if self.buffer.iter().any(|m| m.is_same_message(&message)) {
            return LiveOutcome::Duplicate;
        }
        self.buffer.push(message);
        LiveOutcome::Appended
    }

    /// Applies a message the backend confirmed after a send.
    ///
    /// The socket echo of the same message may already have been applied;
    /// in that case this is a no-op. An echo arriving later is ignored.
    pub fn append_sent(&mut self, message: Message) -> LiveOutcome {
        let active = self.active.as_ref() == Some(message.conversation_id());
        let outcome = if active && message.id().is_none() {
            if take_matching(&mut self.live_unclaimed, &message) {
                LiveOutcome::Duplicate
            } else {
                remember(&mut self.sent_unechoed, &message);
                self.buffer.push(message);
                LiveOutcome::Appended
            }
        } else {
            self.on_live_message(message)
        };
        if outcome == LiveOutcome::Duplicate {
            tracing::trace!("sent message already delivered by the live channel");
        }
        outcome
    }

    fn cancel_pending(&mut self) {
        self.pending = None;
        for message in std::mem::take(&mut self.loading) {
            self.stash_message(message);
        }
    }

    /// Marks the history entry matching `message` as claimed. Id-less
    /// messages pair with at most one entry each.
    fn claim_in_history(&self, message: &Message, claimed: &mut [bool]) -> bool {
        if message.id().is_some() {
            return self.buffer.iter().any(|h| h.is_same_message(message));
        }
        let found = self
            .buffer
            .iter()
            .zip(claimed.iter())
            .position(|(h, taken)| !taken && h.has_same_content(message));
        match found.and_then(|index| claimed.get_mut(index)) {
            Some(slot) => {
                *slot = true;
                true
            }
            None => false,
        }
    }

    fn hold_inactive(&mut self, message: Message) -> LiveOutcome {
        if self.loading() == Some(message.conversation_id()) {
            let duplicate = message.id().is_some()
                && self.loading.iter().any(|m| m.is_same_message(&message));
            if duplicate {
                return LiveOutcome::Duplicate;
            }
            self.loading.push(message);
            return LiveOutcome::Stashed;
        }
        self.stash_message(message)
    }

    fn stash_message(&mut self, message: Message) -> LiveOutcome {
        if self.stash_capacity == 0 {
            tracing::debug!(
                conversation_id = %message.conversation_id(),
                "stash disabled; dropping message for inactive conversation"
            );
            return LiveOutcome::Dropped;
        }
        let queue = self
            .stash
            .entry(message.conversation_id().clone())
            .or_default();
        if queue.iter().any(|m| m.is_same_message(&message)) {
            return LiveOutcome::Duplicate;
        }
        queue.push_back(message);
        while queue.len() > self.stash_capacity {
            if let Some(evicted) = queue.pop_front() {
                tracing::debug!(
                    conversation_id = %evicted.conversation_id(),
                    "stash full; evicted oldest message"
                );
            }
        }
        LiveOutcome::Stashed
    }
}

fn take_matching(queue: &mut VecDeque<Message>, message: &Message) -> bool {
    match queue.iter().position(|m| m.has_same_content(message)) {
        Some(index) => queue.remove(index).is_some(),
        None => false,
    }
}

fn remember(queue: &mut VecDeque<Message>, message: &Message) {
    queue.push_back(message.clone());
    while queue.len() > ECHO_WINDOW {
        queue.pop_front();
    }
}
