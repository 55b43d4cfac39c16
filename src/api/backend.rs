//! The REST seam between the chat core and the storefront backend.

use std::future::Future;

use crate::domain::{Conversation, ConversationId, CustomerView, Message, SupportView};
use crate::error::ChatError;

/// Request/response operations the chat core needs from the backend.
///
/// Implemented over HTTP by [`super::HttpChatBackend`] and in process by
/// [`super::InMemoryBackend`]. Listing calls take the capability view as a
/// witness, so the system-wide listing can only be requested by a session
/// that holds a [`SupportView`].
pub trait ChatBackend {
    /// `POST /conversations/start`: open a conversation for the caller, or
    /// return the caller's existing open one.
    fn start_conversation(&self) -> impl Future<Output = Result<Conversation, ChatError>> + Send;

    /// `PUT /conversations/close/{id}`.
    fn close_conversation(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;

    /// `GET /conversations`: the caller's own conversations.
    fn list_own_conversations(
        &self,
        view: &CustomerView,
    ) -> impl Future<Output = Result<Vec<Conversation>, ChatError>> + Send;

    /// `GET /conversations/all`: every conversation in the system.
    fn list_all_conversations(
        &self,
        view: &SupportView,
    ) -> impl Future<Output = Result<Vec<Conversation>, ChatError>> + Send;

    /// `PUT /messages/{id}/read`: mark every message of the conversation read.
    fn mark_read(&self, id: &ConversationId) -> impl Future<Output = Result<(), ChatError>> + Send;

    /// `POST /messages`: post a message and return the stored copy.
    fn send_message(
        &self,
        id: &ConversationId,
        content: &str,
    ) -> impl Future<Output = Result<Message, ChatError>> + Send;

    /// `GET /messages/{id}`: full history of a conversation.
    fn fetch_messages(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>, ChatError>> + Send;
}
