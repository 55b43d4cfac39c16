//! Conversation lifecycle: start, end and read receipts.

use chrono::Utc;

use super::directory::ConversationDirectory;
use crate::api::ChatBackend;
use crate::domain::{Conversation, ConversationId, ConversationPolicy, ConversationStatus};
use crate::error::ChatError;

/// Issues lifecycle requests and mirrors confirmed results into the
/// directory.
///
/// Local state changes only after the backend confirmed the request.
#[derive(Debug, Clone, Default)]
pub struct LifecycleController {
    policy: ConversationPolicy,
}

impl LifecycleController {
    /// Creates a controller applying `policy`.
    #[must_use]
    pub const fn new(policy: ConversationPolicy) -> Self {
        Self { policy }
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &ConversationPolicy {
        &self.policy
    }

    /// Starts a conversation for the caller, or returns the one the backend
    /// already has open for them.
    ///
    /// With `reuse_open_conversation`, a customer's open conversation known
    /// locally is returned without a request.
    ///
    /// # Errors
    ///
    /// Propagates backend errors. Returns [`ChatError::InvalidTransition`]
    /// when the backend hands back an open snapshot of a conversation known
    /// to be closed and reopening is not allowed.
    pub async fn start<B: ChatBackend>(
        &self,
        backend: &B,
        directory: &mut ConversationDirectory,
    ) -> Result<Conversation, ChatError> {
        if self.policy.reuse_open_conversation
            && !directory.capability().is_support()
            && let Some(open) = directory.open_conversation_of_user()
        {
            tracing::debug!(conversation_id = %open.id(), "reusing open conversation");
            return Ok(open.clone());
        }

        let conversation = backend.start_conversation().await?;
        if let Some(known) = directory.get(conversation.id()) {
            let from = known.status();
            let to = conversation.status();
            if from != to && !from.can_transition_to(to, &self.policy) {
                tracing::warn!(
                    conversation_id = %conversation.id(),
                    %from,
                    %to,
                    "backend returned a reopened conversation"
                );
                return Err(ChatError::InvalidTransition {
                    conversation_id: conversation.id().clone(),
                    from,
                    to,
                });
            }
        }
        tracing::info!(
            conversation_id = %conversation.id(),
            status = %conversation.status(),
            "conversation started"
        );
        directory.upsert(conversation.clone());
        Ok(conversation)
    }

    /// Closes a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidTransition`] without sending a request
    /// when the conversation is known to be closed already. Backend errors
    /// are propagated and leave the directory unchanged.
    pub async fn end<B: ChatBackend>(
        &self,
        backend: &B,
        directory: &mut ConversationDirectory,
        id: &ConversationId,
    ) -> Result<(), ChatError> {
        if let Some(known) = directory.get(id) {
            let from = known.status();
            if !from.can_transition_to(ConversationStatus::Closed, &self.policy) {
                return Err(ChatError::InvalidTransition {
                    conversation_id: id.clone(),
                    from,
                    to: ConversationStatus::Closed,
                });
            }
        }

        backend.close_conversation(id).await?;
        directory.apply_status(id, ConversationStatus::Closed, Utc::now(), &self.policy)?;
        tracing::info!(conversation_id = %id, "conversation closed");
        Ok(())
    }

    /// Marks every message of the conversation read on the backend.
    ///
    /// Nothing changes locally; the next history load reflects the flags.
    ///
    /// # Errors
    ///
    /// Propagates the backend error.
    pub async fn mark_read<B: ChatBackend>(
        &self,
        backend: &B,
        id: &ConversationId,
    ) -> Result<(), ChatError> {
        backend.mark_read(id).await?;
        tracing::debug!(conversation_id = %id, "conversation marked read");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::{ChatStore, InMemoryBackend};
    use crate::domain::{Capability, Identity, Message, Participant};

    fn setup(identity: &Identity) -> (Arc<ChatStore>, InMemoryBackend, ConversationDirectory) {
        let store = Arc::new(ChatStore::default());
        let backend = InMemoryBackend::new(Arc::clone(&store), identity.clone());
        let directory = ConversationDirectory::new(Capability::for_identity(identity));
        (store, backend, directory)
    }

    #[tokio::test]
    async fn start_creates_and_lists_conversation() {
        let alice = Identity::customer("alice");
        let (store, backend, mut directory) = setup(&alice);
        let controller = LifecycleController::default();

        let Ok(conversation) = controller.start(&backend, &mut directory).await else {
            panic!("start failed");
        };
        assert_eq!(conversation.status(), ConversationStatus::Active);
        assert!(directory.get(conversation.id()).is_some());
        assert_eq!(store.call_count("start_conversation").await, 1);
    }

    #[tokio::test]
    async fn end_on_closed_conversation_sends_nothing() {
        let alice = Identity::customer("alice");
        let (store, backend, mut directory) = setup(&alice);
        let closed = Conversation::new(
            ConversationId::from("c1"),
            vec![Participant::from_id("alice")],
            Utc::now(),
        )
        .with_status(ConversationStatus::Closed);
        store.insert_conversation(closed.clone()).await;
        directory.upsert(closed);

        let controller = LifecycleController::default();
        let result = controller
            .end(&backend, &mut directory, &ConversationId::from("c1"))
            .await;
        assert!(matches!(result, Err(ChatError::InvalidTransition { .. })));
        assert_eq!(store.call_count("close_conversation").await, 0);
    }

    #[tokio::test]
    async fn end_mirrors_closed_status() {
        let alice = Identity::customer("alice");
        let (store, backend, mut directory) = setup(&alice);
        let controller = LifecycleController::default();
        let Ok(conversation) = controller.start(&backend, &mut directory).await else {
            panic!("start failed");
        };

        assert!(
            controller
                .end(&backend, &mut directory, conversation.id())
                .await
                .is_ok()
        );
        assert_eq!(
            directory.get(conversation.id()).map(Conversation::status),
            Some(ConversationStatus::Closed)
        );
        let stored = store.conversation(conversation.id()).await;
        assert_eq!(stored.as_ref().map(Conversation::status), Some(ConversationStatus::Closed));
    }

    #[tokio::test]
    async fn failed_end_leaves_local_state() {
        let alice = Identity::customer("alice");
        let (_store, backend, mut directory) = setup(&alice);
        // Known locally but unknown to the backend.
        let ghost = Conversation::new(
            ConversationId::from("ghost"),
            vec![Participant::from_id("alice")],
            Utc::now(),
        );
        directory.upsert(ghost);

        let result = LifecycleController::default()
            .end(&backend, &mut directory, &ConversationId::from("ghost"))
            .await;
        assert_eq!(result.err().and_then(|e| e.status()), Some(404));
        assert_eq!(
            directory
                .get(&ConversationId::from("ghost"))
                .map(Conversation::status),
            Some(ConversationStatus::Active)
        );
    }

    #[tokio::test]
    async fn reuse_policy_skips_the_request() {
        let alice = Identity::customer("alice");
        let (store, backend, mut directory) = setup(&alice);
        let controller = LifecycleController::new(ConversationPolicy {
            allow_reopen: false,
            reuse_open_conversation: true,
        });

        let Ok(first) = controller.start(&backend, &mut directory).await else {
            panic!("start failed");
        };
        let Ok(second) = controller.start(&backend, &mut directory).await else {
            panic!("start failed");
        };
        assert_eq!(first.id(), second.id());
        assert_eq!(store.call_count("start_conversation").await, 1);
    }

    #[tokio::test]
    async fn mark_read_updates_backend_only() {
        let admin = Identity::admin("root");
        let alice = Identity::customer("alice");
        let (store, _backend, _directory) = setup(&admin);
        let customer = InMemoryBackend::new(Arc::clone(&store), alice);
        let Ok(conversation) = customer.store().start_conversation(customer.caller()).await else {
            panic!("start failed");
        };
        assert!(
            store
                .post_message(customer.caller(), conversation.id(), "hi")
                .await
                .is_ok()
        );

        let support = InMemoryBackend::new(Arc::clone(&store), admin);
        assert!(
            LifecycleController::default()
                .mark_read(&support, conversation.id())
                .await
                .is_ok()
        );
        let messages = store.messages_of(conversation.id()).await;
        assert!(messages.iter().all(Message::is_read));
    }
}
