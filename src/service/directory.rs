//! Conversation directory: the role-scoped list of conversations.

use chrono::{DateTime, Utc};

use crate::api::ChatBackend;
use crate::domain::{
    Capability, Conversation, ConversationId, ConversationPolicy, ConversationStatus,
};
use crate::error::ChatError;

/// Status filter applied on top of the loaded working set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// Every status.
    #[default]
    All,
    /// Only conversations in this status.
    Only(ConversationStatus),
}

impl StatusFilter {
    /// Parses `"all"` or a status name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        ConversationStatus::parse(raw).map(Self::Only)
    }

    /// Returns `true` if `status` passes the filter.
    #[must_use]
    pub fn accepts(self, status: ConversationStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == status,
        }
    }
}

/// Conversations visible to the session, with client-side search and
/// status filtering.
///
/// Every [`ConversationDirectory::load`] replaces the working set; search
/// and filter are recomputed from it on every call to
/// [`ConversationDirectory::visible`].
#[derive(Debug, Clone)]
pub struct ConversationDirectory {
    capability: Capability,
    conversations: Vec<Conversation>,
    search: String,
    status_filter: StatusFilter,
    loaded_at: Option<DateTime<Utc>>,
}

impl ConversationDirectory {
    /// Creates an empty directory scoped by `capability`.
    #[must_use]
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            conversations: Vec::new(),
            search: String::new(),
            status_filter: StatusFilter::All,
            loaded_at: None,
        }
    }

    /// Capability the directory lists with.
    #[must_use]
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Fetches the conversations visible to the session and replaces the
    /// working set, most recently created first.
    ///
    /// Customers get their own conversations, support staff get all of them.
    /// Returns the number of conversations loaded.
    ///
    /// # Errors
    ///
    /// Propagates the backend error; the previous working set is kept.
    pub async fn load<B: ChatBackend>(&mut self, backend: &B) -> Result<usize, ChatError> {
        let conversations = match &self.capability {
            Capability::Customer(view) => {
                let own = backend.list_own_conversations(view).await?;
                view.retain_own(own)
            }
            Capability::Support(view) => backend.list_all_conversations(view).await?,
        };
        self.replace(conversations);
        tracing::debug!(
            count = self.conversations.len(),
            support = self.capability.is_support(),
            "conversation directory loaded"
        );
        Ok(self.conversations.len())
    }

    /// Replaces the working set with `conversations`, sorted by creation
    /// time descending. The sort is stable, so equal timestamps keep the
    /// backend order.
    pub fn replace(&mut self, mut conversations: Vec<Conversation>) {
        sort_newest_first(&mut conversations);
        self.conversations = conversations;
        self.loaded_at = Some(Utc::now());
    }

    /// Inserts or replaces a single conversation, keeping the order.
    pub fn upsert(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id() != conversation.id());
        self.conversations.push(conversation);
        sort_newest_first(&mut self.conversations);
    }

    /// Applies a status change the backend has confirmed.
    ///
    /// Returns `Ok(false)` when the conversation is not in the working set.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidTransition`] if `policy` forbids the
    /// change; the stored conversation is unchanged.
    pub fn apply_status(
        &mut self,
        id: &ConversationId,
        status: ConversationStatus,
        at: DateTime<Utc>,
        policy: &ConversationPolicy,
    ) -> Result<bool, ChatError> {
        match self.conversations.iter_mut().find(|c| c.id() == id) {
            Some(conversation) => {
                conversation.transition_to(status, at, policy)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Sets the participant search term. Matching is case-insensitive.
    pub fn search(&mut self, term: impl Into<String>) {
        self.search = term.into().trim().to_lowercase();
    }

    /// Sets the status filter.
    pub fn filter_by_status(&mut self, filter: StatusFilter) {
        self.status_filter = filter;
    }

    /// Current search term (lowercased).
    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search
    }

    /// Current status filter.
    #[must_use]
    pub const fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    /// Conversations passing both the search term and the status filter.
    #[must_use]
    pub fn visible(&self) -> Vec<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| self.status_filter.accepts(c.status()))
            .filter(|c| self.search.is_empty() || c.matches_participant(&self.search))
            .collect()
    }

    /// The whole working set, ignoring search and filter.
    #[must_use]
    pub fn all(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Looks up a conversation in the working set.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id() == id)
    }

    /// First open conversation the session user takes part in.
    #[must_use]
    pub fn open_conversation_of_user(&self) -> Option<&Conversation> {
        let user_id = self.capability.user_id();
        self.conversations
            .iter()
            .find(|c| c.status().is_open() && c.has_participant(user_id))
    }

    /// When the working set was last replaced.
    #[must_use]
    pub const fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

fn sort_newest_first(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::api::{ChatStore, InMemoryBackend};
    use crate::domain::{Identity, Participant};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn conversation(id: &str, owner: &str, created: i64) -> Conversation {
        Conversation::new(
            ConversationId::from(id),
            vec![Participant::from_id(owner)],
            at(created),
        )
    }

    fn support_directory() -> ConversationDirectory {
        ConversationDirectory::new(Capability::for_identity(&Identity::admin("root")))
    }

    fn ids(list: &[&Conversation]) -> Vec<String> {
        list.iter().map(|c| c.id().to_string()).collect()
    }

    async fn seeded_store() -> Arc<ChatStore> {
        let store = Arc::new(ChatStore::default());
        store.insert_conversation(conversation("t1", "alice", 1)).await;
        store.insert_conversation(conversation("t3", "alice", 3)).await;
        store.insert_conversation(conversation("t2", "alice", 2)).await;
        store
            .insert_conversation(
                conversation("b1", "bob", 4).with_status(ConversationStatus::Closed),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn customer_load_is_sorted_newest_first() {
        let store = seeded_store().await;
        let alice = Identity::customer("alice");
        let backend = InMemoryBackend::new(store, alice.clone());
        let mut dir = ConversationDirectory::new(Capability::for_identity(&alice));

        let Ok(count) = dir.load(&backend).await else {
            panic!("load failed");
        };
        assert_eq!(count, 3);
        assert_eq!(ids(&dir.visible()), ["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn customer_never_sees_other_users() {
        let store = seeded_store().await;
        let bob = Identity::customer("bob");
        let backend = InMemoryBackend::new(Arc::clone(&store), bob.clone());
        let mut dir = ConversationDirectory::new(Capability::for_identity(&bob));

        assert!(dir.load(&backend).await.is_ok());
        assert_eq!(ids(&dir.visible()), ["b1"]);
        assert_eq!(store.call_count("list_all_conversations").await, 0);
    }

    #[tokio::test]
    async fn support_lists_everything_via_all_endpoint() {
        let store = seeded_store().await;
        let admin = Identity::admin("root");
        let backend = InMemoryBackend::new(Arc::clone(&store), admin.clone());
        let mut dir = ConversationDirectory::new(Capability::for_identity(&admin));

        assert!(dir.load(&backend).await.is_ok());
        assert_eq!(ids(&dir.visible()), ["b1", "t3", "t2", "t1"]);
        assert_eq!(store.call_count("list_all_conversations").await, 1);
        assert_eq!(store.call_count("list_own_conversations").await, 0);
    }

    #[test]
    fn search_and_filter_compose() {
        let mut dir = support_directory();
        dir.replace(vec![
            conversation("c1", "Alice-01", 1),
            conversation("c2", "bob", 2).with_status(ConversationStatus::Closed),
            conversation("c3", "alice-02", 3).with_status(ConversationStatus::Closed),
            conversation("c4", "alice-03", 4).with_status(ConversationStatus::Waiting),
        ]);

        dir.search("ALICE");
        assert_eq!(ids(&dir.visible()), ["c4", "c3", "c1"]);

        dir.filter_by_status(StatusFilter::Only(ConversationStatus::Closed));
        assert_eq!(ids(&dir.visible()), ["c3"]);

        dir.search("");
        assert_eq!(ids(&dir.visible()), ["c3", "c2"]);

        dir.filter_by_status(StatusFilter::All);
        assert_eq!(dir.visible().len(), 4);
    }

    #[test]
    fn fresh_load_replaces_working_set() {
        let mut dir = support_directory();
        dir.replace(vec![conversation("old", "u1", 1)]);
        dir.replace(vec![conversation("new", "u2", 2)]);
        assert!(dir.get(&ConversationId::from("old")).is_none());
        assert_eq!(dir.all().len(), 1);
    }

    #[test]
    fn equal_timestamps_keep_backend_order() {
        let mut dir = support_directory();
        dir.replace(vec![
            conversation("first", "u1", 5),
            conversation("second", "u2", 5),
            conversation("newer", "u3", 6),
        ]);
        assert_eq!(ids(&dir.visible()), ["newer", "first", "second"]);
    }

    #[test]
    fn apply_status_mirrors_and_validates() {
        let mut dir = support_directory();
        dir.replace(vec![conversation("c1", "u1", 1)]);
        let policy = ConversationPolicy::default();
        let id = ConversationId::from("c1");

        assert!(matches!(
            dir.apply_status(&id, ConversationStatus::Closed, at(10), &policy),
            Ok(true)
        ));
        assert!(matches!(
            dir.apply_status(&id, ConversationStatus::Active, at(11), &policy),
            Err(ChatError::InvalidTransition { .. })
        ));
        assert_eq!(
            dir.get(&id).map(Conversation::status),
            Some(ConversationStatus::Closed)
        );
        let unknown = ConversationId::from("nope");
        assert!(matches!(
            dir.apply_status(&unknown, ConversationStatus::Closed, at(12), &policy),
            Ok(false)
        ));
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(StatusFilter::parse("ALL"), Some(StatusFilter::All));
        assert_eq!(
            StatusFilter::parse("waiting"),
            Some(StatusFilter::Only(ConversationStatus::Waiting))
        );
        assert_eq!(StatusFilter::parse("archived"), None);
    }
}
