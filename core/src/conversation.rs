//! Conversation list and the open-conversation view model.

use crate::models::{Conversation, ConversationKey, LastMessage, Message, UserRef};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
}

/// The conversation currently on screen.
#[derive(Debug, Clone)]
pub struct OpenConversation {
    pub peer: UserRef,
    pub key: ConversationKey,
    pub state: LoadState,
    messages: Vec<Message>,
    typing: HashSet<String>,
}

impl OpenConversation {
    pub fn new(peer: UserRef, key: ConversationKey) -> Self {
        // Nothing to fetch for a thread the server does not know about yet.
        let state = if key.is_pending() {
            LoadState::Loaded
        } else {
            LoadState::Loading
        };

        Self {
            peer,
            key,
            state,
            messages: Vec::new(),
            typing: HashSet::new(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Append unless a message with the same id is already listed.
    pub fn push_unique(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Merge a history fetch with anything that arrived over the socket
    /// while it was in flight.
    pub fn load(&mut self, history: Vec<Message>) {
        let live = std::mem::take(&mut self.messages);
        self.messages = history;
        for msg in live {
            self.push_unique(msg);
        }
        self.messages.sort_by_key(|m| m.created_at);
        self.state = LoadState::Loaded;
    }

    pub fn mark_read(&mut self, message_id: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(msg) => {
                msg.read = true;
                true
            }
            None => false,
        }
    }

    pub fn set_typing(&mut self, user_id: &str, typing: bool) {
        if typing {
            self.typing.insert(user_id.to_string());
        } else {
            self.typing.remove(user_id);
        }
    }

    pub fn is_peer_typing(&self) -> bool {
        self.typing.contains(&self.peer.id)
    }

    pub fn clear_typing(&mut self) {
        self.typing.clear();
    }
}

/// Summary list shown in the sidebar.
#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    entries: Vec<Conversation>,
}

impl ConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Conversation] {
        &self.entries
    }

    pub fn find_by_peer(&self, peer_id: &str) -> Option<&Conversation> {
        self.entries.iter().find(|c| c.peer_id() == peer_id)
    }

    fn find_by_peer_mut(&mut self, peer_id: &str) -> Option<&mut Conversation> {
        self.entries.iter_mut().find(|c| c.peer_id() == peer_id)
    }

    /// Key of the existing thread with `peer`, or a new pending one at the top.
    pub fn ensure(&mut self, peer: &UserRef) -> ConversationKey {
        if let Some(conv) = self.find_by_peer(&peer.id) {
            return conv.key.clone();
        }

        let conv = Conversation::pending(peer.clone());
        let key = conv.key.clone();
        self.entries.insert(0, conv);
        key
    }

    /// Install a server reload.
    ///
    /// Pending entries whose peer now has a confirmed conversation are
    /// dropped; the rest are kept on top until their first round-trip.
    pub fn replace_from_server(&mut self, loaded: Vec<Conversation>) {
        let pending: Vec<Conversation> = self
            .entries
            .drain(..)
            .filter(|c| c.key.is_pending())
            .filter(|c| !loaded.iter().any(|l| l.peer_id() == c.peer_id()))
            .collect();

        self.entries = pending;
        self.entries.extend(loaded);
    }

    /// Update the summary for the thread `message` belongs to.
    pub fn record_message(&mut self, peer_id: &str, message: &Message, count_unread: bool) {
        if let Some(conv) = self.find_by_peer_mut(peer_id) {
            conv.last_message = Some(LastMessage::from(message));
            conv.updated_at = Some(message.created_at);
            if count_unread {
                conv.unread_count += 1;
            }
        }
    }

    pub fn clear_unread(&mut self, peer_id: &str) {
        if let Some(conv) = self.find_by_peer_mut(peer_id) {
            conv.unread_count = 0;
        }
    }

    pub fn total_unread(&self) -> u32 {
        self.entries.iter().map(|c| c.unread_count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, from: &str, to: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            content: format!("msg {}", id),
            read: false,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            is_own: false,
        }
    }

    fn confirmed(id: &str, peer: &str) -> Conversation {
        Conversation {
            key: ConversationKey::confirmed(id),
            other_user: UserRef::new(peer, peer),
            last_message: None,
            unread_count: 0,
            updated_at: None,
        }
    }

    #[test]
    fn test_push_unique_guards_duplicates() {
        let mut open = OpenConversation::new(UserRef::new("bob", "Bob"), ConversationKey::confirmed("c1"));
        assert!(open.push_unique(msg("m1", "bob", "me", 1)));
        assert!(!open.push_unique(msg("m1", "bob", "me", 1)));
        assert_eq!(open.messages().len(), 1);
    }

    #[test]
    fn test_load_merges_live_messages() {
        let mut open = OpenConversation::new(UserRef::new("bob", "Bob"), ConversationKey::confirmed("c1"));
        assert_eq!(open.state, LoadState::Loading);

        open.push_unique(msg("m3", "bob", "me", 3));
        open.load(vec![msg("m1", "bob", "me", 1), msg("m3", "bob", "me", 3)]);

        let ids: Vec<&str> = open.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);
        assert_eq!(open.state, LoadState::Loaded);
    }

    #[test]
    fn test_pending_conversation_starts_loaded() {
        let open = OpenConversation::new(UserRef::new("bob", "Bob"), ConversationKey::pending_for("bob"));
        assert_eq!(open.state, LoadState::Loaded);
    }

    #[test]
    fn test_pending_replaced_on_reload() {
        let mut list = ConversationList::new();
        list.replace_from_server(vec![confirmed("c-ann", "ann")]);

        let key = list.ensure(&UserRef::new("bob", "Bob"));
        assert_eq!(key.to_string(), "temp_bob");
        assert_eq!(list.len(), 2);

        // Second ensure reuses the placeholder.
        assert_eq!(list.ensure(&UserRef::new("bob", "Bob")), key);

        // Reload without bob keeps the placeholder.
        list.replace_from_server(vec![confirmed("c-ann", "ann")]);
        assert!(list.find_by_peer("bob").unwrap().key.is_pending());

        list.replace_from_server(vec![confirmed("c-ann", "ann"), confirmed("c-bob", "bob")]);
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.find_by_peer("bob").unwrap().key,
            ConversationKey::confirmed("c-bob")
        );
    }

    #[test]
    fn test_record_message_and_unread() {
        let mut list = ConversationList::new();
        list.replace_from_server(vec![confirmed("c1", "bob"), confirmed("c2", "ann")]);

        let m = msg("m1", "bob", "me", 5);
        list.record_message("bob", &m, true);
        list.record_message("ann", &msg("m2", "ann", "me", 6), true);
        list.record_message("ann", &msg("m3", "ann", "me", 7), true);

        let bob = list.find_by_peer("bob").unwrap();
        assert_eq!(bob.last_message.as_ref().unwrap().content, "msg m1");
        assert_eq!(list.total_unread(), 3);

        list.clear_unread("ann");
        assert_eq!(list.total_unread(), 1);
    }
}
