//! Messaging and presence store.
//!
//! All state the socket handlers care about lives here and is only changed
//! through [`SyncStore::apply`]. Handlers read the open conversation from the
//! store at the moment an event is applied, so a handler registered once
//! always sees the current selection.
//!
//! `apply` never performs I/O. It returns the [`Effect`]s the caller must
//! carry out (socket emits, HTTP reloads).

use crate::conversation::{ConversationList, OpenConversation};
use crate::events::{ClientEvent, ServerEvent};
use crate::models::{Conversation, CurrentUser, Message, PresenceStatus, UserRef};
use crate::presence::PresenceMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Server(ServerEvent),
    SetCurrentUser(Option<CurrentUser>),
    ConversationsLoaded(Vec<Conversation>),
    OpenConversation(UserRef),
    /// History for `peer_id`; dropped if that peer is no longer open.
    MessagesLoaded { peer_id: String, messages: Vec<Message> },
    CloseConversation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Emit(ClientEvent),
    ReloadConversations,
    LoadMessages { peer_id: String },
}

#[derive(Debug, Default)]
pub struct SyncStore {
    current_user: Option<CurrentUser>,
    connected: bool,
    presence: PresenceMap,
    conversations: ConversationList,
    open: Option<OpenConversation>,
}

impl SyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.current_user.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    pub fn conversations(&self) -> &ConversationList {
        &self.conversations
    }

    pub fn open_conversation(&self) -> Option<&OpenConversation> {
        self.open.as_ref()
    }

    pub fn open_peer_id(&self) -> Option<&str> {
        self.open.as_ref().map(|o| o.peer_id())
    }

    /// Live presence for a friend list entry.
    pub fn friend_status(&self, user_id: &str) -> PresenceStatus {
        self.presence.status_of(user_id)
    }

    fn me(&self) -> &str {
        self.current_user.as_ref().map(|u| u.id.as_str()).unwrap_or_default()
    }

    pub fn apply(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::Server(event) => self.apply_server(event),
            Action::SetCurrentUser(user) => {
                self.current_user = user;
                Vec::new()
            }
            Action::ConversationsLoaded(list) => self.conversations_loaded(list),
            Action::OpenConversation(peer) => self.open(peer),
            Action::MessagesLoaded { peer_id, messages } => {
                let me = self.me().to_string();
                match self.open.as_mut() {
                    Some(open) if open.peer_id() == peer_id => {
                        open.load(messages.into_iter().map(|m| own(m, &me)).collect());
                    }
                    _ => {
                        tracing::debug!(peer = %peer_id, "Dropping history for closed conversation");
                    }
                }
                Vec::new()
            }
            Action::CloseConversation => self.close(),
        }
    }

    fn apply_server(&mut self, event: ServerEvent) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            ServerEvent::ConnectionStatus { connected } => {
                let reconnected = connected && !self.connected;
                self.connected = connected;

                if reconnected {
                    effects.push(Effect::Emit(ClientEvent::GetOnlineUsers));
                    if let Some(open) = &self.open {
                        effects.push(Effect::Emit(join_event(open)));
                        // Messages sent while the socket was down only exist server side.
                        if !open.key.is_pending() {
                            effects.push(Effect::LoadMessages {
                                peer_id: open.peer_id().to_string(),
                            });
                        }
                    }
                }
                if !connected {
                    if let Some(open) = self.open.as_mut() {
                        open.clear_typing();
                    }
                }
            }
            ServerEvent::OnlineUsers(users) => self.presence.replace_all(users),
            ServerEvent::UserOnline(user) => self.presence.set_online(user),
            ServerEvent::UserOffline { user_id } => {
                self.presence.set_offline(&user_id);
            }
            ServerEvent::UserStatusChanged { user_id, status } => {
                self.presence.update_status(&user_id, status);
            }
            ServerEvent::NewMessage(message) => {
                let me = self.me().to_string();
                let message = own(message, &me);
                let peer_id = message.peer_of(&me).to_string();

                match self.open.as_mut() {
                    Some(open) if open.peer_id() == peer_id => {
                        let needs_receipt = !message.is_own && !message.read;
                        let id = message.id.clone();
                        self.conversations.record_message(&peer_id, &message, false);
                        if open.push_unique(message) && needs_receipt {
                            effects.push(Effect::Emit(ClientEvent::MarkMessageRead { message_id: id }));
                        }
                        if open.key.is_pending() {
                            effects.push(Effect::ReloadConversations);
                        }
                    }
                    _ => {
                        self.conversations.record_message(&peer_id, &message, !message.is_own);
                        effects.push(Effect::ReloadConversations);
                    }
                }
            }
            ServerEvent::MessageSent(mut message) => {
                message.is_own = true;
                let peer_id = message.receiver_id.clone();
                self.conversations.record_message(&peer_id, &message, false);

                if let Some(open) = self.open.as_mut() {
                    if open.peer_id() == peer_id {
                        open.push_unique(message);
                        if open.key.is_pending() {
                            effects.push(Effect::ReloadConversations);
                        }
                    }
                }
            }
            ServerEvent::MessageRead { message_id } => {
                if let Some(open) = self.open.as_mut() {
                    open.mark_read(&message_id);
                }
            }
            ServerEvent::UserTyping { user_id } => {
                if let Some(open) = self.open.as_mut() {
                    if open.peer_id() == user_id {
                        open.set_typing(&user_id, true);
                    }
                }
            }
            ServerEvent::UserStoppedTyping { user_id } => {
                if let Some(open) = self.open.as_mut() {
                    if open.peer_id() == user_id {
                        open.set_typing(&user_id, false);
                    }
                }
            }
        }

        effects
    }

    fn open(&mut self, peer: UserRef) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.open_peer_id() == Some(peer.id.as_str()) {
            return effects;
        }
        if let Some(previous) = self.open.take() {
            effects.push(Effect::Emit(leave_event(&previous)));
        }

        let key = self.conversations.ensure(&peer);
        self.conversations.clear_unread(&peer.id);

        let open = OpenConversation::new(peer, key);
        effects.push(Effect::Emit(join_event(&open)));
        if !open.key.is_pending() {
            effects.push(Effect::LoadMessages {
                peer_id: open.peer_id().to_string(),
            });
        }
        self.open = Some(open);

        effects
    }

    fn close(&mut self) -> Vec<Effect> {
        match self.open.take() {
            Some(open) => vec![Effect::Emit(leave_event(&open))],
            None => Vec::new(),
        }
    }

    fn conversations_loaded(&mut self, list: Vec<Conversation>) -> Vec<Effect> {
        self.conversations.replace_from_server(list);

        let Some(open) = self.open.as_mut() else {
            return Vec::new();
        };
        if !open.key.is_pending() {
            return Vec::new();
        }

        match self.conversations.find_by_peer(open.peer_id()) {
            Some(conv) if !conv.key.is_pending() => {
                tracing::debug!(peer = %open.peer_id(), conversation = %conv.key, "Temporary conversation confirmed");
                open.key = conv.key.clone();
                // The placeholder may hide an existing thread opened before the list arrived.
                vec![
                    Effect::Emit(join_event(open)),
                    Effect::LoadMessages {
                        peer_id: open.peer_id().to_string(),
                    },
                ]
            }
            _ => Vec::new(),
        }
    }
}

fn own(mut message: Message, me: &str) -> Message {
    message.is_own = !me.is_empty() && message.sender_id == me;
    message
}

fn join_event(open: &OpenConversation) -> ClientEvent {
    ClientEvent::JoinConversation {
        other_user_id: open.peer_id().to_string(),
        conversation_id: open.key.server_id().map(str::to_string),
    }
}

fn leave_event(open: &OpenConversation) -> ClientEvent {
    ClientEvent::LeaveConversation {
        other_user_id: open.peer_id().to_string(),
        conversation_id: open.key.server_id().map(str::to_string),
    }
}
