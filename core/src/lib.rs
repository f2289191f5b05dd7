//! RaiderHub Core Library
//!
//! Client-side core for the RaiderHub companion platform.
//! Provides: presence and messaging sync, socket and REST clients,
//! local storage, and models.

pub mod conversation;
pub mod error;
pub mod events;
pub mod models;
pub mod network;
pub mod presence;
pub mod resources;
pub mod storage;
pub mod store;
pub mod typing;
pub mod upload;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub use error::*;
pub use events::{ClientEvent, ServerEvent};
pub use models::*;
pub use network::*;
pub use storage::*;
pub use store::{Action, Effect, SyncStore};

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    /// Socket gateway; derived from `api_url` when unset.
    pub ws_url: Option<String>,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
    pub typing_idle: Duration,
    pub notifications: NotificationConfig,
}

/// What happens to failures the user did not directly ask about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Queue a [`Notice`] for failed background calls. Failures are always logged.
    pub surface_errors: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            surface_errors: true,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            ws_url: None,
            request_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            typing_idle: typing::TYPING_IDLE_TIMEOUT,
            notifications: NotificationConfig::default(),
        }
    }

    pub fn http_url(&self) -> &str {
        &self.api_url
    }

    pub fn ws_url(&self) -> Result<Url> {
        if let Some(ws) = &self.ws_url {
            return Ok(Url::parse(ws)?);
        }

        let mut url = Url::parse(&self.api_url)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| Error::InvalidUrl(self.api_url.clone()))?;
        url.set_path("/ws");
        url.set_query(None);
        Ok(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-facing notification (the toast of the web client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Main client instance
///
/// Owns the [`SyncStore`] and performs the effects it asks for. Inbound
/// socket events are received by the caller from the channel returned by
/// [`RaiderClient::connect`] and handed back through
/// [`RaiderClient::handle_event`].
pub struct RaiderClient {
    config: ClientConfig,
    api: Arc<ApiClient>,
    storage: Arc<LocalStorage>,
    ws: Option<WebSocketClient>,
    store: SyncStore,
    typing: typing::TypingDebouncer,
    notices: VecDeque<Notice>,
}

impl RaiderClient {
    /// Create new client instance, restoring a stored session if present.
    pub fn new(config: ClientConfig, storage: Arc<LocalStorage>) -> Result<Self> {
        let api = Arc::new(ApiClient::new(&config)?);
        let typing = typing::TypingDebouncer::new(config.typing_idle);

        let mut client = Self {
            config,
            api,
            storage,
            ws: None,
            store: SyncStore::new(),
            typing,
            notices: VecDeque::new(),
        };

        if let Some(session) = client.storage.get_session()? {
            tracing::info!(user = %session.user.username, "Restored session");
            client.apply_session(session);
        }

        Ok(client)
    }

    fn apply_session(&mut self, session: AuthSession) {
        self.api.set_token(Some(session.token));
        self.store.apply(Action::SetCurrentUser(Some(session.user)));
    }

    pub fn start_session(&mut self, session: AuthSession) -> Result<()> {
        self.storage.save_session(&session)?;
        self.apply_session(session);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        if let Some(ws) = self.ws.take() {
            ws.disconnect();
        }
        self.api.set_token(None);
        self.store = SyncStore::new();
        self.storage.clear_session()?;
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn store(&self) -> &SyncStore {
        &self.store
    }

    pub fn current_user(&self) -> Result<&CurrentUser> {
        self.store.current_user().ok_or(Error::NotLoggedIn)
    }

    pub fn is_connected(&self) -> bool {
        self.ws.as_ref().is_some_and(WebSocketClient::is_connected)
    }

    /// Open the socket. Events must be passed to [`Self::handle_event`].
    pub fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<ServerEvent>> {
        let token = self.storage.get_session()?.map(|s| s.token);
        if token.is_none() {
            return Err(Error::NotLoggedIn);
        }

        if let Some(old) = self.ws.take() {
            old.disconnect();
        }

        let (ws, events) = WebSocketClient::spawn(self.config.ws_url()?, token, self.config.reconnect_delay);
        self.ws = Some(ws);
        Ok(events)
    }

    pub fn disconnect(&mut self) {
        if let Some(ws) = self.ws.take() {
            ws.disconnect();
        }
    }

    pub async fn handle_event(&mut self, event: ServerEvent) {
        tracing::debug!(event = event.name(), "Socket event");
        self.dispatch(Action::Server(event)).await;
    }

    /// Apply an action and carry out every effect it produces, including
    /// effects of follow-up actions.
    pub async fn dispatch(&mut self, action: Action) {
        let mut pending: VecDeque<Effect> = self.store.apply(action).into();

        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::Emit(event) => self.emit(event),
                Effect::ReloadConversations => {
                    let loaded = self.api.list_conversations().await;
                    match loaded {
                        Ok(list) => pending.extend(self.store.apply(Action::ConversationsLoaded(list))),
                        Err(e) => self.report("Failed to load conversations", &e),
                    }
                }
                Effect::LoadMessages { peer_id } => {
                    let loaded = self.api.get_messages(&peer_id).await;
                    match loaded {
                        Ok(messages) => {
                            pending.extend(self.store.apply(Action::MessagesLoaded { peer_id, messages }))
                        }
                        Err(e) => self.report("Failed to load messages", &e),
                    }
                }
            }
        }
    }

    fn emit(&mut self, event: ClientEvent) {
        match &self.ws {
            Some(ws) => {
                if let Err(e) = ws.emit(event) {
                    tracing::debug!(error = %e, "Socket emit skipped");
                }
            }
            None => tracing::debug!("Socket emit skipped: no connection"),
        }
    }

    fn report(&mut self, context: &str, err: &Error) {
        tracing::warn!(error = %err, "{}", context);
        self.notify(NoticeLevel::Error, format!("{}: {}", context, err));
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        if self.config.notifications.surface_errors {
            self.notices.push_back(Notice { level, message });
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // ============= Conversations =============

    pub async fn reload_conversations(&mut self) -> Result<()> {
        let list = self.api.list_conversations().await?;
        self.dispatch(Action::ConversationsLoaded(list)).await;
        Ok(())
    }

    pub async fn open_conversation(&mut self, peer: UserRef) -> Result<()> {
        self.stop_typing();
        self.storage.set_selected_chat(Some(&peer.id))?;
        self.dispatch(Action::OpenConversation(peer)).await;
        Ok(())
    }

    pub async fn close_conversation(&mut self) -> Result<()> {
        self.stop_typing();
        self.storage.set_selected_chat(None)?;
        self.dispatch(Action::CloseConversation).await;
        Ok(())
    }

    /// Send to the open peer over the socket, or over HTTP while disconnected.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let content = text.trim();
        if content.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let peer_id = self
            .store
            .open_peer_id()
            .ok_or(Error::NoOpenConversation)?
            .to_string();

        self.stop_typing();

        let event = ClientEvent::SendMessage {
            receiver_id: peer_id.clone(),
            content: content.to_string(),
        };
        let delivered = match &self.ws {
            Some(ws) => ws.deliver(event).await,
            None => Err(Error::NotConnected),
        };
        match delivered {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Socket send failed, using HTTP");
                self.notify(NoticeLevel::Info, "Offline: message sent over HTTP".to_string());
            }
        }

        let message = self.api.send_message(&peer_id, content).await?;
        self.dispatch(Action::Server(ServerEvent::MessageSent(message))).await;
        Ok(())
    }

    pub async fn mark_read(&mut self, message_id: &str) -> Result<()> {
        if let Some(ws) = &self.ws {
            let event = ClientEvent::MarkMessageRead {
                message_id: message_id.to_string(),
            };
            match ws.deliver(event).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!(error = %e, "Socket receipt failed, using HTTP"),
            }
        }
        self.api.mark_read(message_id).await
    }

    // ============= Typing =============

    pub fn key_pressed(&mut self) {
        let Some(peer_id) = self.store.open_peer_id().map(str::to_string) else {
            return;
        };
        if let Some(ws) = self.ws.as_ref().filter(|ws| ws.is_connected()) {
            let outbound = ws.outbound();
            self.typing.keystroke(&peer_id, &outbound);
        }
    }

    pub fn stop_typing(&mut self) {
        if let Some(ws) = &self.ws {
            let outbound = ws.outbound();
            self.typing.stop(&outbound);
        }
    }

    // ============= Friends =============

    /// Friend list with live presence from the socket layered on top.
    pub async fn friends(&mut self) -> Result<Vec<Friend>> {
        let mut friends = self.api.list_friends().await?;
        for friend in &mut friends {
            friend.status = Some(self.store.friend_status(&friend.id));
        }
        Ok(friends)
    }
}
