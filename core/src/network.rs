//! Network layer for RaiderHub - HTTP API and WebSocket client

use crate::error::{Error, Result};
use crate::events::{ClientEvent, ServerEvent};
use crate::models::*;
use crate::resources::{Filter, Resource};
use crate::ClientConfig;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

// ============================================================================
// HTTP API Client
// ============================================================================

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.http_url().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.lock().is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));

        if let Some(token) = self.token.lock().as_ref() {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), text));
        }

        Ok(resp.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), text));
        }
        Ok(())
    }

    // ============= Messaging =============

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.send(self.request(Method::GET, "/messages/conversations"))
            .await
    }

    /// History with one peer, keyed by the peer's id so it also works for
    /// threads the client only knows as temporary.
    pub async fn get_messages(&self, peer_id: &str) -> Result<Vec<Message>> {
        self.send(self.request(Method::GET, &format!("/messages/conversation/{}", peer_id)))
            .await
    }

    /// HTTP path used when the socket is down.
    pub async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message> {
        let req = self
            .request(Method::POST, "/messages/send")
            .json(&json!({
                "receiverId": receiver_id,
                "content": content
            }));
        self.send(req).await
    }

    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        self.send_empty(self.request(Method::PUT, &format!("/messages/{}/read", message_id)))
            .await
    }

    pub async fn online_users(&self) -> Result<Vec<OnlineUser>> {
        self.send(self.request(Method::GET, "/users/online")).await
    }

    // ============= Friends =============

    /// The backend answers 404 when the user has no friends yet.
    pub async fn list_friends(&self) -> Result<Vec<Friend>> {
        match self.send(self.request(Method::GET, "/friends")).await {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn list_friend_requests(&self) -> Result<Vec<FriendRequest>> {
        match self.send(self.request(Method::GET, "/friends/requests")).await {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn send_friend_request(&self, user_id: &str) -> Result<()> {
        let req = self
            .request(Method::POST, "/friends/request")
            .json(&json!({ "userId": user_id }));
        self.send_empty(req).await
    }

    pub async fn respond_friend_request(&self, request_id: &str, accept: bool) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("/friends/requests/{}", request_id))
            .json(&json!({ "accept": accept }));
        self.send_empty(req).await
    }

    pub async fn remove_friend(&self, friend_id: &str) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/friends/{}", friend_id)))
            .await
    }

    // ============= Generic resources =============

    pub async fn list<R: Resource>(&self, filter: &Filter) -> Result<Vec<R>> {
        let req = self.request(Method::GET, R::PATH).query(filter.pairs());
        self.send(req).await
    }

    pub async fn list_at<R: Resource>(&self, path: &str, filter: &Filter) -> Result<Vec<R>> {
        let req = self.request(Method::GET, path).query(filter.pairs());
        self.send(req).await
    }

    pub async fn create<R: Resource, B: Serialize + ?Sized>(&self, body: &B) -> Result<R> {
        self.send(self.request(Method::POST, R::PATH).json(body)).await
    }

    pub async fn update<R: Resource, B: Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<R> {
        let req = self
            .request(Method::PUT, &format!("{}/{}", R::PATH, id))
            .json(body);
        self.send(req).await
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("{}/{}", R::PATH, id)))
            .await
    }
}

// ============================================================================
// WebSocket Client
// ============================================================================

/// One socket connection to the gateway, re-established until
/// [`WebSocketClient::disconnect`] is called.
///
/// Inbound frames are decoded into [`ServerEvent`]s and delivered on the
/// receiver returned by [`WebSocketClient::spawn`], together with a
/// synthesized `connection-status` event on every connect and disconnect.
pub struct WebSocketClient {
    sender: mpsc::UnboundedSender<ClientEvent>,
    deliveries: mpsc::UnboundedSender<Delivery>,
    connected: Arc<Mutex<bool>>,
    shutdown_tx: broadcast::Sender<()>,
}

/// An outbound event whose sender waits to learn if it reached the socket.
struct Delivery {
    event: ClientEvent,
    ack: oneshot::Sender<Result<()>>,
}

impl WebSocketClient {
    pub fn spawn(
        url: Url,
        token: Option<String>,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel::<Delivery>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let connected = Arc::new(Mutex::new(false));

        tokio::spawn(connection_loop(
            url,
            token,
            reconnect_delay,
            rx,
            delivery_rx,
            events_tx,
            connected.clone(),
            shutdown_rx,
        ));

        (
            Self {
                sender: tx,
                deliveries: delivery_tx,
                connected,
                shutdown_tx,
            },
            events_rx,
        )
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    /// Queue an event for the socket. Fails fast when there is no live
    /// connection instead of buffering until reconnect.
    pub fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.sender
            .send(event)
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Send an event and wait until it has been written to the socket.
    ///
    /// Errors if the connection is down or drops before the frame is written,
    /// so the caller can fall back to HTTP.
    pub async fn deliver(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let (ack, written) = oneshot::channel();
        self.deliveries
            .send(Delivery { event, ack })
            .map_err(|_| Error::NotConnected)?;

        written.await.map_err(|_| Error::NotConnected)?
    }

    /// Sender half for helpers that emit on their own schedule (typing timer).
    pub fn outbound(&self) -> mpsc::UnboundedSender<ClientEvent> {
        self.sender.clone()
    }

    pub fn disconnect(&self) {
        tracing::info!("Closing socket connection");
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn connection_loop(
    url: Url,
    token: Option<String>,
    reconnect_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    events: mpsc::UnboundedSender<ServerEvent>,
    connected: Arc<Mutex<bool>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        fail_pending(&mut deliveries);
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        tracing::info!(url = %url, "Connecting to socket gateway");

        let (ws_stream, _) = match connect_async(url.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Socket connect failed");
                if wait_or_shutdown(reconnect_delay, &mut shutdown_rx).await {
                    break;
                }
                continue;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        if let Some(token) = &token {
            let auth = ClientEvent::Authenticate {
                token: token.clone(),
            };
            match auth.encode() {
                Ok(frame) => {
                    if let Err(e) = write.send(WsMessage::Text(frame)).await {
                        tracing::warn!(error = %e, "Failed to authenticate socket");
                        if wait_or_shutdown(reconnect_delay, &mut shutdown_rx).await {
                            break;
                        }
                        continue;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode auth frame"),
            }
        }

        // Drop anything queued while offline; callers fall back to HTTP.
        while outbound.try_recv().is_ok() {}
        fail_pending(&mut deliveries);

        *connected.lock() = true;
        tracing::info!("Socket connected");
        if events.send(ServerEvent::ConnectionStatus { connected: true }).is_err() {
            break;
        }

        let mut should_reconnect = true;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    should_reconnect = false;
                    break;
                }
                Some(event) = outbound.recv() => {
                    match event.encode() {
                        Ok(frame) => {
                            tracing::debug!(frame = %frame, "Socket send");
                            if let Err(e) = write.send(WsMessage::Text(frame)).await {
                                tracing::warn!(error = %e, "Socket send failed");
                                break;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to encode client event"),
                    }
                }
                Some(Delivery { event, ack }) = deliveries.recv() => {
                    let frame = match event.encode() {
                        Ok(frame) => frame,
                        Err(e) => {
                            let _ = ack.send(Err(e));
                            continue;
                        }
                    };
                    tracing::debug!(frame = %frame, "Socket send");
                    if let Err(e) = write.send(WsMessage::Text(frame)).await {
                        tracing::warn!(error = %e, "Socket send failed");
                        let _ = ack.send(Err(e.into()));
                        break;
                    }
                    let _ = ack.send(Ok(()));
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => match ServerEvent::decode(&text) {
                            Ok(Some(event)) => {
                                if events.send(event).is_err() {
                                    should_reconnect = false;
                                    break;
                                }
                            }
                            Ok(None) => tracing::debug!("Ignoring unknown socket event"),
                            Err(e) => tracing::warn!(error = %e, "Dropping malformed socket frame"),
                        },
                        Some(Ok(WsMessage::Close(_))) | None => {
                            tracing::info!("Socket closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Socket read error");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        *connected.lock() = false;
        fail_pending(&mut deliveries);
        let _ = events.send(ServerEvent::ConnectionStatus { connected: false });

        if !should_reconnect {
            break;
        }
        tracing::debug!(delay_ms = reconnect_delay.as_millis() as u64, "Reconnecting");
        if wait_or_shutdown(reconnect_delay, &mut shutdown_rx).await {
            break;
        }
    }
}

/// Reject deliveries that can no longer be written on this connection.
fn fail_pending(deliveries: &mut mpsc::UnboundedReceiver<Delivery>) {
    while let Ok(Delivery { event, ack }) = deliveries.try_recv() {
        tracing::warn!(event = event.name(), "Socket delivery dropped");
        let _ = ack.send(Err(Error::NotConnected));
    }
}

/// Sleep for `delay`; true if shutdown was requested meanwhile.
async fn wait_or_shutdown(delay: Duration, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_rx.recv() => true,
    }
}
