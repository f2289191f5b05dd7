//! Socket event vocabulary.
//!
//! Every frame on the wire is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`.

use crate::error::Result;
use crate::models::{Message, OnlineUser, PresenceStatus};
use serde::{Deserialize, Serialize};

/// Events pushed by the server (plus the locally synthesized
/// `connection-status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    ConnectionStatus {
        connected: bool,
    },
    OnlineUsers(Vec<OnlineUser>),
    UserOnline(OnlineUser),
    #[serde(rename_all = "camelCase")]
    UserOffline {
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserStatusChanged {
        user_id: String,
        status: PresenceStatus,
    },
    NewMessage(Message),
    MessageSent(Message),
    #[serde(rename_all = "camelCase")]
    MessageRead {
        message_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping {
        user_id: String,
    },
}

const KNOWN_EVENTS: &[&str] = &[
    "connection-status",
    "online-users",
    "user-online",
    "user-offline",
    "user-status-changed",
    "new-message",
    "message-sent",
    "message-read",
    "user-typing",
    "user-stopped-typing",
];

impl ServerEvent {
    /// Decode one text frame. Unknown event names yield `Ok(None)`.
    pub fn decode(text: &str) -> Result<Option<Self>> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let name = value.get("event").and_then(|e| e.as_str()).unwrap_or_default();

        if !KNOWN_EVENTS.contains(&name) {
            tracing::debug!(event = name, "Ignoring unknown socket event");
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(value)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionStatus { .. } => "connection-status",
            Self::OnlineUsers(_) => "online-users",
            Self::UserOnline(_) => "user-online",
            Self::UserOffline { .. } => "user-offline",
            Self::UserStatusChanged { .. } => "user-status-changed",
            Self::NewMessage(_) => "new-message",
            Self::MessageSent(_) => "message-sent",
            Self::MessageRead { .. } => "message-read",
            Self::UserTyping { .. } => "user-typing",
            Self::UserStoppedTyping { .. } => "user-stopped-typing",
        }
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Authenticate {
        token: String,
    },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        receiver_id: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart {
        receiver_id: String,
    },
    #[serde(rename_all = "camelCase")]
    TypingStop {
        receiver_id: String,
    },
    #[serde(rename_all = "camelCase")]
    MarkMessageRead {
        message_id: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinConversation {
        other_user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveConversation {
        other_user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    GetOnlineUsers,
}

impl ClientEvent {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::SendMessage { .. } => "send-message",
            Self::TypingStart { .. } => "typing-start",
            Self::TypingStop { .. } => "typing-stop",
            Self::MarkMessageRead { .. } => "mark-message-read",
            Self::JoinConversation { .. } => "join-conversation",
            Self::LeaveConversation { .. } => "leave-conversation",
            Self::GetOnlineUsers => "get-online-users",
        }
    }
}
