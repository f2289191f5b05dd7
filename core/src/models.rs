//! Data models for RaiderHub
//!
//! Field names follow the backend's JSON (camelCase, `_id` for record ids).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

impl UserRef {
    pub fn new(id: &str, username: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
        }
    }
}

/// Snapshot of the logged-in user, kept in local storage between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: CurrentUser,
}

// ============================================================================
// Presence
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    InGame,
    Offline,
    Other(String),
}

impl From<String> for PresenceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "online" => Self::Online,
            "away" => Self::Away,
            "busy" => Self::Busy,
            "in-game" | "ingame" => Self::InGame,
            "offline" => Self::Offline,
            _ => Self::Other(value),
        }
    }
}

impl From<PresenceStatus> for String {
    fn from(value: PresenceStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::InGame => "in-game",
            Self::Offline => "offline",
            Self::Other(s) => s,
        };
        f.write_str(s)
    }
}

impl Default for PresenceStatus {
    fn default() -> Self {
        Self::Online
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub username: Option<String>,
}

/// A user as reported by the `online-users` / `user-online` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub status: PresenceStatus,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// Derived on the client from the current user id.
    #[serde(default)]
    pub is_own: bool,
}

impl Message {
    /// The participant that is not `me`.
    pub fn peer_of(&self, me: &str) -> &str {
        if self.sender_id == me {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

// ============================================================================
// Conversations
// ============================================================================

/// Identity of a conversation in the local list.
///
/// `Pending` is a client-only thread opened before the first message
/// round-trip. It is replaced by the server's `Confirmed` conversation for the
/// same peer on the next list reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    Pending { local_id: String },
    Confirmed { server_id: String },
}

impl ConversationKey {
    pub fn pending_for(peer_id: &str) -> Self {
        Self::Pending {
            local_id: format!("temp_{}", peer_id),
        }
    }

    pub fn confirmed(server_id: &str) -> Self {
        Self::Confirmed {
            server_id: server_id.to_string(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Confirmed { server_id } => Some(server_id),
            Self::Pending { .. } => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending { local_id } => local_id,
            Self::Confirmed { server_id } => server_id,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Anything that arrives from the server is confirmed.
impl Serialize for ConversationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConversationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let server_id = String::deserialize(deserializer)?;
        Ok(Self::Confirmed { server_id })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub sender_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl From<&Message> for LastMessage {
    fn from(msg: &Message) -> Self {
        Self {
            content: msg.content.clone(),
            sender_id: msg.sender_id.clone(),
            created_at: msg.created_at,
            read: msg.read,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "conversationId")]
    pub key: ConversationKey,
    pub other_user: UserRef,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Local placeholder for a peer with no server-side thread yet.
    pub fn pending(peer: UserRef) -> Self {
        Self {
            key: ConversationKey::pending_for(&peer.id),
            other_user: peer,
            last_message: None,
            unread_count: 0,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.other_user.id
    }
}

// ============================================================================
// Friends
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub status: Option<PresenceStatus>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub from: UserRef,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
