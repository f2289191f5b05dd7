//! Client-side view of who is online.

use crate::models::{OnlineUser, PresenceEntry, PresenceStatus};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PresenceMap {
    entries: HashMap<String, PresenceEntry>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole map with a server snapshot.
    pub fn replace_all(&mut self, users: Vec<OnlineUser>) {
        self.entries = users
            .into_iter()
            .map(|u| {
                (
                    u.user_id,
                    PresenceEntry {
                        status: u.status,
                        username: u.username,
                    },
                )
            })
            .collect();
    }

    pub fn set_online(&mut self, user: OnlineUser) {
        self.entries.insert(
            user.user_id,
            PresenceEntry {
                status: user.status,
                username: user.username,
            },
        );
    }

    pub fn set_offline(&mut self, user_id: &str) -> bool {
        self.entries.remove(user_id).is_some()
    }

    /// Only touches users already present; unknown ids are ignored.
    pub fn update_status(&mut self, user_id: &str, status: PresenceStatus) -> bool {
        match self.entries.get_mut(user_id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn status_of(&self, user_id: &str) -> PresenceStatus {
        self.entries
            .get(user_id)
            .map(|e| e.status.clone())
            .unwrap_or(PresenceStatus::Offline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Online user ids, sorted for stable output.
    pub fn user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
