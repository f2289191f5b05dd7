//! Local key/value storage using SQLite
//!
//! Holds what the browser kept in `localStorage`: the session token, a
//! snapshot of the current user, and small UI hints.

use crate::error::Result;
use crate::models::{AuthSession, CurrentUser};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const KEY_TOKEN: &str = "token";
const KEY_CURRENT_USER: &str = "current_user";
const KEY_SELECTED_CHAT: &str = "selected_chat_user";
const KEY_ACTIVE_TAB: &str = "active_tab";

pub struct LocalStorage {
    conn: Mutex<Connection>,
}

impl LocalStorage {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join("raiderhub.db"))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn save_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn set_or_clear(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(v) => self.save_setting(key, v),
            None => self.delete_setting(key),
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn save_session(&self, session: &AuthSession) -> Result<()> {
        let user = serde_json::to_string(&session.user)?;
        self.save_setting(KEY_TOKEN, &session.token)?;
        self.save_setting(KEY_CURRENT_USER, &user)?;
        Ok(())
    }

    /// The stored session, if both halves are present and the user snapshot parses.
    pub fn get_session(&self) -> Result<Option<AuthSession>> {
        let Some(token) = self.get_setting(KEY_TOKEN)? else {
            return Ok(None);
        };
        let Some(raw_user) = self.get_setting(KEY_CURRENT_USER)? else {
            return Ok(None);
        };

        match serde_json::from_str::<CurrentUser>(&raw_user) {
            Ok(user) => Ok(Some(AuthSession { token, user })),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable user snapshot");
                self.clear_session()?;
                Ok(None)
            }
        }
    }

    pub fn clear_session(&self) -> Result<()> {
        self.delete_setting(KEY_TOKEN)?;
        self.delete_setting(KEY_CURRENT_USER)?;
        self.delete_setting(KEY_SELECTED_CHAT)?;
        Ok(())
    }

    // ========================================================================
    // UI hints
    // ========================================================================

    pub fn set_selected_chat(&self, user_id: Option<&str>) -> Result<()> {
        self.set_or_clear(KEY_SELECTED_CHAT, user_id)
    }

    pub fn selected_chat(&self) -> Result<Option<String>> {
        self.get_setting(KEY_SELECTED_CHAT)
    }

    pub fn set_active_tab(&self, tab: &str) -> Result<()> {
        self.save_setting(KEY_ACTIVE_TAB, tab)
    }

    pub fn active_tab(&self) -> Result<Option<String>> {
        self.get_setting(KEY_ACTIVE_TAB)
    }
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            token: "tok-123".into(),
            user: CurrentUser {
                id: "me".into(),
                username: "Raider".into(),
                email: Some("raider@example.com".into()),
                avatar: None,
            },
        }
    }

    #[test]
    fn test_session_persistence() {
        let storage = LocalStorage::in_memory().unwrap();
        assert!(storage.get_session().unwrap().is_none());

        storage.save_session(&session()).unwrap();
        assert_eq!(storage.get_session().unwrap(), Some(session()));

        storage.clear_session().unwrap();
        assert!(storage.get_session().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_user_snapshot_is_discarded() {
        let storage = LocalStorage::in_memory().unwrap();
        storage.save_setting("token", "tok").unwrap();
        storage.save_setting("current_user", "{not json").unwrap();

        assert!(storage.get_session().unwrap().is_none());
        assert!(storage.get_setting("token").unwrap().is_none());
    }

    #[test]
    fn test_ui_hints() {
        let storage = LocalStorage::in_memory().unwrap();

        storage.set_selected_chat(Some("bob")).unwrap();
        storage.set_active_tab("friends").unwrap();
        assert_eq!(storage.selected_chat().unwrap().as_deref(), Some("bob"));
        assert_eq!(storage.active_tab().unwrap().as_deref(), Some("friends"));

        storage.set_selected_chat(None).unwrap();
        assert!(storage.selected_chat().unwrap().is_none());

        // Logging out forgets the chat target but keeps the tab.
        storage.set_selected_chat(Some("bob")).unwrap();
        storage.clear_session().unwrap();
        assert!(storage.selected_chat().unwrap().is_none());
        assert_eq!(storage.active_tab().unwrap().as_deref(), Some("friends"));
    }
}
