//! SQLite persistence for conversations.
//!
//! Three independent stores share one connection:
//! - `chat_history`: the durable, append-only log of every turn. Source of
//!   truth for text history; never mutated, only bulk-cleared.
//! - `token_usage`: write-once usage records per completed agent run.
//! - `checkpoints`: ephemeral per-(thread, user) window state. Disposable;
//!   clearing it does not touch the chat log, and vice versa.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::agent::window::CheckpointState;

/// One durable record in the chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub user_id: String,
    pub thread_id: String,
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fields for a new chat log record. Assistant entries set the kind-specific
/// optional columns; user entries are always plain text.
#[derive(Debug, Clone, Default)]
pub struct NewChatMessage<'a> {
    pub user_id: &'a str,
    pub thread_id: &'a str,
    pub role: &'a str,
    pub content: &'a str,
    pub response_type: &'a str,
    pub chart_type: Option<&'a str>,
    pub table_data: Option<&'a str>,
    pub source: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub thread_id: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokenStats {
    pub user_id: String,
    pub total_queries: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_tokens: i64,
    pub avg_tokens_per_query: f64,
}

pub struct AssistantDatabase {
    conn: Mutex<Connection>,
}

impl AssistantDatabase {
    /// Helper to lock the connection
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Database lock poisoned: {}", e))
    }

    /// Create or open the database
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                response_type TEXT,
                chart_type TEXT,
                table_data TEXT,
                source TEXT,
                image_url TEXT,
                timestamp TEXT NOT NULL
            )"#,
            [],
        )?;

        conn.execute(
            r#"CREATE INDEX IF NOT EXISTS idx_chat_history_user_thread
               ON chat_history(user_id, thread_id, timestamp)"#,
            [],
        )?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS token_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            )"#,
            [],
        )?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (thread_id, user_id)
            )"#,
            [],
        )?;

        tracing::debug!("Database schema ensured");
        Ok(())
    }

    // --- chat history ---

    /// Append one turn to the durable log. Entries are never mutated.
    pub fn save_chat_message(&self, msg: &NewChatMessage) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO chat_history
               (user_id, thread_id, role, content, response_type, chart_type,
                table_data, source, image_url, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                msg.user_id,
                msg.thread_id,
                msg.role,
                msg.content,
                msg.response_type,
                msg.chart_type,
                msg.table_data,
                msg.source,
                msg.image_url,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tracing::info!(
            "Chat message saved - user: {}, thread: {}, role: {}",
            msg.user_id,
            msg.thread_id,
            msg.role
        );
        Ok(())
    }

    /// Read the most recent `limit` entries for a conversation, oldest first.
    pub fn get_chat_history(
        &self,
        user_id: &str,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatLogEntry>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT user_id, thread_id, role, content, response_type, chart_type,
                      table_data, source, image_url, timestamp
               FROM chat_history
               WHERE user_id = ?1 AND thread_id = ?2
               ORDER BY id DESC
               LIMIT ?3"#,
        )?;

        let rows = stmt.query_map(params![user_id, thread_id, limit], |row| {
            let table_data: Option<String> = row.get(6)?;
            let timestamp: String = row.get(9)?;
            Ok(ChatLogEntry {
                user_id: row.get(0)?,
                thread_id: row.get(1)?,
                role: row.get(2)?,
                content: row.get(3)?,
                response_type: row.get(4)?,
                chart_type: row.get(5)?,
                table_data: table_data.and_then(|raw| serde_json::from_str(&raw).ok()),
                source: row
                    .get::<_, Option<String>>(7)?
                    .filter(|s| !s.trim().is_empty()),
                image_url: row
                    .get::<_, Option<String>>(8)?
                    .filter(|s| !s.trim().is_empty()),
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        // Selected newest-first for the limit; callers want oldest-first
        entries.reverse();
        Ok(entries)
    }

    /// Delete the durable log for one conversation. Returns the deleted count.
    /// Does not touch checkpoint state.
    pub fn clear_chat_history(&self, user_id: &str, thread_id: &str) -> Result<usize> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute(
            "DELETE FROM chat_history WHERE user_id = ?1 AND thread_id = ?2",
            params![user_id, thread_id],
        )?;
        tracing::info!(
            "Cleared history - user: {}, thread: {}, count: {}",
            user_id,
            thread_id,
            deleted
        );
        Ok(deleted)
    }

    // --- token usage ---

    pub fn save_token_usage(
        &self,
        user_id: &str,
        thread_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<()> {
        let total = input_tokens + output_tokens;
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO token_usage
               (user_id, thread_id, input_tokens, output_tokens, total_tokens, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                user_id,
                thread_id,
                input_tokens as i64,
                output_tokens as i64,
                total as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tracing::info!(
            "Token usage saved - user: {}, thread: {}, total: {}",
            user_id,
            thread_id,
            total
        );
        Ok(())
    }

    pub fn get_user_token_stats(&self, user_id: &str) -> Result<UserTokenStats> {
        let conn = self.lock_conn()?;
        let stats = conn.query_row(
            r#"SELECT
                   COUNT(*),
                   COALESCE(SUM(input_tokens), 0),
                   COALESCE(SUM(output_tokens), 0),
                   COALESCE(SUM(total_tokens), 0),
                   COALESCE(AVG(total_tokens), 0.0)
               FROM token_usage
               WHERE user_id = ?1"#,
            params![user_id],
            |row| {
                Ok(UserTokenStats {
                    user_id: user_id.to_string(),
                    total_queries: row.get(0)?,
                    total_input_tokens: row.get(1)?,
                    total_output_tokens: row.get(2)?,
                    total_tokens: row.get(3)?,
                    avg_tokens_per_query: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }

    pub fn get_user_recent_activity(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TokenUsageRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT thread_id, input_tokens, output_tokens, total_tokens, timestamp
               FROM token_usage
               WHERE user_id = ?1
               ORDER BY id DESC
               LIMIT ?2"#,
        )?;

        let rows = stmt.query_map(params![user_id, limit], |row| {
            let timestamp: String = row.get(4)?;
            Ok(TokenUsageRecord {
                thread_id: row.get(0)?,
                input_tokens: row.get(1)?,
                output_tokens: row.get(2)?,
                total_tokens: row.get(3)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // --- checkpoints ---

    /// Load checkpoint state for a conversation, if any.
    pub fn get_checkpoint(&self, thread_id: &str, user_id: &str) -> Result<Option<CheckpointState>> {
        let conn = self.lock_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM checkpoints WHERE thread_id = ?1 AND user_id = ?2",
                params![thread_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => {
                let state = serde_json::from_str(&raw)
                    .context("Failed to deserialize checkpoint state")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Store checkpoint state, replacing any prior snapshot (last write wins).
    pub fn put_checkpoint(
        &self,
        thread_id: &str,
        user_id: &str,
        state: &CheckpointState,
    ) -> Result<()> {
        let raw = serde_json::to_string(state).context("Failed to serialize checkpoint state")?;
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO checkpoints (thread_id, user_id, state, updated_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![thread_id, user_id, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Drop checkpoint state for a conversation. Does not touch the chat log.
    pub fn clear_checkpoint(&self, thread_id: &str, user_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "DELETE FROM checkpoints WHERE thread_id = ?1 AND user_id = ?2",
            params![thread_id, user_id],
        )?;
        tracing::info!(
            "Cleared checkpoint - thread: {}, user: {}",
            thread_id,
            user_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn test_db() -> (AssistantDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = AssistantDatabase::new(dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn text_message<'a>(user: &'a str, thread: &'a str, role: &'a str, content: &'a str) -> NewChatMessage<'a> {
        NewChatMessage {
            user_id: user,
            thread_id: thread,
            role,
            content,
            response_type: "text",
            ..Default::default()
        }
    }

    #[test]
    fn chat_history_roundtrip_preserves_order() {
        let (db, _dir) = test_db();

        db.save_chat_message(&text_message("u1", "t1", "user", "first"))
            .unwrap();
        db.save_chat_message(&text_message("u1", "t1", "assistant", "second"))
            .unwrap();
        db.save_chat_message(&text_message("u1", "t2", "user", "other thread"))
            .unwrap();

        let history = db.get_chat_history("u1", "t1", 50).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].content, "second");

        // A tighter limit keeps the newest entries
        let limited = db.get_chat_history("u1", "t1", 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].content, "second");
    }

    #[test]
    fn assistant_entry_keeps_kind_specific_fields() {
        let (db, _dir) = test_db();

        let table_json = r#"{"type":"table","columns":["a"],"rows":[]}"#;
        db.save_chat_message(&NewChatMessage {
            user_id: "u1",
            thread_id: "t1",
            role: "assistant",
            content: "Here are the results",
            response_type: "table",
            table_data: Some(table_json),
            source: Some("Campaign Database (campaigns table)"),
            ..Default::default()
        })
        .unwrap();

        let history = db.get_chat_history("u1", "t1", 10).unwrap();
        assert_eq!(history[0].response_type.as_deref(), Some("table"));
        assert_eq!(history[0].table_data.as_ref().unwrap()["type"], "table");
        assert_eq!(
            history[0].source.as_deref(),
            Some("Campaign Database (campaigns table)")
        );
        assert!(history[0].image_url.is_none());
    }

    #[test]
    fn clear_history_returns_deleted_count() {
        let (db, _dir) = test_db();

        db.save_chat_message(&text_message("u1", "t1", "user", "a"))
            .unwrap();
        db.save_chat_message(&text_message("u1", "t1", "assistant", "b"))
            .unwrap();
        db.save_chat_message(&text_message("u2", "t1", "user", "not mine"))
            .unwrap();

        assert_eq!(db.clear_chat_history("u1", "t1").unwrap(), 2);
        assert!(db.get_chat_history("u1", "t1", 10).unwrap().is_empty());
        assert_eq!(db.get_chat_history("u2", "t1", 10).unwrap().len(), 1);
    }

    #[test]
    fn token_stats_aggregate_per_user() {
        let (db, _dir) = test_db();

        db.save_token_usage("u1", "t1", 100, 20).unwrap();
        db.save_token_usage("u1", "t2", 50, 30).unwrap();
        db.save_token_usage("u2", "t1", 999, 1).unwrap();

        let stats = db.get_user_token_stats("u1").unwrap();
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.total_input_tokens, 150);
        assert_eq!(stats.total_output_tokens, 50);
        assert_eq!(stats.total_tokens, 200);

        let recent = db.get_user_recent_activity("u1", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].thread_id, "t2"); // newest first
    }

    #[test]
    fn checkpoint_roundtrip() {
        let (db, _dir) = test_db();

        let state = CheckpointState {
            messages: vec![Message::user("hello"), Message::assistant("hi")],
            data: None,
        };
        db.put_checkpoint("t1", "u1", &state).unwrap();

        let loaded = db.get_checkpoint("t1", "u1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].content_str(), "hello");

        assert!(db.get_checkpoint("t2", "u1").unwrap().is_none());
    }

    #[test]
    fn checkpoint_and_history_clear_independently() {
        let (db, _dir) = test_db();

        db.save_chat_message(&text_message("u1", "t1", "user", "durable"))
            .unwrap();
        let state = CheckpointState {
            messages: vec![Message::user("ephemeral")],
            data: None,
        };
        db.put_checkpoint("t1", "u1", &state).unwrap();

        // Clearing the checkpoint leaves the durable log intact
        db.clear_checkpoint("t1", "u1").unwrap();
        assert!(db.get_checkpoint("t1", "u1").unwrap().is_none());
        assert_eq!(db.get_chat_history("u1", "t1", 10).unwrap().len(), 1);

        // And clearing the log leaves a fresh checkpoint intact
        db.put_checkpoint("t1", "u1", &state).unwrap();
        db.clear_chat_history("u1", "t1").unwrap();
        assert!(db.get_checkpoint("t1", "u1").unwrap().is_some());
    }
}
