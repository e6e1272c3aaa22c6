use rusqlite::{OptionalExtension, Result as SqlResult, Row, params};
use std::path::Path;

use super::database::Database;
use super::models::UserProfile;
use crate::common::{Message, Participants};

/// Database behind the local store (messages, user directory)
pub struct ClientDatabase {
    db: Database,
}

impl ClientDatabase {
    /// Initialize client database at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        Self::init(Database::new(path)?)
    }

    pub fn in_memory() -> SqlResult<Self> {
        Self::init(Database::in_memory()?)
    }

    fn init(db: Database) -> SqlResult<Self> {
        let client_db = Self { db };
        client_db.init_schema()?;
        Ok(client_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.db.connection();

        // seq keeps insertion order for messages sharing a timestamp
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                participant_a TEXT NOT NULL,
                participant_b TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_participant_a ON messages(participant_a, timestamp)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_participant_b ON messages(participant_b, timestamp)",
            [],
        )?;

        Ok(())
    }

    // ========== Messages ==========

    /// Append a message, returning its insertion sequence number
    pub fn insert_message(&self, message: &Message) -> SqlResult<i64> {
        let conn = self.db.connection();
        let (participant_a, participant_b) = message.participants.pair();
        conn.execute(
            "INSERT INTO messages (id, text, sender_id, receiver_id, participant_a, participant_b, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id,
                message.text,
                message.sender_id,
                message.receiver_id,
                participant_a,
                participant_b,
                message.timestamp
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every message the user takes part in, timestamp ascending, ties by insertion
    pub fn messages_for_participant(&self, user_id: &str) -> SqlResult<Vec<Message>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, text, sender_id, receiver_id, participant_a, participant_b, timestamp
             FROM messages
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY timestamp ASC, seq ASC",
        )?;

        let messages = stmt
            .query_map(params![user_id], message_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(messages)
    }

    pub fn latest_timestamp(&self) -> SqlResult<Option<i64>> {
        let conn = self.db.connection();
        conn.query_row("SELECT MAX(timestamp) FROM messages", [], |row| row.get(0))
    }

    /// Highest sequence number written so far, by any process
    pub fn latest_seq(&self) -> SqlResult<i64> {
        let conn = self.db.connection();
        conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM messages", [], |row| {
            row.get(0)
        })
    }

    pub fn message_count(&self) -> SqlResult<usize> {
        let conn = self.db.connection();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Users ==========

    /// Insert or update a directory profile, keeping the existing created_at
    pub fn upsert_user(&self, profile: &UserProfile) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO users (id, email, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET email = excluded.email, display_name = excluded.display_name",
            params![
                profile.id,
                profile.email,
                profile.display_name,
                profile.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> SqlResult<Option<UserProfile>> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT id, email, display_name, created_at FROM users WHERE id = ?1",
            params![id],
            profile_from_row,
        )
        .optional()
    }

    /// Directory listing, optionally hiding one email (the caller's own)
    pub fn list_users(&self, exclude_email: Option<&str>) -> SqlResult<Vec<UserProfile>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, email, display_name, created_at
             FROM users
             WHERE ?1 IS NULL OR email != ?1
             ORDER BY created_at ASC, email ASC",
        )?;

        let users = stmt
            .query_map(params![exclude_email], profile_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(users)
    }
}

fn message_from_row(row: &Row<'_>) -> SqlResult<Message> {
    let participant_a: String = row.get(4)?;
    let participant_b: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        text: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        participants: Participants::new(participant_a, participant_b),
        timestamp: row.get(6)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> SqlResult<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::OutgoingMessage;

    fn message(id: &str, from: &str, to: &str, timestamp: i64) -> Message {
        OutgoingMessage::new(format!("text {id}"), from, to).stamp(id.to_string(), timestamp)
    }

    #[test]
    fn messages_are_scoped_to_participant_and_ordered() {
        let db = ClientDatabase::in_memory().unwrap();
        db.insert_message(&message("m3", "alice", "bob", 30)).unwrap();
        db.insert_message(&message("m1", "bob", "alice", 10)).unwrap();
        db.insert_message(&message("m2", "carol", "dave", 20)).unwrap();
        db.insert_message(&message("m4", "carol", "alice", 30)).unwrap();

        let ids: Vec<_> = db
            .messages_for_participant("alice")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        // m3 and m4 share a timestamp; insertion order decides
        assert_eq!(ids, vec!["m1", "m3", "m4"]);
        assert_eq!(db.message_count().unwrap(), 4);
        assert_eq!(db.latest_timestamp().unwrap(), Some(30));
        assert_eq!(db.latest_seq().unwrap(), 4);
    }

    #[test]
    fn duplicate_message_id_is_rejected() {
        let db = ClientDatabase::in_memory().unwrap();
        db.insert_message(&message("m1", "alice", "bob", 1)).unwrap();
        assert!(db.insert_message(&message("m1", "alice", "bob", 2)).is_err());
    }

    #[test]
    fn list_users_hides_excluded_email() {
        let db = ClientDatabase::in_memory().unwrap();
        for (id, email, created_at) in [("a", "a@x.io", 1), ("b", "b@x.io", 2)] {
            db.upsert_user(&UserProfile {
                id: id.to_string(),
                email: email.to_string(),
                display_name: None,
                created_at,
            })
            .unwrap();
        }

        let others = db.list_users(Some("a@x.io")).unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, "b");
        assert_eq!(db.list_users(None).unwrap().len(), 2);
    }

    #[test]
    fn upsert_keeps_created_at() {
        let db = ClientDatabase::in_memory().unwrap();
        let mut profile = UserProfile {
            id: "a".to_string(),
            email: "a@x.io".to_string(),
            display_name: None,
            created_at: 5,
        };
        db.upsert_user(&profile).unwrap();
        profile.display_name = Some("ann".to_string());
        profile.created_at = 99;
        db.upsert_user(&profile).unwrap();

        let stored = db.get_user("a").unwrap().unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("ann"));
        assert_eq!(stored.created_at, 5);
    }
}
