use std::{path::Path, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::{RelayError, rooms::ChatMessage};

/// Durable mirror of one room's messages.
///
/// Every value reaches SQLite through bound parameters, never through the
/// query text.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    /// Open (creating if missing) the database file at `path`.
    ///
    /// The room is the only writer, so one connection is enough.
    pub async fn open(path: &Path) -> Result<Self, RelayError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), RelayError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (id TEXT PRIMARY KEY, user TEXT, role TEXT, content TEXT)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every stored message, in row order. An update keeps its row, so this is
    /// first-arrival order.
    pub async fn load_all(&self) -> Result<Vec<ChatMessage>, RelayError> {
        let rows: Vec<(String, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT id,user,role,content FROM messages ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user, role, content)| ChatMessage {
                id,
                user: user.unwrap_or_default(),
                role: role.unwrap_or_default(),
                content: content.unwrap_or_default(),
            })
            .collect())
    }

    /// Insert `message`, or replace only the `content` of the row with the
    /// same id. `user` and `role` are written on insert only.
    pub async fn upsert(&self, message: &ChatMessage) -> Result<(), RelayError> {
        sqlx::query(
            "INSERT INTO messages (id,user,role,content) VALUES (?,?,?,?) \
             ON CONFLICT (id) DO UPDATE SET content = excluded.content",
        )
        .bind(&message.id)
        .bind(&message.user)
        .bind(&message.role)
        .bind(&message.content)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
