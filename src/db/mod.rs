mod records;
pub mod schema;

pub use records::{
    compare_cursors, ChannelRecord, ChannelWrite, CursorKind, MediaRecord, MessageRecord,
    ObservedMessage, ScopeRecord,
};

use crate::config::Config;
use anyhow::{anyhow, Context};
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Upsert store. Every write is insert-or-update keyed by the Discord id, so
/// replaying the same input leaves the database unchanged.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.lock()?;
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs `f` on tokio's blocking pool so SQLite never stalls the runtime.
    pub async fn run_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database: connection mutex poisoned"))
    }

    // --- Parents ---

    pub fn upsert_account(&self, id: &str, name: &str, credential: &str) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (id, name, credential) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, credential = excluded.credential",
            (id, name, credential),
        )?;
        Ok(())
    }

    /// Registers the guild, or re-registers one that was removed earlier.
    pub fn upsert_guild(&self, id: &str, name: &str) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO guilds (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, removed = 0",
            (id, name),
        )?;
        Ok(())
    }

    pub fn upsert_user(&self, id: &str, name: Option<&str>) -> anyhow::Result<()> {
        let conn = self.lock()?;
        upsert_user(&conn, id, name)
    }

    pub fn upsert_channel(&self, channel: &ChannelRecord) -> anyhow::Result<()> {
        let conn = self.lock()?;
        upsert_channel(&conn, channel)
    }

    pub fn ensure_channel(&self, channel: &ChannelRecord) -> anyhow::Result<()> {
        let conn = self.lock()?;
        ensure_channel(&conn, channel)
    }

    // --- Children ---

    pub fn upsert_message(&self, message: &MessageRecord) -> anyhow::Result<()> {
        let conn = self.lock()?;
        upsert_message(&conn, message)
    }

    pub fn upsert_media(&self, media: &MediaRecord) -> anyhow::Result<()> {
        let conn = self.lock()?;
        upsert_media(&conn, media)
    }

    /// Writes author, channel, message and attachments of one search hit in
    /// a single transaction.
    pub fn record_message(&self, observed: &ObservedMessage) -> anyhow::Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        upsert_user(&tx, &observed.author_id, observed.author_name.as_deref())?;
        match &observed.channel {
            ChannelWrite::Refresh(channel) => upsert_channel(&tx, channel)?,
            ChannelWrite::EnsureExists(channel) => ensure_channel(&tx, channel)?,
        }
        upsert_message(&tx, &observed.message)?;
        for media in &observed.media {
            upsert_media(&tx, media)?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_channel(&self, id: &str) -> anyhow::Result<Option<ChannelRecord>> {
        let conn = self.lock()?;
        let channel = conn
            .query_row(
                "SELECT id, name, guild_id, is_dm, is_nsfw FROM channels WHERE id = ?1",
                [id],
                |row| {
                    Ok(ChannelRecord {
                        id: row.get(0)?,
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        guild_id: row.get(2)?,
                        is_dm: row.get(3)?,
                        is_nsfw: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(channel)
    }

    pub fn get_message(&self, id: &str) -> anyhow::Result<Option<MessageRecord>> {
        let conn = self.lock()?;
        let message = conn
            .query_row(
                "SELECT id, content, timestamp, edited_timestamp, user_id, guild_id, channel_id,
                        account_id, observed_cursor, has_media
                 FROM messages WHERE id = ?1",
                [id],
                |row| {
                    Ok(MessageRecord {
                        id: row.get(0)?,
                        content: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        timestamp: row.get(2)?,
                        edited_timestamp: row.get(3)?,
                        user_id: row.get(4)?,
                        guild_id: row.get(5)?,
                        channel_id: row.get(6)?,
                        account_id: row.get(7)?,
                        observed_cursor: row.get(8)?,
                        has_media: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(message)
    }

    // --- Scopes & cursors ---

    /// Moves the scope's cursor forward. Returns `false` without writing when
    /// the scope is gone or `cursor` would move it backwards.
    pub fn advance_cursor(
        &self,
        scope_id: &str,
        cursor: &str,
        kind: CursorKind,
    ) -> anyhow::Result<bool> {
        let column = kind.column();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current: Option<Option<String>> = tx
            .query_row(
                &format!("SELECT {} FROM guilds WHERE id = ?1 AND removed = 0", column),
                [scope_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            debug!("Database: Cursor not advanced, scope {} is not registered", scope_id);
            return Ok(false);
        };

        if let Some(current) = current.as_deref() {
            if compare_cursors(cursor, current) == Ordering::Less {
                warn!(
                    "Database: Refusing to move {:?} cursor of {} back from {} to {}",
                    kind, scope_id, current, cursor
                );
                return Ok(false);
            }
        }

        tx.execute(
            &format!("UPDATE guilds SET {} = ?1 WHERE id = ?2", column),
            (cursor, scope_id),
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Clears the scope's cursor so the next walk starts from the beginning.
    pub fn reset_cursor(&self, scope_id: &str, kind: CursorKind) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!("UPDATE guilds SET {} = NULL WHERE id = ?1", kind.column()),
            [scope_id],
        )?;
        Ok(())
    }

    pub fn get_cursor(&self, scope_id: &str, kind: CursorKind) -> anyhow::Result<Option<String>> {
        let conn = self.lock()?;
        let cursor = conn
            .query_row(
                &format!("SELECT {} FROM guilds WHERE id = ?1", kind.column()),
                [scope_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(cursor.flatten())
    }

    /// Drops the scope from future scans. Stored history stays.
    pub fn remove_scope(&self, scope_id: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "UPDATE guilds SET removed = 1 WHERE id = ?1 AND removed = 0",
            [scope_id],
        )?;
        Ok(removed > 0)
    }

    pub fn count_media(&self) -> anyhow::Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Known scopes in insertion order, the DM scope last. `restrict_to`
    /// keeps only the listed ids.
    pub fn list_scopes(&self, restrict_to: Option<&[String]>) -> anyhow::Result<Vec<ScopeRecord>> {
        let conn = self.lock()?;

        let mut sql = String::from(
            "SELECT id, name, last_media_cursor, last_message_cursor FROM guilds WHERE removed = 0",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ids) = restrict_to {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(" AND id IN (");
            sql.push_str(&vec!["?"; ids.len()].join(", "));
            sql.push(')');
            for id in ids {
                params.push(Box::new(id.clone()));
            }
        }
        sql.push_str(" ORDER BY CASE WHEN id = '@me' THEN 1 ELSE 0 END, rowid");

        let mut stmt = conn.prepare(&sql)?;
        let params_slice: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_slice[..], |row| {
            Ok(ScopeRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                last_media_cursor: row.get(2)?,
                last_message_cursor: row.get(3)?,
            })
        })?;

        let mut scopes = Vec::new();
        for row in rows {
            scopes.push(row?);
        }
        Ok(scopes)
    }
}

fn upsert_user(conn: &Connection, id: &str, name: Option<&str>) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET name = COALESCE(excluded.name, users.name)",
        (id, name),
    )?;
    Ok(())
}

fn upsert_channel(conn: &Connection, channel: &ChannelRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO channels (id, name, is_dm, is_nsfw, guild_id) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             is_dm = excluded.is_dm,
             is_nsfw = excluded.is_nsfw",
        (
            &channel.id,
            &channel.name,
            channel.is_dm,
            channel.is_nsfw,
            &channel.guild_id,
        ),
    )?;
    Ok(())
}

fn ensure_channel(conn: &Connection, channel: &ChannelRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO channels (id, name, is_dm, is_nsfw, guild_id) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO NOTHING",
        (
            &channel.id,
            &channel.name,
            channel.is_dm,
            channel.is_nsfw,
            &channel.guild_id,
        ),
    )?;
    Ok(())
}

fn upsert_message(conn: &Connection, message: &MessageRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, content, timestamp, edited_timestamp, user_id, guild_id,
                               channel_id, account_id, observed_cursor, has_media)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
             content = excluded.content,
             edited_timestamp = excluded.edited_timestamp,
             has_media = excluded.has_media",
        params![
            message.id,
            message.content,
            message.timestamp,
            message.edited_timestamp,
            message.user_id,
            message.guild_id,
            message.channel_id,
            message.account_id,
            message.observed_cursor,
            message.has_media,
        ],
    )?;
    Ok(())
}

fn upsert_media(conn: &Connection, media: &MediaRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO media (file_id, url, filename, size, content_type, width, height,
                            message_id, observed_cursor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(file_id) DO UPDATE SET url = excluded.url",
        params![
            media.file_id,
            media.url,
            media.filename,
            media.size.map(|s| i64::try_from(s).unwrap_or(i64::MAX)),
            media.content_type,
            media.width,
            media.height,
            media.message_id,
            media.observed_cursor,
        ],
    )?;
    Ok(())
}
