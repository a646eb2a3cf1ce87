//! SQLite storage implementation
//!
//! Every operation of the command catalog lives here as a method on
//! [`AtlasStore`]. The store is owned by exactly one thread at a time (the
//! dispatcher), so methods take the connection by reference and never lock.

use std::path::Path;
use rusqlite::{Connection, params, params_from_iter, OptionalExtension};
use crate::Result;
use crate::model::{AtlasStats, EmojiCount, RecentEmoji, Sentiment};
use super::schema;

/// SQLite-backed storage for users, emoji, messages, reactions and analyses
pub struct AtlasStore {
    conn: Connection,
}

impl AtlasStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.ensure_schema()?;
        tracing::debug!("Opened reaction store at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Idempotently create all tables and indexes.
    ///
    /// Safe to call on every start; foreign key enforcement and WAL journaling
    /// are switched on for this connection first.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::PRAGMAS)?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Close the underlying connection
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| err.into())
    }

    // ========== User Operations ==========

    /// Find the internal id of a platform user
    pub fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM slack_user WHERE slack_user_id = ?1",
                [external_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert a platform user, failing if it already exists
    pub fn insert_user(&self, external_id: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO slack_user (slack_user_id) VALUES (?1)",
            [external_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ========== Emoji Operations ==========

    pub fn find_emoji_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM emoji WHERE name = ?1", [name], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn insert_emoji(&self, name: &str, first_used_at: f64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO emoji (name, first_used_created) VALUES (?1, ?2)",
            params![name, first_used_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rename an emoji, returning the number of rows changed (0 if absent)
    pub fn rename_emoji(&self, old_name: &str, new_name: &str) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE emoji SET name = ?1 WHERE name = ?2",
            params![new_name, old_name],
        )?;
        Ok(changed)
    }

    /// Delete emoji by name together with every reaction that used them.
    ///
    /// Reactions go first so the emoji rows are never referenced when removed.
    /// Both deletes run in one transaction. Returns reactions + emoji removed.
    pub fn delete_emojis_by_names(&mut self, names: &[String]) -> Result<usize> {
        if names.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; names.len()].join(", ");

        let tx = self.conn.transaction()?;
        let reactions = tx.execute(
            &format!(
                "DELETE FROM reaction WHERE emoji_id IN (SELECT id FROM emoji WHERE name IN ({}))",
                placeholders
            ),
            params_from_iter(names.iter()),
        )?;
        let emojis = tx.execute(
            &format!("DELETE FROM emoji WHERE name IN ({})", placeholders),
            params_from_iter(names.iter()),
        )?;
        tx.commit()?;

        tracing::debug!("Deleted {} emoji and {} reactions", emojis, reactions);
        Ok(reactions + emojis)
    }

    // ========== Message Operations ==========

    /// Find a message by its heuristic identity (author, text, timestamp)
    pub fn find_message(&self, user_id: i64, text: &str, timestamp: f64) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM message WHERE user_id = ?1 AND m_text = ?2 AND timestamp = ?3",
                params![user_id, text, timestamp],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_message_text(&self, message_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT m_text FROM message WHERE id = ?1", [message_id], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn insert_message(&self, user_id: i64, channel: &str, text: &str, timestamp: f64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO message (user_id, channel, m_text, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, channel, text, timestamp],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ========== Reaction Operations ==========

    /// Insert a reaction with no message attached yet
    pub fn insert_reaction(&self, user_id: i64, emoji_id: i64, timestamp: f64, is_removal: bool) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO reaction (user_id, emoji_id, timestamp, remove) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, emoji_id, timestamp, is_removal],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fill in the message a reaction belongs to
    pub fn attach_reaction_to_message(&self, reaction_id: i64, message_id: i64) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE reaction SET message_id = ?1 WHERE id = ?2",
            params![message_id, reaction_id],
        )?;
        Ok(changed)
    }

    // ========== Model / Analysis Operations ==========

    pub fn find_model_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM model WHERE name = ?1", [name], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn insert_model(&self, name: &str) -> Result<i64> {
        self.conn.execute("INSERT INTO model (name) VALUES (?1)", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_analysis(&self, message_id: i64, model_id: i64) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM analysis WHERE message_id = ?1 AND model_id = ?2",
                params![message_id, model_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert an analysis result; `result` is stored as opaque JSON text
    pub fn insert_analysis(&self, message_id: i64, model_id: i64, result: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO analysis (message_id, model_id, result) VALUES (?1, ?2, ?3)",
            params![message_id, model_id, result],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ========== Rankings ==========

    /// Most used emoji among additions (or removals)
    pub fn top_n_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(emoji.name) AS uses, emoji.name
             FROM emoji
             INNER JOIN reaction ON emoji.id = reaction.emoji_id
             WHERE reaction.remove = ?1
             GROUP BY emoji.name
             ORDER BY uses DESC, emoji.name ASC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![is_removal, n as i64], row_to_emoji_count)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Newest emoji first, flagging whether each was introduced by a reaction
    pub fn top_n_recent(&self, n: usize) -> Result<Vec<RecentEmoji>> {
        let mut stmt = self.conn.prepare(
            "SELECT emoji.name, emoji.first_used_created,
                    MAX(reaction.timestamp = emoji.first_used_created) AS used
             FROM emoji
             LEFT JOIN reaction ON reaction.emoji_id = emoji.id
             GROUP BY emoji.name, emoji.first_used_created
             ORDER BY emoji.first_used_created DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([n as i64], |row| {
                let used: Option<i64> = row.get(2)?;
                Ok(RecentEmoji {
                    name: row.get(0)?,
                    first_used_at: row.get(1)?,
                    first_use: used.unwrap_or(0) != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Most used emoji on messages whose analysis falls in `sentiment`
    pub fn top_n_by_sentiment(&self, n: usize, sentiment: Sentiment, is_removal: bool) -> Result<Vec<EmojiCount>> {
        let sql = format!(
            "SELECT COUNT(emoji.name) AS uses, emoji.name
             FROM analysis
             INNER JOIN message ON analysis.message_id = message.id
             INNER JOIN reaction ON reaction.message_id = message.id
             INNER JOIN emoji ON reaction.emoji_id = emoji.id
             WHERE reaction.remove = ?1
             AND {}
             GROUP BY emoji.name
             ORDER BY uses DESC, emoji.name ASC
             LIMIT ?2",
            sentiment.compound_predicate()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt
            .query_map(params![is_removal, n as i64], row_to_emoji_count)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn top_n_positive_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.top_n_by_sentiment(n, Sentiment::Positive, is_removal)
    }

    pub fn top_n_neutral_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.top_n_by_sentiment(n, Sentiment::Neutral, is_removal)
    }

    pub fn top_n_negative_emojis(&self, n: usize, is_removal: bool) -> Result<Vec<EmojiCount>> {
        self.top_n_by_sentiment(n, Sentiment::Negative, is_removal)
    }

    /// A single user's most used emoji, optionally limited to one channel.
    ///
    /// The channel filter joins through `message`, so reactions that were
    /// never attached to a message only count in the unfiltered ranking.
    /// An empty channel name means no filter.
    pub fn top_n_emojis_by_user(
        &self,
        n: usize,
        external_user_id: &str,
        is_removal: bool,
        channel: Option<&str>,
    ) -> Result<Vec<EmojiCount>> {
        let rows = if let Some(channel) = channel.filter(|c| !c.is_empty()) {
            let mut stmt = self.conn.prepare(
                "SELECT COUNT(emoji.name) AS uses, emoji.name
                 FROM emoji
                 INNER JOIN reaction ON reaction.emoji_id = emoji.id
                 INNER JOIN slack_user ON slack_user.id = reaction.user_id
                 INNER JOIN message ON message.id = reaction.message_id
                 WHERE slack_user.slack_user_id = ?1
                 AND reaction.remove = ?2
                 AND message.channel = ?3
                 GROUP BY emoji.name
                 ORDER BY uses DESC, emoji.name ASC
                 LIMIT ?4",
            )?;
            stmt.query_map(
                params![external_user_id, is_removal, channel, n as i64],
                row_to_emoji_count,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = self.conn.prepare(
                "SELECT COUNT(emoji.name) AS uses, emoji.name
                 FROM emoji
                 INNER JOIN reaction ON reaction.emoji_id = emoji.id
                 INNER JOIN slack_user ON slack_user.id = reaction.user_id
                 WHERE slack_user.slack_user_id = ?1
                 AND reaction.remove = ?2
                 GROUP BY emoji.name
                 ORDER BY uses DESC, emoji.name ASC
                 LIMIT ?3",
            )?;
            stmt.query_map(params![external_user_id, is_removal, n as i64], row_to_emoji_count)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    // ========== Statistics ==========

    fn count_rows(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<AtlasStats> {
        Ok(AtlasStats {
            users: self.count_rows("SELECT COUNT(*) FROM slack_user")?,
            emojis: self.count_rows("SELECT COUNT(*) FROM emoji")?,
            messages: self.count_rows("SELECT COUNT(*) FROM message")?,
            reactions: self.count_rows("SELECT COUNT(*) FROM reaction")?,
            unattached_reactions: self.count_rows("SELECT COUNT(*) FROM reaction WHERE message_id IS NULL")?,
            models: self.count_rows("SELECT COUNT(*) FROM model")?,
            analyses: self.count_rows("SELECT COUNT(*) FROM analysis")?,
        })
    }
}

/// Helper to convert a `(uses, name)` row to an EmojiCount
fn row_to_emoji_count(row: &rusqlite::Row) -> rusqlite::Result<EmojiCount> {
    Ok(EmojiCount {
        count: row.get(0)?,
        name: row.get(1)?,
    })
}
