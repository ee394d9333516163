//! SQLite-based conversation mirror storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::{ConversationStore, SearchFilters};
use crate::models::{
    AttemptType, AuthorKind, Conversation, ConversationId, ConversationSyncState, Message,
    MessageId, RequestPattern, SyncAttempt, SyncPeriod, SyncStatus,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Mirrored conversations
            CREATE TABLE conversations (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                customer_email TEXT
            );

            CREATE INDEX idx_conversations_updated_at
                ON conversations(updated_at DESC);
            CREATE INDEX idx_conversations_customer_email
                ON conversations(customer_email);

            -- Messages, replaced wholesale when a conversation is upserted
            CREATE TABLE messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                author TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                part_kind TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_messages_conversation_id ON messages(conversation_id);

            -- Tags on conversations (normalized, many-to-many)
            CREATE TABLE conversation_tags (
                conversation_id TEXT NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (conversation_id, tag),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_conversation_tags_tag ON conversation_tags(tag);

            -- Time windows swept by discovery passes
            CREATE TABLE sync_periods (
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                total_conversations INTEGER NOT NULL DEFAULT 0,
                new_conversations INTEGER NOT NULL DEFAULT 0,
                updated_conversations INTEGER NOT NULL DEFAULT 0,
                last_synced_at TEXT NOT NULL,
                PRIMARY KEY (start_at, end_at)
            );

            CREATE INDEX idx_sync_periods_last_synced ON sync_periods(last_synced_at);

            -- Per-conversation sync bookkeeping
            CREATE TABLE conversation_sync_state (
                conversation_id TEXT PRIMARY KEY,
                last_full_sync TEXT,
                last_incremental_sync TEXT,
                last_attempt TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                error_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_error_at TEXT,
                completion_pct REAL NOT NULL DEFAULT 0,
                -- Denormalized max(last_full_sync, last_incremental_sync)
                -- for oldest-first candidate queries
                last_synced TEXT
            );

            CREATE INDEX idx_sync_state_last_synced
                ON conversation_sync_state(last_synced);

            -- Append-only audit trail of sync attempts
            CREATE TABLE sync_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                attempt_type TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                messages_before INTEGER NOT NULL DEFAULT 0,
                messages_after INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );

            CREATE INDEX idx_sync_attempts_conversation
                ON sync_attempts(conversation_id);

            -- Append-only caller request history for adaptive scheduling
            CREATE TABLE request_patterns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                window_start TEXT,
                window_end TEXT,
                data_freshness_seconds INTEGER NOT NULL,
                sync_triggered INTEGER NOT NULL DEFAULT 0,
                requested_at TEXT NOT NULL
            );

            CREATE INDEX idx_request_patterns_requested_at
                ON request_patterns(requested_at DESC);
            "#,
        ),
    ])
}

/// Format a timestamp with fixed precision so lexicographic TEXT ordering
/// matches chronological ordering.
fn to_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp in database: {}", s))?
        .with_timezone(&Utc))
}

fn from_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(from_ts).transpose()
}

/// SQLite-backed implementation of [`ConversationStore`]
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Open (or create) a mirror database at the given path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL for concurrent readers during writes; NORMAL sync is safe with
        // WAL; foreign_keys must be ON for ON DELETE CASCADE.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
        let mut stmt = conn.prepare(
            "SELECT id, author, body, created_at, part_kind FROM messages
             WHERE conversation_id = ? ORDER BY created_at ASC",
        )?;

        let rows = stmt
            .query_map([conversation_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, author, body, created_at, part_kind)| {
                Ok(Message {
                    id: MessageId::new(id),
                    conversation_id: ConversationId::new(conversation_id),
                    author: AuthorKind::parse(&author),
                    body,
                    created_at: from_ts(&created_at)?,
                    part_kind,
                })
            })
            .collect()
    }

    fn load_tags(conn: &Connection, conversation_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT tag FROM conversation_tags WHERE conversation_id = ? ORDER BY tag")?;
        let tags = stmt
            .query_map([conversation_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn load_conversation(
        conn: &Connection,
        id: &str,
        created_at: &str,
        updated_at: &str,
        customer_email: Option<String>,
    ) -> Result<Conversation> {
        Ok(Conversation {
            id: ConversationId::new(id),
            created_at: from_ts(created_at)?,
            updated_at: from_ts(updated_at)?,
            customer_email,
            tags: Self::load_tags(conn, id)?,
            messages: Self::load_messages(conn, id)?,
        })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn store_conversations(&self, conversations: &[Conversation]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for conv in conversations {
            tx.execute(
                "INSERT INTO conversations (id, created_at, updated_at, customer_email)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at,
                     customer_email = excluded.customer_email",
                params![
                    conv.id.as_str(),
                    to_ts(&conv.created_at),
                    to_ts(&conv.updated_at),
                    conv.customer_email,
                ],
            )?;

            // Message list and tags are replaced wholesale
            tx.execute(
                "DELETE FROM messages WHERE conversation_id = ?",
                [conv.id.as_str()],
            )?;
            for msg in &conv.messages {
                tx.execute(
                    "INSERT INTO messages (id, conversation_id, author, body, created_at, part_kind)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        msg.id.as_str(),
                        conv.id.as_str(),
                        msg.author.as_str(),
                        msg.body,
                        to_ts(&msg.created_at),
                        msg.part_kind,
                    ],
                )?;
            }

            tx.execute(
                "DELETE FROM conversation_tags WHERE conversation_id = ?",
                [conv.id.as_str()],
            )?;
            for tag in &conv.tags {
                tx.execute(
                    "INSERT INTO conversation_tags (conversation_id, tag) VALUES (?1, ?2)",
                    params![conv.id.as_str(), tag],
                )?;
            }
        }

        tx.commit()?;
        Ok(conversations.len())
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(String, String, Option<String>)> = conn
            .query_row(
                "SELECT created_at, updated_at, customer_email FROM conversations WHERE id = ?",
                [id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((created_at, updated_at, customer_email)) => Ok(Some(Self::load_conversation(
                &conn,
                id.as_str(),
                &created_at,
                &updated_at,
                customer_email,
            )?)),
            None => Ok(None),
        }
    }

    fn stored_message_count(&self, id: &ConversationId) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn search_conversations(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();

        let mut sql =
            String::from("SELECT id, created_at, updated_at, customer_email FROM conversations");
        let mut clauses: Vec<&str> = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(t) = filters.updated_after {
            clauses.push("updated_at >= ?");
            bound.push(Box::new(to_ts(&t)));
        }
        if let Some(t) = filters.updated_before {
            clauses.push("updated_at < ?");
            bound.push(Box::new(to_ts(&t)));
        }
        if let Some(email) = &filters.customer_email {
            clauses.push("customer_email = ?");
            bound.push(Box::new(email.clone()));
        }
        if let Some(tag) = &filters.tag {
            clauses.push("id IN (SELECT conversation_id FROM conversation_tags WHERE tag = ?)");
            bound.push(Box::new(tag.clone()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY updated_at DESC LIMIT ?");
        bound.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, created_at, updated_at, customer_email)| {
                Self::load_conversation(&conn, &id, &created_at, &updated_at, customer_email)
            })
            .collect()
    }

    fn count_conversations(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn count_messages(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn record_sync_period(&self, period: &SyncPeriod) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_periods
                 (start_at, end_at, total_conversations, new_conversations,
                  updated_conversations, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(start_at, end_at) DO UPDATE SET
                 total_conversations = excluded.total_conversations,
                 new_conversations = excluded.new_conversations,
                 updated_conversations = excluded.updated_conversations,
                 last_synced_at = excluded.last_synced_at",
            params![
                to_ts(&period.start),
                to_ts(&period.end),
                period.total_conversations as i64,
                period.new_conversations as i64,
                period.updated_conversations as i64,
                to_ts(&period.last_synced_at),
            ],
        )?;
        Ok(())
    }

    fn periods_needing_sync(&self, max_age: Duration, limit: usize) -> Result<Vec<SyncPeriod>> {
        let conn = self.conn.lock().unwrap();
        let cutoff = to_ts(&(Utc::now() - max_age));

        let mut stmt = conn.prepare(
            "SELECT start_at, end_at, total_conversations, new_conversations,
                    updated_conversations, last_synced_at
             FROM sync_periods
             WHERE last_synced_at < ?1
             ORDER BY last_synced_at ASC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![cutoff, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(start, end, total, new, updated, synced)| {
                Ok(SyncPeriod {
                    start: from_ts(&start)?,
                    end: from_ts(&end)?,
                    total_conversations: total as usize,
                    new_conversations: new as usize,
                    updated_conversations: updated as usize,
                    last_synced_at: from_ts(&synced)?,
                })
            })
            .collect()
    }

    fn latest_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let max: Option<String> =
            conn.query_row("SELECT MAX(last_synced_at) FROM sync_periods", [], |r| {
                r.get(0)
            })?;
        from_ts_opt(max)
    }

    fn record_request_pattern(&self, pattern: &RequestPattern) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO request_patterns
                 (window_start, window_end, data_freshness_seconds, sync_triggered, requested_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pattern.window_start.as_ref().map(to_ts),
                pattern.window_end.as_ref().map(to_ts),
                pattern.data_freshness_seconds,
                pattern.sync_triggered,
                to_ts(&pattern.requested_at),
            ],
        )?;
        Ok(())
    }

    fn stale_timeframes(
        &self,
        threshold: Duration,
        limit: usize,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT window_start, window_end, MAX(requested_at) AS latest
             FROM request_patterns
             WHERE data_freshness_seconds > ?1
               AND window_start IS NOT NULL AND window_end IS NOT NULL
             GROUP BY window_start, window_end
             ORDER BY latest DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![threshold.num_seconds(), limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(start, end)| Ok((from_ts(&start)?, from_ts(&end)?)))
            .collect()
    }

    fn get_sync_state(&self, id: &ConversationId) -> Result<Option<ConversationSyncState>> {
        let conn = self.conn.lock().unwrap();

        type StateRow = (
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            i64,
            Option<String>,
            Option<String>,
            f64,
        );

        let row: Option<StateRow> = conn
            .query_row(
                "SELECT last_full_sync, last_incremental_sync, last_attempt, status,
                        error_count, last_error, last_error_at, completion_pct
                 FROM conversation_sync_state WHERE conversation_id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((full, incr, attempt, status, errors, last_error, error_at, pct)) = row else {
            return Ok(None);
        };

        Ok(Some(ConversationSyncState {
            conversation_id: id.clone(),
            last_full_sync: from_ts_opt(full)?,
            last_incremental_sync: from_ts_opt(incr)?,
            last_attempt: from_ts_opt(attempt)?,
            status: SyncStatus::parse(&status),
            error_count: errors as u32,
            last_error,
            last_error_at: from_ts_opt(error_at)?,
            completion_pct: pct as f32,
        }))
    }

    fn save_sync_state(&self, state: &ConversationSyncState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO conversation_sync_state
                 (conversation_id, last_full_sync, last_incremental_sync, last_attempt,
                  status, error_count, last_error, last_error_at, completion_pct, last_synced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 last_full_sync = excluded.last_full_sync,
                 last_incremental_sync = excluded.last_incremental_sync,
                 last_attempt = excluded.last_attempt,
                 status = excluded.status,
                 error_count = excluded.error_count,
                 last_error = excluded.last_error,
                 last_error_at = excluded.last_error_at,
                 completion_pct = excluded.completion_pct,
                 last_synced = excluded.last_synced",
            params![
                state.conversation_id.as_str(),
                state.last_full_sync.as_ref().map(to_ts),
                state.last_incremental_sync.as_ref().map(to_ts),
                state.last_attempt.as_ref().map(to_ts),
                state.status.as_str(),
                state.error_count as i64,
                state.last_error,
                state.last_error_at.as_ref().map(to_ts),
                state.completion_pct as f64,
                state.last_synced().as_ref().map(to_ts),
            ],
        )?;
        Ok(())
    }

    fn sync_candidates(&self, limit: usize) -> Result<Vec<ConversationId>> {
        let conn = self.conn.lock().unwrap();

        // NULL last_synced (never synced) sorts first, then oldest sync time
        let mut stmt = conn.prepare(
            "SELECT conversation_id FROM conversation_sync_state
             ORDER BY last_synced IS NOT NULL, last_synced ASC, conversation_id ASC
             LIMIT ?",
        )?;

        let ids = stmt
            .query_map([limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids.into_iter().map(ConversationId::new).collect())
    }

    fn reset_sync_state(&self, id: &ConversationId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM conversation_sync_state WHERE conversation_id = ?",
            [id.as_str()],
        )?;
        Ok(())
    }

    fn record_sync_attempt(&self, attempt: &SyncAttempt) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_attempts
                 (conversation_id, attempt_type, status, started_at, duration_ms,
                  messages_before, messages_after, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.conversation_id.as_str(),
                attempt.attempt_type.as_str(),
                attempt.status.as_str(),
                to_ts(&attempt.started_at),
                attempt.duration_ms as i64,
                attempt.messages_before as i64,
                attempt.messages_after as i64,
                attempt.error,
            ],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            DELETE FROM messages;
            DELETE FROM conversation_tags;
            DELETE FROM conversations;
            DELETE FROM sync_periods;
            DELETE FROM conversation_sync_state;
            DELETE FROM sync_attempts;
            DELETE FROM request_patterns;
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorKind, Message, MessageId};

    fn make_conversation(id: &str, age_hours: i64, message_count: usize) -> Conversation {
        let created = Utc::now() - Duration::hours(age_hours);
        let mut conv = Conversation::new(ConversationId::new(id), created, created);
        conv.customer_email = Some(format!("{}@example.com", id));
        conv.tags = vec!["support".to_string()];
        for i in 0..message_count {
            conv.messages.push(Message::new(
                MessageId::new(format!("{}-m{}", id, i)),
                ConversationId::new(id),
                if i % 2 == 0 {
                    AuthorKind::Customer
                } else {
                    AuthorKind::Agent
                },
                format!("message {}", i),
                created + Duration::minutes(i as i64),
                "comment",
            ));
        }
        conv
    }

    #[test]
    fn test_round_trip_conversation() {
        let store = SqliteConversationStore::in_memory().unwrap();
        let conv = make_conversation("c1", 3, 2);
        store.store_conversations(std::slice::from_ref(&conv)).unwrap();

        let loaded = store
            .get_conversation(&ConversationId::new("c1"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, conv.id);
        assert_eq!(loaded.customer_email, conv.customer_email);
        assert_eq!(loaded.tags, conv.tags);
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].id.as_str(), "c1-m0");
        assert_eq!(loaded.messages[1].author, AuthorKind::Agent);
    }

    #[test]
    fn test_upsert_replaces_messages_wholesale() {
        let store = SqliteConversationStore::in_memory().unwrap();
        store
            .store_conversations(&[make_conversation("c1", 3, 4)])
            .unwrap();
        assert_eq!(store.count_messages().unwrap(), 4);

        store
            .store_conversations(&[make_conversation("c1", 3, 2)])
            .unwrap();
        assert_eq!(store.count_messages().unwrap(), 2);
        assert_eq!(store.count_conversations().unwrap(), 1);
    }

    #[test]
    fn test_search_by_window_and_tag() {
        let store = SqliteConversationStore::in_memory().unwrap();
        store
            .store_conversations(&[
                make_conversation("old", 48, 0),
                make_conversation("recent", 1, 0),
            ])
            .unwrap();

        let filters = SearchFilters {
            updated_after: Some(Utc::now() - Duration::hours(24)),
            ..Default::default()
        };
        let results = store.search_conversations(&filters, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "recent");

        let filters = SearchFilters {
            tag: Some("missing".to_string()),
            ..Default::default()
        };
        assert!(store.search_conversations(&filters, 10).unwrap().is_empty());
    }

    #[test]
    fn test_sync_state_round_trip_and_candidates() {
        let store = SqliteConversationStore::in_memory().unwrap();
        let now = Utc::now();

        let mut old = ConversationSyncState::new(ConversationId::new("old"));
        old.complete(AttemptType::Incremental, now - Duration::hours(6));
        let mut new = ConversationSyncState::new(ConversationId::new("new"));
        new.complete(AttemptType::Full, now - Duration::hours(1));
        let never = ConversationSyncState::new(ConversationId::new("never"));

        store.save_sync_state(&old).unwrap();
        store.save_sync_state(&new).unwrap();
        store.save_sync_state(&never).unwrap();

        let loaded = store
            .get_sync_state(&ConversationId::new("old"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, SyncStatus::Completed);
        assert_eq!(loaded.completion_pct, 100.0);

        let candidates = store.sync_candidates(10).unwrap();
        assert_eq!(candidates[0].as_str(), "never");
        assert_eq!(candidates[1].as_str(), "old");
        assert_eq!(candidates[2].as_str(), "new");
    }

    #[test]
    fn test_periods_and_latest_sync_time() {
        let store = SqliteConversationStore::in_memory().unwrap();
        let now = Utc::now();

        let mut period = SyncPeriod::new(now - Duration::days(1), now);
        period.last_synced_at = now - Duration::hours(2);
        store.record_sync_period(&period).unwrap();

        let stale = store.periods_needing_sync(Duration::hours(1), 10).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].start.timestamp(), period.start.timestamp());

        assert!(
            store
                .periods_needing_sync(Duration::hours(3), 10)
                .unwrap()
                .is_empty()
        );

        // Re-recording the same window updates it in place
        period.last_synced_at = now;
        period.total_conversations = 7;
        store.record_sync_period(&period).unwrap();
        assert!(
            store
                .periods_needing_sync(Duration::hours(1), 10)
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store.latest_sync_time().unwrap().unwrap().timestamp(),
            now.timestamp()
        );
    }

    #[test]
    fn test_request_patterns_and_stale_timeframes() {
        let store = SqliteConversationStore::in_memory().unwrap();
        let now = Utc::now();
        let start = now - Duration::days(1);

        store
            .record_request_pattern(&RequestPattern {
                window_start: Some(start),
                window_end: Some(now),
                data_freshness_seconds: 7200,
                sync_triggered: false,
                requested_at: now,
            })
            .unwrap();
        // Windowless reads never become stale timeframes
        store
            .record_request_pattern(&RequestPattern {
                window_start: None,
                window_end: None,
                data_freshness_seconds: 7200,
                sync_triggered: true,
                requested_at: now,
            })
            .unwrap();

        let stale = store.stale_timeframes(Duration::minutes(30), 10).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0.timestamp(), start.timestamp());

        assert!(
            store
                .stale_timeframes(Duration::hours(3), 10)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mirror.db");

        {
            let store = SqliteConversationStore::new(&path).unwrap();
            store
                .store_conversations(&[make_conversation("c1", 1, 2)])
                .unwrap();
        }

        let store = SqliteConversationStore::new(&path).unwrap();
        assert_eq!(store.count_conversations().unwrap(), 1);
        assert_eq!(store.count_messages().unwrap(), 2);
    }
}
