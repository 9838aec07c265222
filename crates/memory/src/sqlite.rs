//! SQLite store with FTS5 full-text search.
//!
//! Uses a single SQLite database file with four tables:
//! - `sessions` — per-conversation counters and the stored summary
//! - `memories` — the raw memory records
//! - `memories_fts` — FTS5 virtual table for ranked keyword search (BM25)
//! - `contexts` — every assembled context, stored as JSON for replay
//!
//! Triggers keep the FTS index in sync on insert/delete/update.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool};
use std::str::FromStr;
use threadwise_core::context::AssembledContext;
use threadwise_core::error::MemoryError;
use threadwise_core::memory::{Memory, MemoryFilter, MemorySession, MemoryStore, NewMemory};
use tracing::{debug, info};
use uuid::Uuid;

/// A production SQLite memory store with FTS5 full-text search.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite memory store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations — creates tables, FTS5 virtual table, and triggers.
    async fn run_migrations(&self) -> Result<(), MemoryError> {
        let statements: [(&str, &str); 9] = [
            (
                "sessions table",
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    id                      TEXT PRIMARY KEY,
                    title                   TEXT,
                    first_message_at        TEXT NOT NULL,
                    last_message_at         TEXT NOT NULL,
                    message_count           INTEGER NOT NULL DEFAULT 0,
                    user_message_count      INTEGER NOT NULL DEFAULT 0,
                    assistant_message_count INTEGER NOT NULL DEFAULT 0,
                    summary                 TEXT,
                    total_tokens            INTEGER NOT NULL DEFAULT 0
                )
                "#,
            ),
            // Integer rowid alias for FTS5 sync
            (
                "memories table",
                r#"
                CREATE TABLE IF NOT EXISTS memories (
                    iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                    id           TEXT UNIQUE NOT NULL,
                    session_id   TEXT,
                    memory_type  TEXT NOT NULL,
                    role         TEXT NOT NULL,
                    content      TEXT NOT NULL,
                    tokens       INTEGER NOT NULL DEFAULT 0,
                    priority     INTEGER NOT NULL DEFAULT 50,
                    pinned       INTEGER NOT NULL DEFAULT 0,
                    created_at   TEXT NOT NULL,
                    metadata     TEXT NOT NULL DEFAULT '{}'
                )
                "#,
            ),
            // External-content FTS5 table synced via triggers
            (
                "FTS5 table",
                r#"
                CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                    content,
                    content='memories',
                    content_rowid='iid',
                    tokenize='porter unicode61'
                )
                "#,
            ),
            (
                "insert trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
                    INSERT INTO memories_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
            (
                "delete trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
                    INSERT INTO memories_fts(memories_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                END
                "#,
            ),
            // Only content changes touch the index; pin/unpin does not.
            (
                "update trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE OF content ON memories BEGIN
                    INSERT INTO memories_fts(memories_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                    INSERT INTO memories_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
            (
                "session index",
                "CREATE INDEX IF NOT EXISTS idx_memories_session ON memories(session_id, created_at DESC)",
            ),
            (
                "contexts table",
                r#"
                CREATE TABLE IF NOT EXISTS contexts (
                    id           TEXT PRIMARY KEY,
                    session_id   TEXT NOT NULL,
                    model_id     TEXT NOT NULL,
                    token_budget INTEGER NOT NULL,
                    tokens_used  INTEGER NOT NULL,
                    payload      TEXT NOT NULL,
                    trace_id     TEXT,
                    created_at   TEXT NOT NULL
                )
                "#,
            ),
            (
                "contexts index",
                "CREATE INDEX IF NOT EXISTS idx_contexts_session ON contexts(session_id, created_at DESC)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Fixed-width timestamps so lexical order matches time order.
    fn timestamp(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(id: &str, raw: &str) -> Result<DateTime<Utc>, MemoryError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MemoryError::Corrupt {
                id: id.to_string(),
                reason: format!("timestamp {raw:?}: {e}"),
            })
    }

    fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, MemoryError>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| MemoryError::QueryFailed(format!("{name} column: {e}")))
    }

    /// Parse a `Memory` from a SQLite row.
    fn row_to_memory(row: &SqliteRow) -> Result<Memory, MemoryError> {
        let id: String = Self::column(row, "id")?;
        let corrupt = |reason: String| MemoryError::Corrupt {
            id: id.clone(),
            reason,
        };

        let memory_type = Self::column::<String>(row, "memory_type")?
            .parse()
            .map_err(corrupt)?;
        let role = Self::column::<String>(row, "role")?.parse().map_err(corrupt)?;
        let metadata_json: String = Self::column(row, "metadata")?;
        let metadata = serde_json::from_str(&metadata_json)
            .map_err(|e| corrupt(format!("metadata: {e}")))?;
        let created_at = Self::parse_timestamp(&id, &Self::column::<String>(row, "created_at")?)?;
        let tokens: i64 = Self::column(row, "tokens")?;
        let priority: i64 = Self::column(row, "priority")?;

        Ok(Memory {
            session_id: Self::column(row, "session_id")?,
            memory_type,
            role,
            content: Self::column(row, "content")?,
            tokens: usize::try_from(tokens).map_err(|_| corrupt(format!("negative token count {tokens}")))?,
            priority: priority.clamp(0, 100) as u8,
            pinned: Self::column(row, "pinned")?,
            created_at,
            metadata,
            id,
        })
    }

    fn row_to_session(row: &SqliteRow) -> Result<MemorySession, MemoryError> {
        let id: String = Self::column(row, "id")?;
        let count = |name: &str| -> Result<u64, MemoryError> {
            Ok(Self::column::<i64>(row, name)?.max(0) as u64)
        };
        Ok(MemorySession {
            title: Self::column(row, "title")?,
            first_message_at: Self::parse_timestamp(&id, &Self::column::<String>(row, "first_message_at")?)?,
            last_message_at: Self::parse_timestamp(&id, &Self::column::<String>(row, "last_message_at")?)?,
            message_count: count("message_count")?,
            user_message_count: count("user_message_count")?,
            assistant_message_count: count("assistant_message_count")?,
            summary: Self::column(row, "summary")?,
            total_tokens: count("total_tokens")?,
            id,
        })
    }

    /// Build a safe FTS5 query from user text.
    ///
    /// Each word is stripped to alphanumerics, quoted to prevent injection,
    /// prefix-matched with `*`, and the terms are OR-ed so any overlap counts.
    fn sanitize_fts_query(text: &str) -> String {
        text.split_whitespace()
            .filter_map(|w| {
                let clean: String = w
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                (!clean.is_empty()).then(|| format!("\"{clean}\"*"))
            })
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

#[async_trait]
impl MemoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add_memory(&self, memory: NewMemory) -> Result<Memory, MemoryError> {
        let memory = memory.into_memory(|| Uuid::new_v4().to_string());
        let tokens = i64::try_from(memory.tokens)
            .map_err(|_| MemoryError::Storage(format!("Token count {} exceeds storage range", memory.tokens)))?;
        let metadata_json = serde_json::to_string(&memory.metadata)
            .map_err(|e| MemoryError::Storage(format!("Metadata serialization: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO memories
                (id, session_id, memory_type, role, content, tokens, priority, pinned, created_at, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&memory.id)
        .bind(&memory.session_id)
        .bind(memory.memory_type.as_str())
        .bind(memory.role.as_str())
        .bind(&memory.content)
        .bind(tokens)
        .bind(memory.priority as i64)
        .bind(memory.pinned)
        .bind(Self::timestamp(&memory.created_at))
        .bind(&metadata_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        if let Some(session_id) = &memory.session_id {
            let existing = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| MemoryError::QueryFailed(format!("Session lookup: {e}")))?;

            let session = match existing {
                Some(ref row) => {
                    let mut session = Self::row_to_session(row)?;
                    session.record(&memory);
                    session
                }
                None => MemorySession::open(session_id.clone(), &memory),
            };

            sqlx::query(
                r#"
                INSERT INTO sessions
                    (id, title, first_message_at, last_message_at, message_count,
                     user_message_count, assistant_message_count, summary, total_tokens)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    first_message_at = excluded.first_message_at,
                    last_message_at = excluded.last_message_at,
                    message_count = excluded.message_count,
                    user_message_count = excluded.user_message_count,
                    assistant_message_count = excluded.assistant_message_count,
                    total_tokens = excluded.total_tokens
                "#,
            )
            .bind(&session.id)
            .bind(&session.title)
            .bind(Self::timestamp(&session.first_message_at))
            .bind(Self::timestamp(&session.last_message_at))
            .bind(session.message_count as i64)
            .bind(session.user_message_count as i64)
            .bind(session.assistant_message_count as i64)
            .bind(&session.summary)
            .bind(i64::try_from(session.total_tokens).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await
            .map_err(|e| MemoryError::Storage(format!("Session upsert failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(memory_id = %memory.id, "Stored memory");
        Ok(memory)
    }

    async fn get_memory(&self, id: &str) -> Result<Option<Memory>, MemoryError> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("GET by ID: {e}")))?;

        row.as_ref().map(Self::row_to_memory).transpose()
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<bool, MemoryError> {
        let result = sqlx::query("UPDATE memories SET pinned = ?1 WHERE id = ?2")
            .bind(pinned)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("UPDATE pinned failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_session_memories(
        &self,
        session_id: &str,
        filter: &MemoryFilter,
        limit: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        let mut sql = String::from("SELECT * FROM memories WHERE session_id = ?1");
        if filter.pinned_only {
            sql.push_str(" AND pinned = 1");
        }
        // Type names come from the enum, never from user input.
        if let Some(types) = &filter.types {
            if types.is_empty() {
                return Ok(vec![]);
            }
            let names: Vec<String> = types.iter().map(|t| format!("'{}'", t.as_str())).collect();
            sql.push_str(&format!(" AND memory_type IN ({})", names.join(", ")));
        }
        sql.push_str(" ORDER BY created_at DESC, iid DESC LIMIT ?2");

        let rows = sqlx::query(&sql)
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Session memories: {e}")))?;

        rows.iter().map(Self::row_to_memory).collect()
    }

    async fn get_recent_memories(&self, session_id: &str, limit: usize) -> Result<Vec<Memory>, MemoryError> {
        self.get_session_memories(session_id, &MemoryFilter::default(), limit)
            .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<MemorySession>, MemoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Session lookup: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn set_session_summary(&self, session_id: &str, summary: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("UPDATE sessions SET summary = ?1 WHERE id = ?2")
            .bind(summary)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("UPDATE summary failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_memories_fts(&self, query: &str, limit: usize) -> Result<Vec<Memory>, MemoryError> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        // bm25() returns negative values (lower = better match)
        let rows = sqlx::query(
            r#"
            SELECT m.*, bm25(memories_fts) AS rank
            FROM memories_fts f
            JOIN memories m ON m.iid = f.rowid
            WHERE memories_fts MATCH ?1
            ORDER BY rank, m.iid DESC
            LIMIT ?2
            "#,
        )
        .bind(&fts_query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("FTS5 search: {e}")))?;

        rows.iter().map(Self::row_to_memory).collect()
    }

    async fn save_context(&self, context: &AssembledContext) -> Result<(), MemoryError> {
        let payload = serde_json::to_string(context)
            .map_err(|e| MemoryError::Storage(format!("Context serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO contexts
                (id, session_id, model_id, token_budget, tokens_used, payload, trace_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                tokens_used = excluded.tokens_used,
                trace_id = excluded.trace_id
            "#,
        )
        .bind(&context.id)
        .bind(&context.session_id)
        .bind(&context.model_id)
        .bind(context.token_budget as i64)
        .bind(i64::try_from(context.tokens_used).unwrap_or(i64::MAX))
        .bind(&payload)
        .bind(&context.trace_id)
        .bind(Self::timestamp(&context.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("Context INSERT failed: {e}")))?;

        debug!(context_id = %context.id, "Saved assembled context");
        Ok(())
    }

    async fn get_context(&self, id: &str) -> Result<Option<AssembledContext>, MemoryError> {
        let row = sqlx::query("SELECT payload, trace_id FROM contexts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Context lookup: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = Self::column(&row, "payload")?;
        let mut context: AssembledContext =
            serde_json::from_str(&payload).map_err(|e| MemoryError::Corrupt {
                id: id.to_string(),
                reason: format!("payload: {e}"),
            })?;
        // The column is authoritative; traces are attached after the payload is written.
        context.trace_id = Self::column(&row, "trace_id")?;
        Ok(Some(context))
    }

    async fn attach_trace(&self, context_id: &str, trace_id: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("UPDATE contexts SET trace_id = ?1 WHERE id = ?2")
            .bind(trace_id)
            .bind(context_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("UPDATE trace failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use threadwise_core::context::{ContextSection, DebugInfo, SectionType};
    use threadwise_core::memory::MemoryType;
    use threadwise_core::message::{ContextMessage, Role};

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn msg(session: &str, role: Role, content: &str, minute: i64) -> NewMemory {
        NewMemory::message(session, role, content, content.split_whitespace().count())
            .with_created_at(at(minute))
    }

    fn sample_context(id: &str) -> AssembledContext {
        AssembledContext {
            id: id.into(),
            session_id: "s1".into(),
            model_id: "test-model".into(),
            token_budget: 100,
            tokens_used: 1,
            sections: vec![ContextSection {
                section_type: SectionType::UserMessage,
                content: "Hi".into(),
                tokens: 1,
                priority: 100,
                source_ids: vec!["user_message".into()],
            }],
            messages: vec![ContextMessage::user("Hi")],
            debug: DebugInfo {
                candidates_considered: 1,
                candidates_included: 1,
                candidates_excluded: 0,
                section_tokens: vec![],
                exclusion_reasons: Default::default(),
                assembly_time_ms: 0.25,
                cache_hits: 2,
                cache_misses: 1,
            },
            trace_id: None,
            created_at: at(0),
        }
    }

    #[tokio::test]
    async fn add_and_get() {
        let db = test_store().await;
        let mut new = msg("s1", Role::User, "Rust is a systems programming language", 0);
        new.metadata.insert("channel".into(), serde_json::json!("cli"));
        let stored = db.add_memory(new).await.unwrap();
        assert!(!stored.id.is_empty());

        let fetched = db.get_memory(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.metadata["channel"], "cli");
        assert!(db.get_memory("missing").await.unwrap().is_none());
    }

    #[cfg(target_pointer_width = "64")]
    #[tokio::test]
    async fn token_count_beyond_column_range_is_rejected() {
        let db = test_store().await;
        let huge = NewMemory::message("s1", Role::User, "log dump", i64::MAX as usize + 10).with_id("dump");
        let err = db.add_memory(huge).await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage(_)));
        assert!(db.get_memory("dump").await.unwrap().is_none());
        assert!(db.get_session("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn negative_stored_tokens_are_corrupt() {
        let db = test_store().await;
        db.add_memory(msg("s1", Role::User, "hello there", 0).with_id("m1")).await.unwrap();
        sqlx::query("UPDATE memories SET tokens = -1 WHERE id = ?1")
            .bind("m1")
            .execute(&db.pool)
            .await
            .unwrap();

        let err = db.get_memory("m1").await.unwrap_err();
        assert!(matches!(err, MemoryError::Corrupt { ref id, .. } if id == "m1"));
    }

    #[tokio::test]
    async fn duplicate_id_is_an_error() {
        let db = test_store().await;
        db.add_memory(msg("s1", Role::User, "one", 0).with_id("m1")).await.unwrap();
        assert!(db.add_memory(msg("s1", Role::User, "two", 1).with_id("m1")).await.is_err());

        // The failed insert must not have touched the session counters.
        let session = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 1);
    }

    #[tokio::test]
    async fn session_counters() {
        let db = test_store().await;
        db.add_memory(msg("s1", Role::User, "How do lifetimes work?", 0)).await.unwrap();
        db.add_memory(msg("s1", Role::Assistant, "They bound borrows.", 1)).await.unwrap();
        db.add_memory(msg("s1", Role::Tool, "{}", 2)).await.unwrap();

        let session = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 3);
        assert_eq!(session.user_message_count, 1);
        assert_eq!(session.assistant_message_count, 1);
        assert_eq!(session.total_tokens, 8);
        assert_eq!(session.title.as_deref(), Some("How do lifetimes work?"));
        assert_eq!(session.first_message_at, at(0));
        assert_eq!(session.last_message_at, at(2));
    }

    #[tokio::test]
    async fn summary_survives_later_inserts() {
        let db = test_store().await;
        db.add_memory(msg("s1", Role::User, "hello", 0)).await.unwrap();
        assert!(db.set_session_summary("s1", "Greeting exchanged").await.unwrap());
        db.add_memory(msg("s1", Role::Assistant, "hi", 1)).await.unwrap();

        let session = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.summary.as_deref(), Some("Greeting exchanged"));
        assert!(!db.set_session_summary("nope", "x").await.unwrap());
    }

    #[tokio::test]
    async fn recent_memories_newest_first() {
        let db = test_store().await;
        for i in 0..5 {
            db.add_memory(msg("s1", Role::User, &format!("message {i}"), i)).await.unwrap();
        }
        db.add_memory(msg("s2", Role::User, "other session", 9)).await.unwrap();

        let recent = db.get_recent_memories("s1", 2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 4", "message 3"]);
    }

    #[tokio::test]
    async fn pinned_and_type_filters() {
        let db = test_store().await;
        let fact = db
            .add_memory(NewMemory::pinned_fact("s1", "Prefers metric units", 3).with_created_at(at(0)))
            .await
            .unwrap();
        db.add_memory(msg("s1", Role::User, "plain", 1)).await.unwrap();

        let pinned = db.get_session_memories("s1", &MemoryFilter::pinned(), 20).await.unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].id, fact.id);

        let messages_only = MemoryFilter {
            pinned_only: false,
            types: Some(vec![MemoryType::Message]),
        };
        let messages = db.get_session_memories("s1", &messages_only, 20).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "plain");

        assert!(db.set_pinned(&fact.id, false).await.unwrap());
        assert!(db.get_session_memories("s1", &MemoryFilter::pinned(), 20).await.unwrap().is_empty());
        assert!(!db.set_pinned("missing", true).await.unwrap());
    }

    #[tokio::test]
    async fn fts5_search_any_term() {
        let db = test_store().await;
        db.add_memory(msg("a", Role::User, "The quick brown fox jumps over the lazy dog", 0)).await.unwrap();
        db.add_memory(msg("b", Role::User, "A fast brown cat sits on the mat", 1)).await.unwrap();
        db.add_memory(msg("c", Role::User, "Rust programming is fun", 2)).await.unwrap();

        let results = db.search_memories_fts("brown fox", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("fox"), "both terms rank first");

        assert!(db.search_memories_fts("zebra", 10).await.unwrap().is_empty());
        assert!(db.search_memories_fts("!!!", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fts5_respects_limit() {
        let db = test_store().await;
        for i in 0..20 {
            db.add_memory(msg("s1", Role::User, &format!("Memory about topic number {i}"), i))
                .await
                .unwrap();
        }
        assert_eq!(db.search_memories_fts("topic", 5).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn context_round_trip_and_trace() {
        let db = test_store().await;
        let ctx = sample_context("ctx_1");
        db.save_context(&ctx).await.unwrap();

        let fetched = db.get_context("ctx_1").await.unwrap().unwrap();
        assert_eq!(fetched, ctx);

        assert!(db.attach_trace("ctx_1", "trace-42").await.unwrap());
        let traced = db.get_context("ctx_1").await.unwrap().unwrap();
        assert_eq!(traced.trace_id.as_deref(), Some("trace-42"));
        assert_eq!(traced.sections, ctx.sections);

        assert!(!db.attach_trace("missing", "t").await.unwrap());
        assert!(db.get_context("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn data_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("memory.sqlite").display());

        {
            let db = SqliteStore::new(&path).await.unwrap();
            db.add_memory(msg("s1", Role::User, "remember me", 0)).await.unwrap();
            db.save_context(&sample_context("ctx_1")).await.unwrap();
        }

        let db = SqliteStore::new(&path).await.unwrap();
        assert_eq!(db.get_recent_memories("s1", 10).await.unwrap().len(), 1);
        assert!(db.get_context("ctx_1").await.unwrap().is_some());
    }

    #[test]
    fn sanitize_fts_query_basic() {
        assert_eq!(
            SqliteStore::sanitize_fts_query("hello world"),
            "\"hello\"* OR \"world\"*"
        );
    }

    #[test]
    fn sanitize_fts_query_special_chars() {
        assert_eq!(
            SqliteStore::sanitize_fts_query("hello! @world# \"; DROP"),
            "\"hello\"* OR \"world\"* OR \"DROP\"*"
        );
    }

    #[test]
    fn sanitize_fts_query_empty() {
        assert_eq!(SqliteStore::sanitize_fts_query("   "), "");
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = SqliteStore::timestamp(&at(0));
        let b = SqliteStore::timestamp(&(at(0) + Duration::microseconds(5)));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
