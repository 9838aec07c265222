//! Memory trait — persisted memories, sessions and saved contexts.
//!
//! Everything the assembly engine knows about a conversation comes from a
//! `MemoryStore`: the pinned facts, the recent history window, the session
//! summary and full-text hits from other sessions. The engine writes back
//! exactly one thing, the `AssembledContext` it produced.

use crate::context::AssembledContext;
use crate::error::MemoryError;
use crate::message::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority tiers. Any value in `0..=100` is valid; these are the named levels.
pub mod priority {
    /// Exempt from per-section budget caps.
    pub const CRITICAL: u8 = 100;
    pub const HIGH: u8 = 80;
    pub const MEDIUM: u8 = 50;
    pub const LOW: u8 = 20;
    pub const MINIMAL: u8 = 10;
}

/// The kind of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Message,
    Fact,
    ToolOutput,
    Summary,
    RagResult,
    System,
    AgentState,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Fact => "fact",
            Self::ToolOutput => "tool_output",
            Self::Summary => "summary",
            Self::RagResult => "rag_result",
            Self::System => "system",
            Self::AgentState => "agent_state",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "fact" => Ok(Self::Fact),
            "tool_output" => Ok(Self::ToolOutput),
            "summary" => Ok(Self::Summary),
            "rag_result" => Ok(Self::RagResult),
            "system" => Ok(Self::System),
            "agent_state" => Ok(Self::AgentState),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// A single stored memory. Immutable once created, except for `pinned`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique ID for this memory
    pub id: String,

    /// Owning session, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(rename = "type")]
    pub memory_type: MemoryType,

    pub role: Role,

    pub content: String,

    /// Precomputed token count
    pub tokens: usize,

    /// 0–100, see [`priority`]
    pub priority: u8,

    #[serde(default)]
    pub pinned: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Insert payload for [`MemoryStore::add_memory`].
///
/// Stores assign an id when `id` is `None`, stamp `created_at` when it is
/// `None`, and clamp `priority` to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub role: Role,
    pub content: String,
    pub tokens: usize,
    pub priority: u8,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewMemory {
    /// A chat message with `MEDIUM` priority.
    pub fn message(session_id: impl Into<String>, role: Role, content: impl Into<String>, tokens: usize) -> Self {
        Self {
            id: None,
            session_id: Some(session_id.into()),
            memory_type: MemoryType::Message,
            role,
            content: content.into(),
            tokens,
            priority: priority::MEDIUM,
            pinned: false,
            created_at: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// A pinned fact with `HIGH` priority.
    pub fn pinned_fact(session_id: impl Into<String>, content: impl Into<String>, tokens: usize) -> Self {
        Self {
            memory_type: MemoryType::Fact,
            role: Role::System,
            priority: priority::HIGH,
            pinned: true,
            ..Self::message(session_id, Role::System, content, tokens)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Resolve defaults into a concrete [`Memory`].
    pub fn into_memory(self, generated_id: impl FnOnce() -> String) -> Memory {
        Memory {
            id: self.id.unwrap_or_else(generated_id),
            session_id: self.session_id,
            memory_type: self.memory_type,
            role: self.role,
            content: self.content,
            tokens: self.tokens,
            priority: self.priority.min(priority::CRITICAL),
            pinned: self.pinned,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            metadata: self.metadata,
        }
    }
}

/// Aggregate bookkeeping for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySession {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub first_message_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,

    pub message_count: u64,
    pub user_message_count: u64,
    pub assistant_message_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    pub total_tokens: u64,
}

/// Longest session title derived from the first user message.
pub const SESSION_TITLE_MAX_CHARS: usize = 60;

impl MemorySession {
    /// A session opened by its first memory.
    pub fn open(id: impl Into<String>, first: &Memory) -> Self {
        let mut session = Self {
            id: id.into(),
            title: None,
            first_message_at: first.created_at,
            last_message_at: first.created_at,
            message_count: 0,
            user_message_count: 0,
            assistant_message_count: 0,
            summary: None,
            total_tokens: 0,
        };
        session.record(first);
        session
    }

    /// Fold one newly inserted memory into the counters.
    pub fn record(&mut self, memory: &Memory) {
        self.message_count += 1;
        match memory.role {
            Role::User => self.user_message_count += 1,
            Role::Assistant => self.assistant_message_count += 1,
            Role::System | Role::Tool => {}
        }
        self.total_tokens = self.total_tokens.saturating_add(memory.tokens as u64);
        if memory.created_at < self.first_message_at {
            self.first_message_at = memory.created_at;
        }
        if memory.created_at > self.last_message_at {
            self.last_message_at = memory.created_at;
        }
        if self.title.is_none() && memory.role == Role::User && !memory.content.trim().is_empty() {
            self.title = Some(memory.content.trim().chars().take(SESSION_TITLE_MAX_CHARS).collect());
        }
    }
}

/// Filter for [`MemoryStore::get_session_memories`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    /// Only memories with `pinned == true`
    pub pinned_only: bool,

    /// Restrict to these types; `None` means all types
    pub types: Option<Vec<MemoryType>>,
}

impl MemoryFilter {
    pub fn pinned() -> Self {
        Self {
            pinned_only: true,
            types: None,
        }
    }

    pub fn matches(&self, memory: &Memory) -> bool {
        if self.pinned_only && !memory.pinned {
            return false;
        }
        match &self.types {
            Some(types) => types.contains(&memory.memory_type),
            None => true,
        }
    }
}

/// The storage seam consumed by the assembly engine.
///
/// Implementations: SQLite (FTS5) and in-memory (for testing).
/// List operations return newest first unless stated otherwise.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The store name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a memory, opening or updating its session.
    async fn add_memory(&self, memory: NewMemory) -> Result<Memory, MemoryError>;

    /// Get a memory by ID.
    async fn get_memory(&self, id: &str) -> Result<Option<Memory>, MemoryError>;

    /// Pin or unpin a memory. Returns `false` if no such memory exists.
    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<bool, MemoryError>;

    /// Memories of one session matching `filter`, newest first.
    async fn get_session_memories(
        &self,
        session_id: &str,
        filter: &MemoryFilter,
        limit: usize,
    ) -> Result<Vec<Memory>, MemoryError>;

    /// The `limit` most recent memories of a session, newest first.
    async fn get_recent_memories(&self, session_id: &str, limit: usize) -> Result<Vec<Memory>, MemoryError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<MemorySession>, MemoryError>;

    /// Replace the stored summary of an existing session.
    async fn set_session_summary(&self, session_id: &str, summary: &str) -> Result<bool, MemoryError>;

    /// Full-text search across all sessions, best match first.
    async fn search_memories_fts(&self, query: &str, limit: usize) -> Result<Vec<Memory>, MemoryError>;

    /// Persist an assembled context.
    async fn save_context(&self, context: &AssembledContext) -> Result<(), MemoryError>;

    async fn get_context(&self, id: &str) -> Result<Option<AssembledContext>, MemoryError>;

    /// Attach a trace id to a saved context. Returns `false` if it does not exist.
    async fn attach_trace(&self, context_id: &str, trace_id: &str) -> Result<bool, MemoryError>;
}
