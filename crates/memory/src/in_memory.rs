//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use threadwise_core::context::AssembledContext;
use threadwise_core::error::MemoryError;
use threadwise_core::memory::{Memory, MemoryFilter, MemorySession, MemoryStore, NewMemory};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    sessions: BTreeMap<String, MemorySession>,
    /// Insertion order; index breaks `created_at` ties.
    memories: Vec<Memory>,
    contexts: Vec<AssembledContext>,
}

/// An in-memory store that keeps everything in `Vec`s and maps.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Number of saved contexts.
    pub async fn context_count(&self) -> usize {
        self.state.read().await.contexts.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric search terms, deduplicated.
fn search_terms(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Memories selected by `keep`, newest first.
fn newest_first<'a>(
    memories: &'a [Memory],
    keep: impl Fn(&Memory) -> bool,
    limit: usize,
) -> Vec<Memory> {
    let mut picked: Vec<(usize, &'a Memory)> =
        memories.iter().enumerate().filter(|(_, m)| keep(m)).collect();
    picked.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
    picked.into_iter().take(limit).map(|(_, m)| m.clone()).collect()
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add_memory(&self, memory: NewMemory) -> Result<Memory, MemoryError> {
        let memory = memory.into_memory(|| Uuid::new_v4().to_string());
        let mut state = self.state.write().await;
        if state.memories.iter().any(|m| m.id == memory.id) {
            return Err(MemoryError::Storage(format!("duplicate memory id: {}", memory.id)));
        }
        if let Some(session_id) = &memory.session_id {
            state
                .sessions
                .entry(session_id.clone())
                .and_modify(|session| session.record(&memory))
                .or_insert_with(|| MemorySession::open(session_id.clone(), &memory));
        }
        state.memories.push(memory.clone());
        Ok(memory)
    }

    async fn get_memory(&self, id: &str) -> Result<Option<Memory>, MemoryError> {
        let state = self.state.read().await;
        Ok(state.memories.iter().find(|m| m.id == id).cloned())
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<bool, MemoryError> {
        let mut state = self.state.write().await;
        match state.memories.iter_mut().find(|m| m.id == id) {
            Some(memory) => {
                memory.pinned = pinned;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_session_memories(
        &self,
        session_id: &str,
        filter: &MemoryFilter,
        limit: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        let state = self.state.read().await;
        Ok(newest_first(
            &state.memories,
            |m| m.session_id.as_deref() == Some(session_id) && filter.matches(m),
            limit,
        ))
    }

    async fn get_recent_memories(&self, session_id: &str, limit: usize) -> Result<Vec<Memory>, MemoryError> {
        let state = self.state.read().await;
        Ok(newest_first(
            &state.memories,
            |m| m.session_id.as_deref() == Some(session_id),
            limit,
        ))
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<MemorySession>, MemoryError> {
        Ok(self.state.read().await.sessions.get(session_id).cloned())
    }

    async fn set_session_summary(&self, session_id: &str, summary: &str) -> Result<bool, MemoryError> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(session_id) {
            Some(session) => {
                session.summary = Some(summary.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search_memories_fts(&self, query: &str, limit: usize) -> Result<Vec<Memory>, MemoryError> {
        let terms = search_terms(query);
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let state = self.state.read().await;

        // (matched terms, index, memory)
        let mut hits: Vec<(usize, usize, &Memory)> = state
            .memories
            .iter()
            .enumerate()
            .filter_map(|(i, m)| {
                let content_terms = search_terms(&m.content);
                let matched = terms.intersection(&content_terms).count();
                (matched > 0).then_some((matched, i, m))
            })
            .collect();

        hits.sort_by(|(ma, ia, a), (mb, ib, b)| {
            mb.cmp(ma)
                .then(b.created_at.cmp(&a.created_at))
                .then(ib.cmp(ia))
        });
        hits.truncate(limit);
        Ok(hits.into_iter().map(|(_, _, m)| m.clone()).collect())
    }

    async fn save_context(&self, context: &AssembledContext) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        state.contexts.retain(|c| c.id != context.id);
        state.contexts.push(context.clone());
        Ok(())
    }

    async fn get_context(&self, id: &str) -> Result<Option<AssembledContext>, MemoryError> {
        let state = self.state.read().await;
        Ok(state.contexts.iter().find(|c| c.id == id).cloned())
    }

    async fn attach_trace(&self, context_id: &str, trace_id: &str) -> Result<bool, MemoryError> {
        let mut state = self.state.write().await;
        match state.contexts.iter_mut().find(|c| c.id == context_id) {
            Some(context) => {
                context.trace_id = Some(trace_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
