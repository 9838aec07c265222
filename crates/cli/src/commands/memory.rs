//! `threadwise remember | pin | unpin | summarize` — Memory management commands.

use super::{CommandResult, load_config, open_store};
use std::path::Path;
use threadwise_context::estimator_for;
use threadwise_core::memory::{MemoryType, NewMemory};
use threadwise_core::message::Role;

pub struct RememberArgs {
    pub session: String,
    pub content: String,
    pub role: String,
    pub memory_type: String,
    pub priority: u8,
    pub pinned: bool,
    pub tokens: Option<usize>,
    pub id: Option<String>,
}

impl RememberArgs {
    /// Validate the textual arguments into an insert payload.
    fn into_new_memory(self, estimate: impl Fn(&str) -> usize) -> Result<NewMemory, String> {
        let role: Role = self.role.parse()?;
        let memory_type: MemoryType = self.memory_type.parse()?;
        if self.priority > 100 {
            return Err(format!("priority must be 0–100, got {}", self.priority));
        }
        let tokens = self.tokens.unwrap_or_else(|| estimate(&self.content));

        let mut memory = NewMemory::message(self.session, role, self.content, tokens).with_priority(self.priority);
        memory.memory_type = memory_type;
        memory.pinned = self.pinned;
        if let Some(id) = self.id {
            memory = memory.with_id(id);
        }
        Ok(memory)
    }
}

pub async fn remember(config_path: Option<&Path>, args: RememberArgs) -> CommandResult {
    let config = load_config(config_path)?;
    let estimator = estimator_for(config.assembly.token_estimator);
    let new_memory = args.into_new_memory(|text| estimator.estimate(text))?;

    let store = open_store(&config).await?;
    let memory = store.add_memory(new_memory).await?;

    println!(
        "🧠 Remembered {} ({} tokens, priority {}{}) in session {}",
        memory.id,
        memory.tokens,
        memory.priority,
        if memory.pinned { ", pinned" } else { "" },
        memory.session_id.as_deref().unwrap_or("-"),
    );
    Ok(())
}

pub async fn set_pinned(config_path: Option<&Path>, id: &str, pinned: bool) -> CommandResult {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    if !store.set_pinned(id, pinned).await? {
        return Err(format!("No memory with id {id}").into());
    }
    println!("📌 {} {id}", if pinned { "Pinned" } else { "Unpinned" });
    Ok(())
}

pub async fn summarize(config_path: Option<&Path>, session: &str, summary: &str) -> CommandResult {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    if !store.set_session_summary(session, summary).await? {
        return Err(format!("No session {session}; remember something in it first").into());
    }
    println!("📝 Stored summary for session {session}");
    Ok(())
}
