//! End-to-end integration tests for Threadwise.
//!
//! The pipeline tests drive the assembler against both store
//! implementations; the binary tests run the `threadwise` executable
//! against a throwaway home directory and database.

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use threadwise_context::{AssemblyRequest, ContextAssembler};
use threadwise_core::context::{AssembledContext, AssemblyOptions, SectionFractions, SectionType};
use threadwise_core::memory::{MemoryStore, NewMemory, priority};
use threadwise_core::message::{ContextMessage, Role};
use threadwise_memory::{InMemoryStore, SqliteStore};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn at(minute: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, 14, 0, 0).unwrap() + Duration::minutes(minute)
}

/// A short support conversation plus one pinned fact and one unrelated session.
async fn seed(store: &dyn MemoryStore) {
    let turns = [
        (Role::User, "my build fails with a linker error"),
        (Role::Assistant, "which target are you building for"),
        (Role::User, "aarch64 linux from an x86 laptop"),
        (Role::Assistant, "install the aarch64 cross linker"),
    ];
    for (i, (role, content)) in turns.into_iter().enumerate() {
        let tokens = content.split_whitespace().count();
        store
            .add_memory(
                NewMemory::message("support", role, content, tokens)
                    .with_id(format!("turn-{i}"))
                    .with_created_at(at(i as i64)),
            )
            .await
            .unwrap();
    }
    store
        .add_memory(
            NewMemory::pinned_fact("support", "customer uses nix for builds", 5)
                .with_id("fact-nix")
                .with_created_at(at(10)),
        )
        .await
        .unwrap();
    store
        .add_memory(
            NewMemory::message("other", Role::Assistant, "set the linker in cargo config for cross builds", 9)
                .with_id("kb-linker")
                .with_created_at(at(20)),
        )
        .await
        .unwrap();
    store
        .set_session_summary("support", "debugging an aarch64 cross build")
        .await
        .unwrap();
}

async fn sqlite_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap())
}

fn rag_options() -> AssemblyOptions {
    AssemblyOptions {
        rag_sources: vec!["memories".into()],
        ..AssemblyOptions::default()
    }
}

async fn assemble_support(store: Arc<dyn MemoryStore>, budget: usize) -> AssembledContext {
    let assembler = ContextAssembler::new(store).with_default_options(rag_options());
    let request = AssemblyRequest::new("support", "which linker for cross builds", "test-model", budget)
        .with_system_prompt("You are a build engineer.");
    assembler.assemble(&request).await.unwrap()
}

// ── Pipeline ─────────────────────────────────────────────────────────────

async fn full_pipeline(store: Arc<dyn MemoryStore>) {
    seed(store.as_ref()).await;
    let ctx = assemble_support(store.clone(), 400).await;

    let types: Vec<SectionType> = ctx.sections.iter().map(|s| s.section_type).collect();
    assert_eq!(
        types,
        vec![
            SectionType::System,
            SectionType::Summary,
            SectionType::Rag,
            SectionType::Pinned,
            SectionType::History,
            SectionType::UserMessage,
        ]
    );

    let rag = ctx.section(SectionType::Rag).unwrap();
    assert_eq!(rag.source_ids, vec!["kb-linker"]);

    // The pinned fact is also recent history; both sources keep it.
    let history = ctx.section(SectionType::History).unwrap();
    assert_eq!(
        history.source_ids,
        vec!["turn-0", "turn-1", "turn-2", "turn-3", "fact-nix"]
    );

    assert_eq!(ctx.messages.len(), 6);
    assert_eq!(ctx.messages[0], ContextMessage::system("You are a build engineer."));
    assert_eq!(ctx.messages[1], ContextMessage::system("debugging an aarch64 cross build"));
    assert!(ctx.messages[4].content.starts_with("Conversation history:\nmy build fails"));
    assert_eq!(ctx.messages[5], ContextMessage::user("which linker for cross builds"));

    let sum: usize = ctx.sections.iter().map(|s| s.tokens).sum();
    assert_eq!(ctx.tokens_used, sum);

    let saved = store.get_context(&ctx.id).await.unwrap().unwrap();
    assert_eq!(saved.sections, ctx.sections);
    assert_eq!(saved.messages, ctx.messages);
}

#[tokio::test]
async fn e2e_full_pipeline_in_memory() {
    full_pipeline(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test]
async fn e2e_full_pipeline_sqlite() {
    full_pipeline(sqlite_store().await).await;
}

async fn replay_is_deterministic(store: Arc<dyn MemoryStore>) {
    seed(store.as_ref()).await;
    let first = assemble_support(store.clone(), 40).await;
    let second = assemble_support(store.clone(), 40).await;

    assert_eq!(first.sections, second.sections);
    assert_eq!(first.messages, second.messages);
    assert_eq!(first.tokens_used, second.tokens_used);
    assert!(!first.debug.exclusion_reasons.is_empty());
}

#[tokio::test]
async fn e2e_replay_is_deterministic_in_memory() {
    replay_is_deterministic(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test]
async fn e2e_replay_is_deterministic_sqlite() {
    replay_is_deterministic(sqlite_store().await).await;
}

#[tokio::test]
async fn e2e_tight_budget_keeps_critical_and_orders_history() {
    let store = sqlite_store().await;
    seed(store.as_ref()).await;

    // history cap = floor(30 * 0.30) = 9
    let ctx = assemble_support(store.clone(), 30).await;

    assert!(ctx.section(SectionType::System).is_some());
    assert!(ctx.section(SectionType::UserMessage).is_some());

    let history = ctx.section(SectionType::History).unwrap();
    assert!(history.tokens <= 9);
    let positions: Vec<usize> = history
        .source_ids
        .iter()
        .map(|id| ["turn-0", "turn-1", "turn-2", "turn-3", "fact-nix"].iter().position(|t| t == id).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(
        ctx.debug
            .exclusion_reasons
            .contains_key("Budget exceeded for history")
    );
}

#[tokio::test]
async fn e2e_zero_pinned_cap_excludes_fact() {
    let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
    store
        .add_memory(NewMemory::pinned_fact("s", "prefers short answers", 3).with_id("p"))
        .await
        .unwrap();

    let options = AssemblyOptions {
        fractions: SectionFractions {
            pinned: 0.05,
            ..SectionFractions::default()
        },
        history_limit: 0,
        ..AssemblyOptions::default()
    };
    let assembler = ContextAssembler::new(store);
    let ctx = assembler
        .assemble(&AssemblyRequest::new("s", "Hi", "m", 5).with_options(options))
        .await
        .unwrap();

    assert!(ctx.section(SectionType::Pinned).is_none());
    assert_eq!(ctx.debug.exclusion_reasons["Budget exceeded for pinned"], 1);
    assert_eq!(ctx.debug.section_tokens.len(), 1);
    assert_eq!(ctx.debug.section_tokens[0].section_type, SectionType::UserMessage);
}

#[tokio::test]
async fn e2e_unpinned_fact_leaves_pinned_section() {
    let store = sqlite_store().await;
    seed(store.as_ref()).await;
    assert!(store.set_pinned("fact-nix", false).await.unwrap());

    let ctx = assemble_support(store.clone(), 400).await;
    assert!(ctx.section(SectionType::Pinned).is_none());
    assert_eq!(
        ctx.section(SectionType::History).unwrap().priority,
        ((priority::MEDIUM as usize * 4 + priority::HIGH as usize) / 5) as u8
    );
}

#[tokio::test]
async fn e2e_trace_attached_after_assembly() {
    let store = sqlite_store().await;
    seed(store.as_ref()).await;
    let assembler = ContextAssembler::new(store.clone());
    let ctx = assembler
        .assemble(&AssemblyRequest::new("support", "Hi", "m", 100))
        .await
        .unwrap();

    assert!(assembler.attach_trace(&ctx.id, "trace-abc").await.unwrap());
    let saved = store.get_context(&ctx.id).await.unwrap().unwrap();
    assert_eq!(saved.trace_id.as_deref(), Some("trace-abc"));
}

// ── Binary ───────────────────────────────────────────────────────────────

fn threadwise(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_threadwise"))
        .args(args)
        .env("HOME", home)
        .env("THREADWISE_DB", home.join("threadwise.sqlite"))
        .env_remove("THREADWISE_MODEL")
        .env_remove("THREADWISE_TOKEN_BUDGET")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run threadwise binary")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn e2e_cli_remember_assemble_inspect_trace() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    stdout(&threadwise(home, &["remember", "-s", "cli", "--id", "q1", "how do I pin a memory"]));
    stdout(&threadwise(
        home,
        &["remember", "-s", "cli", "--id", "a1", "-r", "assistant", "use the pin command"],
    ));
    stdout(&threadwise(
        home,
        &["remember", "-s", "cli", "--id", "f1", "-t", "fact", "-r", "system", "user is on linux"],
    ));
    stdout(&threadwise(home, &["pin", "f1"]));
    stdout(&threadwise(home, &["summarize", "-s", "cli", "asked about pinning"]));

    let json = stdout(&threadwise(
        home,
        &["assemble", "-s", "cli", "-m", "and unpin", "-b", "200", "--system", "Be concise."],
    ));
    let ctx: AssembledContext = serde_json::from_str(&json).unwrap();
    assert_eq!(ctx.token_budget, 200);
    assert_eq!(ctx.model_id, "anthropic/claude-sonnet-4");
    assert_eq!(ctx.section(SectionType::Pinned).unwrap().source_ids, vec!["f1"]);
    assert_eq!(ctx.section(SectionType::Summary).unwrap().content, "asked about pinning");
    assert_eq!(ctx.messages.last().unwrap(), &ContextMessage::user("and unpin"));

    let report = stdout(&threadwise(home, &["inspect", &ctx.id]));
    assert!(report.contains(&ctx.id));
    assert!(report.contains("pinned"));

    stdout(&threadwise(home, &["trace", &ctx.id, "trace-cli"]));
    let saved = stdout(&threadwise(home, &["inspect", &ctx.id, "--json"]));
    let saved: AssembledContext = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved.trace_id.as_deref(), Some("trace-cli"));
    assert_eq!(saved.sections, ctx.sections);
}

#[test]
fn e2e_cli_missing_ids_fail() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    assert!(!threadwise(home, &["pin", "nope"]).status.success());
    assert!(!threadwise(home, &["inspect", "nope"]).status.success());
    assert!(!threadwise(home, &["trace", "nope", "t"]).status.success());
    assert!(!threadwise(home, &["summarize", "-s", "ghost", "text"]).status.success());
}

#[test]
fn e2e_cli_config_default_is_valid_toml() {
    let home = tempfile::tempdir().unwrap();
    let text = stdout(&threadwise(home.path(), &["config", "default"]));
    let config: threadwise_config::AppConfig = toml::from_str(&text).unwrap();
    assert_eq!(config.assembly.history_limit, 50);
}
