//! Context assembly pipeline.
//!
//! One `assemble` call runs a single pass:
//!
//! 1. **Gather** candidates from the store (system, pinned, history, summary,
//!    user message, retrieval)
//! 2. **Score** relevance against the user message and **rank** by the
//!    composite key
//! 3. **Allocate** per-section caps from the budget fractions
//! 4. **Select** greedily; critical items are admitted over their cap
//! 5. **Build** sections, then the role-tagged message list
//! 6. **Record** token attribution and exclusion reasons
//! 7. **Persist** the result (best-effort) and return it
//!
//! # Determinism
//!
//! Identical inputs against an unchanged store produce identical
//! `sections`, `messages` and `tokens_used`. Only `id`, `created_at` and
//! `debug.assembly_time_ms` vary between calls.

use crate::debug::DebugRecorder;
use crate::gather::{CandidateGatherer, GatherInput};
use crate::messages::MessageBuilder;
use crate::score::Scorer;
use crate::sections::SectionBuilder;
use crate::select::{BudgetAllocator, Selector};
use crate::token::{TokenEstimator, WordCountEstimator, estimator_for};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use threadwise_config::AppConfig;
use threadwise_core::context::{AssembledContext, AssemblyOptions, CacheStats};
use threadwise_core::error::MemoryError;
use threadwise_core::memory::MemoryStore;
use tracing::{debug, info, warn};

/// Errors from context assembly.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// A mandatory source (pinned, history, session) could not be read.
    #[error("Memory store error: {0}")]
    Store(#[from] MemoryError),
}

/// All inputs for one assembly call.
#[derive(Debug, Clone)]
pub struct AssemblyRequest<'a> {
    pub session_id: &'a str,
    pub user_message: &'a str,
    pub model_id: &'a str,
    pub token_budget: usize,
    pub system_prompt: Option<&'a str>,
    /// `None` uses the assembler's defaults
    pub options: Option<AssemblyOptions>,
    /// Recorded verbatim in the debug info
    pub cache: CacheStats,
}

impl<'a> AssemblyRequest<'a> {
    pub fn new(session_id: &'a str, user_message: &'a str, model_id: &'a str, token_budget: usize) -> Self {
        Self {
            session_id,
            user_message,
            model_id,
            token_budget,
            system_prompt: None,
            options: None,
            cache: CacheStats::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: &'a str) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn with_options(mut self, options: AssemblyOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_cache_stats(mut self, cache: CacheStats) -> Self {
        self.cache = cache;
        self
    }
}

/// The context assembler. Holds no per-call state; share it via `Arc`.
pub struct ContextAssembler {
    store: Arc<dyn MemoryStore>,
    estimator: Arc<dyn TokenEstimator>,
    defaults: AssemblyOptions,
}

impl ContextAssembler {
    /// An assembler with default options and word-count token estimation.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            estimator: Arc::new(WordCountEstimator),
            defaults: AssemblyOptions::default(),
        }
    }

    /// An assembler configured from the `[assembly]` section.
    pub fn from_config(store: Arc<dyn MemoryStore>, config: &AppConfig) -> Self {
        Self {
            store,
            estimator: estimator_for(config.assembly.token_estimator),
            defaults: config.assembly.to_options(),
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_default_options(mut self, options: AssemblyOptions) -> Self {
        self.defaults = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    pub fn default_options(&self) -> &AssemblyOptions {
        &self.defaults
    }

    /// Assemble the context for the next LLM call of one session.
    pub async fn assemble(&self, request: &AssemblyRequest<'_>) -> Result<AssembledContext, AssemblyError> {
        let started = Instant::now();
        let now = Utc::now();
        let options = request.options.as_ref().unwrap_or(&self.defaults);

        // 1. Gather
        let gatherer = CandidateGatherer::new(self.store.as_ref(), self.estimator.as_ref());
        let mut candidates = gatherer
            .gather(&GatherInput {
                session_id: request.session_id,
                user_message: request.user_message,
                system_prompt: request.system_prompt,
                options,
                now,
            })
            .await?;

        // 2. Score + rank
        Scorer::new(request.user_message).score_all(&mut candidates);
        Scorer::rank(&mut candidates);

        // 3. Allocate
        let caps = BudgetAllocator::allocate(request.token_budget, &options.fractions);

        // 4. Select
        let used = Selector::select(&mut candidates, &caps);
        debug!(
            session_id = request.session_id,
            budget = request.token_budget,
            sections_used = ?used,
            "Selection complete"
        );

        // 5. Sections + messages
        let sections = SectionBuilder::build(&candidates);
        let messages = MessageBuilder::build(&sections);
        let tokens_used = sections.iter().fold(0usize, |acc, s| acc.saturating_add(s.tokens));

        // 6. Debug trail
        let debug = DebugRecorder::record(&candidates, &sections, tokens_used, started.elapsed(), request.cache);

        let context = AssembledContext {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: request.session_id.to_string(),
            model_id: request.model_id.to_string(),
            token_budget: request.token_budget,
            tokens_used,
            sections,
            messages,
            debug,
            trace_id: None,
            created_at: now,
        };

        // 7. Persist, best-effort
        if let Err(e) = self.store.save_context(&context).await {
            warn!(
                context_id = %context.id,
                store = self.store.name(),
                error = %e,
                "Failed to persist assembled context"
            );
        }

        info!(
            context_id = %context.id,
            session_id = request.session_id,
            tokens_used = context.tokens_used,
            budget = context.token_budget,
            included = context.debug.candidates_included,
            excluded = context.debug.candidates_excluded,
            elapsed_ms = context.debug.assembly_time_ms,
            "Context assembled"
        );

        Ok(context)
    }

    /// Attach a trace id to a previously saved context.
    pub async fn attach_trace(&self, context_id: &str, trace_id: &str) -> Result<bool, AssemblyError> {
        Ok(self.store.attach_trace(context_id, trace_id).await?)
    }
}
