//! `threadwise assemble | inspect | trace` — Context commands.

use super::{CommandResult, load_config, open_store};
use std::path::Path;
use threadwise_config::AppConfig;
use threadwise_context::{AssemblyRequest, ContextAssembler};
use threadwise_core::context::{AssembledContext, AssemblyOptions};

pub struct AssembleArgs {
    pub session: String,
    pub message: String,
    pub model: Option<String>,
    pub budget: Option<usize>,
    pub system: Option<String>,
    pub rag_sources: Vec<String>,
    pub no_summary: bool,
}

impl AssembleArgs {
    /// Config defaults with command-line overrides applied.
    fn options(&self, config: &AppConfig) -> AssemblyOptions {
        let mut options = config.assembly.to_options();
        if !self.rag_sources.is_empty() {
            options.rag_sources = self.rag_sources.clone();
        }
        if self.no_summary {
            options.include_summary = false;
        }
        options
    }
}

pub async fn assemble(config_path: Option<&Path>, args: AssembleArgs) -> CommandResult {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;
    let assembler = ContextAssembler::from_config(store, &config);

    let model = args.model.as_deref().unwrap_or(&config.default_model);
    let budget = args.budget.unwrap_or(config.default_token_budget);
    if budget == 0 {
        return Err("token budget must be > 0".into());
    }

    let mut request = AssemblyRequest::new(&args.session, &args.message, model, budget).with_options(args.options(&config));
    if let Some(system) = args.system.as_deref() {
        request = request.with_system_prompt(system);
    }

    let context = assembler.assemble(&request).await?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

pub async fn inspect(config_path: Option<&Path>, id: &str, json: bool) -> CommandResult {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    let Some(context) = store.get_context(id).await? else {
        return Err(format!("No saved context with id {id}").into());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else {
        print!("{}", render_report(&context));
    }
    Ok(())
}

pub async fn trace(config_path: Option<&Path>, context_id: &str, trace_id: &str) -> CommandResult {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;
    let assembler = ContextAssembler::from_config(store, &config);

    if !assembler.attach_trace(context_id, trace_id).await? {
        return Err(format!("No saved context with id {context_id}").into());
    }
    println!("🔗 Attached trace {trace_id} to context {context_id}");
    Ok(())
}

/// Human-readable summary of a saved context and its debug trail.
fn render_report(context: &AssembledContext) -> String {
    let mut out = String::new();
    let debug = &context.debug;

    out.push_str(&format!("🧵 Context {}\n", context.id));
    out.push_str("==========================================\n");
    out.push_str(&format!("  Session:     {}\n", context.session_id));
    out.push_str(&format!("  Model:       {}\n", context.model_id));
    out.push_str(&format!("  Created:     {}\n", context.created_at.to_rfc3339()));
    out.push_str(&format!(
        "  Tokens:      {} / {} ({:.1}%)\n",
        context.tokens_used,
        context.token_budget,
        context.utilization() * 100.0
    ));
    out.push_str(&format!(
        "  Trace:       {}\n",
        context.trace_id.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!(
        "  Candidates:  {} considered, {} included, {} excluded\n",
        debug.candidates_considered, debug.candidates_included, debug.candidates_excluded
    ));
    out.push_str(&format!("  Assembly:    {:.2} ms\n", debug.assembly_time_ms));

    out.push_str("\n  Sections:\n");
    for attribution in &debug.section_tokens {
        out.push_str(&format!(
            "    {:<15} {:>6} tokens {:>6.1}%  {} source(s): {}\n",
            attribution.section_type.as_str(),
            attribution.tokens,
            attribution.percentage * 100.0,
            attribution.source_count,
            attribution.sample_sources.join(", ")
        ));
    }

    if !debug.exclusion_reasons.is_empty() {
        out.push_str("\n  Exclusions:\n");
        for (reason, count) in &debug.exclusion_reasons {
            out.push_str(&format!("    {count:>4} × {reason}\n"));
        }
    }

    out
}
