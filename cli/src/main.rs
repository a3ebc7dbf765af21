//! CLI entrypoint for Agent Council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use council_application::{
    ConversationStore, CouncilOrchestrator, NoObserver, OrchestratorError, WorkflowObserver,
    build_proxies,
};
use council_domain::OutputFormat;
use council_domain::agent::validation::has_errors;
use council_infrastructure::{ConfigLoader, FileConfig, HttpProviderFactory, JsonlLogStore};
use council_presentation::{
    ChatRepl, Cli, ConsoleFormatter, OutputFormatter, ProgressReporter, RoundReport,
    with_interrupt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(&cli)?;

    info!("Starting Agent Council");

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    // === Configuration ===
    let config: FileConfig = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow!("{}", e))?
    };

    if !config.display.use_color() {
        colored::control::set_override(false);
    }

    let issues = config.validate();
    if !issues.is_empty() {
        eprint!("{}", ConsoleFormatter::format_issues(&issues));
    }
    if has_errors(&issues) {
        bail!("Configuration is not valid. Run with --show-config to see which files were read.");
    }

    let roster = config.into_roster()?;
    let mut params = config.execution_params();
    if let Some(secs) = cli.timeout {
        if secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        params = params.with_phase_timeout(Duration::from_secs(secs));
    }
    let working_dir = cli.working_dir.clone().unwrap_or_else(|| config.working_dir());

    // === Dependency Injection ===
    let persistence = Arc::new(
        JsonlLogStore::new(&working_dir)
            .with_context(|| format!("cannot use {} for conversation logs", working_dir.display()))?,
    );
    let store = Arc::new(ConversationStore::new(persistence));

    let factory = if cli.offline {
        HttpProviderFactory::offline()
    } else {
        HttpProviderFactory::from_env()
    };
    let proxies = build_proxies(&roster, &factory, &store)?;

    let observer: Arc<dyn WorkflowObserver> = if !config.display.progress_enabled(cli.quiet) {
        Arc::new(NoObserver)
    } else {
        Arc::new(ProgressReporter::new())
    };

    let mut orchestrator =
        CouncilOrchestrator::new(roster, proxies, store, params)?.with_observer(observer);

    for (agent, loaded) in orchestrator.load_histories() {
        match loaded {
            Ok(summary) if summary.found => {
                info!("Loaded {} messages for {}", summary.messages, agent);
                if !summary.repair.is_clean() || summary.undecodable_lines > 0 {
                    warn!(
                        "Repaired log of {}: {} fixes, {} undecodable lines",
                        agent,
                        summary.repair.total(),
                        summary.undecodable_lines
                    );
                }
                if !summary.integrity.is_intact() {
                    warn!(
                        "Log of {} has {} broken integrity links",
                        agent,
                        summary.integrity.issues.len()
                    );
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Starting {} with an empty history: {}", agent, e),
        }
    }

    // Chat mode
    if cli.chat {
        let mut repl = ChatRepl::new(orchestrator).with_history_file(config.display.history_path());
        repl.run().await?;
        report_unsaved(&repl.into_orchestrator());
        return Ok(());
    }

    // Single prompt mode - prompt is required
    let prompt = match cli.prompt.as_deref() {
        Some(p) => p.to_string(),
        None => bail!("A prompt is required. Use --chat for interactive mode."),
    };

    let format = config.display.resolve_format(cli.output.map(Into::into));

    if !cli.quiet && format != OutputFormat::Json {
        println!();
        println!("+============================================================+");
        println!("|              Agent Council - LLM Council                   |");
        println!("+============================================================+");
        println!();
        println!("Prompt: {}", prompt);
        println!(
            "Agents: {}",
            orchestrator
                .roster()
                .agents()
                .iter()
                .map(|a| format!("{} ({})", a.name, a.model))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
    }

    let handle = orchestrator.abort_handle();
    let outcome = with_interrupt(handle, orchestrator.run_round(&prompt))
        .await
        .map(|_| ());

    // Partial rounds are still shown.
    let report = RoundReport::from_state(orchestrator.state(), orchestrator.roster());
    println!("{}", ConsoleFormatter.render(&report, format));

    report_unsaved(&orchestrator);

    match outcome {
        Ok(()) => Ok(()),
        Err(OrchestratorError::SelectionRequired) => {
            bail!("synthesis_policy = \"manual\" needs a choice; use --chat and /select")
        }
        Err(e) => Err(e.into()),
    }
}

/// Install the tracing subscriber: stderr by default, or a non-blocking
/// file writer for `--log-file`.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("--log-file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Retry pending log writes once more and tell the user what is still unsaved.
fn report_unsaved(orchestrator: &CouncilOrchestrator) {
    for (agent, error) in orchestrator.flush() {
        eprintln!(
            "warning: {} unsaved records for {} ({})",
            orchestrator.store().unsaved(&agent),
            agent,
            error
        );
    }
}
