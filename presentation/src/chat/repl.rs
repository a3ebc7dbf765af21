//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::chat::command::ReplCommand;
use crate::output::console::ConsoleFormatter;
use colored::Colorize;
use council_application::{AbortHandle, CouncilOrchestrator, OrchestratorError};
use council_domain::CohortResponse;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Run `future`, aborting the council round if Ctrl-C arrives meanwhile.
///
/// The round stops at the orchestrator's next cancellation point; `future`
/// still completes (with [`OrchestratorError::Aborted`]).
pub async fn with_interrupt<T>(handle: AbortHandle, future: impl Future<Output = T>) -> T {
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });
    let result = future.await;
    watcher.abort();
    result
}

/// Interactive chat REPL
pub struct ChatRepl {
    orchestrator: CouncilOrchestrator,
    history_path: Option<PathBuf>,
}

impl ChatRepl {
    /// Create a new ChatRepl
    pub fn new(orchestrator: CouncilOrchestrator) -> Self {
        Self {
            orchestrator,
            history_path: None,
        }
    }

    /// Persist readline history at `path`
    pub fn with_history_file(mut self, path: Option<PathBuf>) -> Self {
        self.history_path = path;
        self
    }

    /// Give the orchestrator back, e.g. to flush it on exit
    pub fn into_orchestrator(self) -> CouncilOrchestrator {
        self.orchestrator
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        if let Some(path) = &self.history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome();

        loop {
            match rl.readline(">>> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    match ReplCommand::parse(line) {
                        Ok(ReplCommand::Quit) => {
                            println!("Bye!");
                            break;
                        }
                        Ok(command) => self.execute(command).await,
                        Err(message) => println!("{}", message),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│          Agent Council - Chat Mode          │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        for agent in self.orchestrator.roster().agents() {
            let role = if agent.is_harmonizer {
                " (harmonizer)"
            } else {
                ""
            };
            let inactive = if agent.active { "" } else { " [inactive]" };
            println!(
                "  {} {}{}{}",
                agent.name.to_string().bold(),
                agent.model,
                role,
                inactive.dimmed()
            );
        }
        println!();
        println!("Type a prompt to broadcast it, then step through the round with");
        println!("/vuln, /judge and /reflect. Type /help for all commands.");
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("Commands:");
        println!("  <prompt>           - Broadcast a prompt (starts a new round)");
        println!("  /vuln              - Ask each agent to critique its peers");
        println!("  /judge             - Ask the harmonizers for a synthesis");
        println!("  /select <name>     - Choose the synthesis to reflect on");
        println!("  /reflect           - Ask each agent to revise its answer");
        println!("  /status            - Show session state and per-agent logs");
        println!("  /timeline          - Show every agent's messages in order");
        println!("  /reset             - Clear all conversation logs");
        println!("  /load <dir>        - Import conversation logs from a directory");
        println!("  /enable <name>     - Include an agent in the next rounds");
        println!("  /disable <name>    - Leave an agent out of the next rounds");
        println!("  /integrity [name]  - Verify the hash chain of the logs on disk");
        println!("  /rebuild <name>    - Rewrite a log with a fresh hash chain");
        println!("  /help, /h, /?      - Show this help");
        println!("  /quit, /exit, /q   - Exit chat");
        println!();
        println!("Ctrl-C while a phase is running aborts the round.");
        println!();
    }

    async fn execute(&mut self, command: ReplCommand) {
        debug!("REPL command: {:?}", command);
        let handle = self.orchestrator.abort_handle();
        let orchestrator = &mut self.orchestrator;
        let result = match command {
            ReplCommand::Broadcast(prompt) => {
                with_interrupt(handle, orchestrator.broadcast(&prompt)).await
            }
            ReplCommand::Vulnerability => {
                with_interrupt(handle, orchestrator.request_vulnerability()).await
            }
            ReplCommand::Judgment => with_interrupt(handle, orchestrator.request_judgment()).await,
            ReplCommand::Reflection => {
                with_interrupt(handle, orchestrator.request_reflection()).await
            }
            ReplCommand::Select(name) => {
                match orchestrator.select_synthesis(&name) {
                    Ok(()) => println!("Reflection will use the synthesis of {}.", name),
                    Err(e) => self.print_error(&e),
                }
                return;
            }
            ReplCommand::Status => {
                print!("{}", ConsoleFormatter::format_status(&orchestrator.status()));
                return;
            }
            ReplCommand::Timeline => {
                print!("{}", ConsoleFormatter::format_timeline(&orchestrator.timeline()));
                return;
            }
            ReplCommand::Reset => {
                match orchestrator.reset() {
                    Ok(()) => println!("All conversation logs cleared."),
                    Err(e) => self.print_error(&e),
                }
                return;
            }
            ReplCommand::Load(dir) => {
                self.load(&dir);
                return;
            }
            ReplCommand::Enable(name) => {
                self.set_active(&name, true);
                return;
            }
            ReplCommand::Disable(name) => {
                self.set_active(&name, false);
                return;
            }
            ReplCommand::Integrity(agent) => {
                match orchestrator.integrity(agent.as_deref()) {
                    Ok(statuses) => print!("{}", ConsoleFormatter::format_integrity(&statuses)),
                    Err(e) => self.print_error(&e),
                }
                return;
            }
            ReplCommand::Rebuild(name) => {
                match orchestrator.rebuild_integrity(&name) {
                    Ok(before) if before.is_intact() => {
                        println!("{} was intact; its chain has been rewritten.", name)
                    }
                    Ok(before) => println!(
                        "{} re-sealed; {} issue(s) cleared.",
                        name,
                        before.on_disk.issues.len() + before.resealed.len()
                    ),
                    Err(e) => self.print_error(&e),
                }
                return;
            }
            ReplCommand::Help => {
                self.print_help();
                return;
            }
            ReplCommand::Quit => return,
        };

        match result {
            Ok(cohort) => self.print_cohort(&cohort),
            Err(e) => self.print_error(&e),
        }
    }

    fn print_cohort(&self, cohort: &CohortResponse) {
        print!(
            "{}",
            ConsoleFormatter::format_cohort(
                self.orchestrator.state(),
                self.orchestrator.roster(),
                cohort
            )
        );
        println!();
    }

    fn set_active(&mut self, name: &str, active: bool) {
        match self.orchestrator.set_active(name, active) {
            Ok(previous) if previous == active => {
                println!("{} is already {}.", name, if active { "active" } else { "inactive" })
            }
            Ok(_) if active => println!("{} joins the next round.", name),
            Ok(_) => println!("{} sits out until enabled again.", name),
            Err(e) => self.print_error(&e),
        }
    }

    fn load(&mut self, dir: &Path) {
        match self.orchestrator.import_histories(dir) {
            Ok(imported) if imported.is_empty() => {
                println!("No logs for this roster found in {}", dir.display());
            }
            Ok(imported) => {
                for (agent, summary) in imported {
                    let mut line = format!("  {} {} messages", agent, summary.messages);
                    if !summary.repair.is_clean() {
                        line.push_str(&format!(", {} repairs", summary.repair.total()));
                    }
                    if summary.undecodable_lines > 0 {
                        line.push_str(&format!(", {} lines skipped", summary.undecodable_lines));
                    }
                    println!("{}", line);
                }
            }
            Err(e) => self.print_error(&e),
        }
    }

    fn print_error(&self, error: &OrchestratorError) {
        eprintln!("{} {}", "Error:".red().bold(), error);
        match error {
            OrchestratorError::SelectionRequired => {
                let names: Vec<String> = self
                    .orchestrator
                    .roster()
                    .harmonizers()
                    .map(|h| h.name.to_string())
                    .collect();
                eprintln!("Choose one with /select <{}>", names.join("|"));
            }
            OrchestratorError::Aborted => {
                eprintln!("Round aborted. Broadcast a new prompt to start over.");
            }
            _ => {}
        }
    }
}
