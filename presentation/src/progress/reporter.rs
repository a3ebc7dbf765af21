//! Progress reporting for council rounds

use colored::Colorize;
use council_application::{AgentStatus, PersistenceError, WorkflowObserver};
use council_domain::{AgentName, CohortResponse, WorkflowPhase};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Reports progress during a council round with progress bars
pub struct ProgressReporter {
    multi: MultiProgress,
    phase_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            phase_bar: Mutex::new(None),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn phase_display_name(phase: WorkflowPhase) -> &'static str {
        match phase {
            WorkflowPhase::Broadcast => "Phase 1: Broadcast",
            WorkflowPhase::Vulnerability => "Phase 2: Vulnerability Analysis",
            WorkflowPhase::Judgment => "Phase 3: Judgment",
            WorkflowPhase::Reflection => "Phase 4: Reflection",
        }
    }

    fn phase_short_name(phase: WorkflowPhase) -> &'static str {
        match phase {
            WorkflowPhase::Broadcast => "Phase 1",
            WorkflowPhase::Vulnerability => "Phase 2",
            WorkflowPhase::Judgment => "Phase 3",
            WorkflowPhase::Reflection => "Phase 4",
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowObserver for ProgressReporter {
    fn on_phase_start(&self, phase: WorkflowPhase, agents: &[AgentName]) {
        let pb = self.multi.add(ProgressBar::new(agents.len() as u64));
        pb.set_style(Self::phase_style());
        pb.set_prefix(Self::phase_display_name(phase).to_string());
        pb.set_message("Starting...");

        *self.phase_bar.lock().unwrap_or_else(|e| e.into_inner()) = Some(pb);
    }

    fn on_agent_status(&self, _phase: WorkflowPhase, agent: &AgentName, status: &AgentStatus) {
        let guard = self.phase_bar.lock().unwrap_or_else(|e| e.into_inner());
        let Some(pb) = guard.as_ref() else {
            return;
        };
        match status {
            AgentStatus::Busy => pb.set_message(format!("{} thinking...", agent)),
            AgentStatus::Succeeded => {
                pb.set_message(format!("{} {}", "v".green(), agent));
                pb.inc(1);
            }
            AgentStatus::Failed(reason) => {
                pb.set_message(format!("{} {} ({})", "x".red(), agent, reason));
                pb.inc(1);
            }
        }
    }

    fn on_phase_complete(&self, phase: WorkflowPhase, cohort: &CohortResponse) {
        if let Some(pb) = self
            .phase_bar
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let responded = cohort.successes().count();
            pb.finish_with_message(format!(
                "{} complete! ({}/{} responded)",
                Self::phase_short_name(phase).green(),
                responded,
                cohort.len()
            ));
        }
    }

    fn on_persistence_warning(&self, agent: &AgentName, error: &PersistenceError) {
        let line = format!(
            "{} log of {} not saved yet: {}",
            "warning:".yellow().bold(),
            agent,
            error
        );
        if self.multi.println(&line).is_err() {
            eprintln!("{}", line);
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl WorkflowObserver for SimpleProgress {
    fn on_phase_start(&self, phase: WorkflowPhase, agents: &[AgentName]) {
        println!(
            "{} {} ({} agents)",
            "->".cyan(),
            ProgressReporter::phase_display_name(phase).bold(),
            agents.len()
        );
    }

    fn on_agent_status(&self, _phase: WorkflowPhase, agent: &AgentName, status: &AgentStatus) {
        match status {
            AgentStatus::Busy => {}
            AgentStatus::Succeeded => println!("  {} {}", "v".green(), agent),
            AgentStatus::Failed(reason) => {
                println!("  {} {} (failed: {})", "x".red(), agent, reason)
            }
        }
    }

    fn on_phase_complete(&self, _phase: WorkflowPhase, _cohort: &CohortResponse) {
        println!();
    }

    fn on_persistence_warning(&self, agent: &AgentName, error: &PersistenceError) {
        eprintln!(
            "{} log of {} not saved yet: {}",
            "warning:".yellow().bold(),
            agent,
            error
        );
    }
}
