//! Console output formatter for council rounds

use crate::output::formatter::OutputFormatter;
use crate::output::report::{PhaseReport, RoundReport};
use colored::Colorize;
use council_application::{IntegrityStatus, SessionStatus};
use council_domain::agent::validation::{ConfigIssue, Severity};
use council_domain::{CohortResponse, Roster, TimelineEntry, WorkflowPhase, WorkflowState};

/// Formats council rounds for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format every phase of the round
    pub fn format(report: &RoundReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(&format!("Council Round {}", report.round)));
        output.push('\n');

        if let Some(question) = &report.question {
            output.push_str(&format!("{} {}\n", "Question:".cyan().bold(), question));
        }
        output.push_str(&format!(
            "{} {}\n",
            "State:".cyan().bold(),
            report.state
        ));

        for phase in &report.phases {
            output.push_str(&Self::section_header(phase.phase.display_name()));
            output.push_str(&Self::phase_body(phase));
        }

        if !report.exclusions.is_empty() {
            output.push_str(&format!("\n{}\n", "Exclusions:".yellow().bold()));
            for exclusion in &report.exclusions {
                output.push_str(&format!("  * {}\n", exclusion));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RoundReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format the syntheses and the revised answers (concise output)
    pub fn format_synthesis_only(report: &RoundReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            "=== Council Conclusion ===".cyan().bold()
        ));
        if let Some(question) = &report.question {
            output.push_str(&format!("{} {}\n", "Q:".bold(), question));
        }

        match report.phase(WorkflowPhase::Judgment) {
            Some(judgment) => {
                output.push_str(&Self::section_header("Synthesis"));
                output.push_str(&Self::phase_body(judgment));
            }
            None => {
                output.push_str(&format!(
                    "\n{}\n",
                    format!("Round stopped before judgment ({})", report.state).yellow()
                ));
            }
        }

        if let Some(reflection) = report.phase(WorkflowPhase::Reflection) {
            output.push_str(&Self::section_header("Revised Answers"));
            output.push_str(&Self::phase_body(reflection));
        }

        output
    }

    /// Format the outcome of a single phase, as printed by the chat REPL.
    pub fn format_cohort(state: &WorkflowState, roster: &Roster, cohort: &CohortResponse) -> String {
        match PhaseReport::from_state(state, roster, cohort.phase) {
            Some(report) => {
                let mut output = Self::section_header(&format!(
                    "{} ({}/{} responded)",
                    cohort.phase.display_name(),
                    report.responded(),
                    report.entries.len()
                ));
                output.push_str(&Self::phase_body(&report));
                output
            }
            None => String::new(),
        }
    }

    /// Format the session status table
    pub fn format_status(status: &SessionStatus) -> String {
        let mut output = format!(
            "{} {}  {} {}\n",
            "State:".cyan().bold(),
            status.state,
            "Round:".cyan().bold(),
            status.round
        );
        for agent in &status.agents {
            let role = if agent.harmonizer { "harmonizer" } else { "agent" };
            let busy = if agent.busy {
                " busy".yellow().to_string()
            } else {
                String::new()
            };
            let activity = if agent.active {
                "active".green()
            } else {
                "inactive".dimmed()
            };
            output.push_str(&format!(
                "  {} [{}, {}] {}{}\n      {} messages, {} failures",
                agent.name.to_string().bold(),
                role,
                activity,
                agent.model.dimmed(),
                busy,
                agent.messages,
                agent.failures
            ));
            if agent.unsaved > 0 {
                output.push_str(&format!(", {}", format!("{} unsaved", agent.unsaved).yellow()));
            }
            if agent.integrity_issues > 0 {
                output.push_str(&format!(
                    ", {}",
                    format!("{} integrity issues", agent.integrity_issues).red()
                ));
            }
            output.push_str(&format!("\n      {}\n", agent.location.dimmed()));
        }
        output
    }

    /// Format hash chain checks, one block per agent with every issue listed
    pub fn format_integrity(statuses: &[IntegrityStatus]) -> String {
        let mut output = String::new();
        for status in statuses {
            let verdict = if status.is_intact() {
                "intact".green()
            } else {
                "issues found".red()
            };
            output.push_str(&format!(
                "  {} {} ({} records)\n",
                status.agent.to_string().bold(),
                verdict,
                status.on_disk.checked
            ));
            for issue in &status.on_disk.issues {
                output.push_str(&format!("      - {}\n", issue));
            }
            if !status.resealed.is_empty() {
                output.push_str(&format!(
                    "      {}\n",
                    "re-sealed by a repair rewrite; the load found:".yellow()
                ));
                for issue in &status.resealed {
                    output.push_str(&format!("      - {}\n", issue));
                }
            }
            if !status.is_intact() {
                output.push_str(&format!(
                    "      {}\n",
                    format!("run /rebuild {} to re-seal", status.agent).dimmed()
                ));
            }
        }
        output
    }

    /// Format the merged timeline across all agents
    pub fn format_timeline(timeline: &[TimelineEntry]) -> String {
        if timeline.is_empty() {
            return "(no messages yet)\n".dimmed().to_string();
        }
        let mut output = String::new();
        for entry in timeline {
            let message = &entry.message;
            let phase = message
                .phase()
                .map(|p| format!(" {}", p.as_str()))
                .unwrap_or_default();
            output.push_str(&format!(
                "{} {} {}{}\n{}\n\n",
                message.created_at().format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                format!("[{}]", entry.agent).yellow().bold(),
                message.role().as_str(),
                phase.dimmed(),
                Self::indent(message.content(), "  ")
            ));
        }
        output
    }

    /// Format configuration issues, errors first
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|i| !i.is_error());
        sorted
            .into_iter()
            .map(|issue| match issue.severity {
                Severity::Error => format!("{} {}\n", "error:".red().bold(), issue.message),
                Severity::Warning => format!("{} {}\n", "warning:".yellow().bold(), issue.message),
            })
            .collect()
    }

    fn phase_body(phase: &PhaseReport) -> String {
        let mut output = String::new();
        for entry in &phase.entries {
            match (entry.content(), entry.marker()) {
                (Some(content), _) => output.push_str(&format!(
                    "\n{}\n{}\n",
                    format!("── {} ──", entry.agent).yellow().bold(),
                    content
                )),
                (None, Some(marker)) => {
                    output.push_str(&format!("\n{}\n", format!("[{}]", marker).red()))
                }
                (None, None) => {}
            }
        }
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &RoundReport) -> String {
        Self::format(report)
    }

    fn format_json(&self, report: &RoundReport) -> String {
        Self::format_json(report)
    }

    fn format_synthesis_only(&self, report: &RoundReport) -> String {
        Self::format_synthesis_only(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::report::{AgentEntry, EntryResult};
    use council_domain::{AgentName, OutputFormat, SessionState};

    fn report() -> RoundReport {
        colored::control::set_override(false);
        let entry = |agent: &str, result| AgentEntry {
            agent: AgentName::new(agent).unwrap(),
            result,
        };
        RoundReport {
            question: Some("X?".into()),
            round: 1,
            state: SessionState::Complete,
            phases: vec![
                PhaseReport {
                    phase: WorkflowPhase::Judgment,
                    entries: vec![entry(
                        "h",
                        EntryResult::Responded {
                            content: "42 is well supported".into(),
                        },
                    )],
                },
                PhaseReport {
                    phase: WorkflowPhase::Reflection,
                    entries: vec![
                        entry("a", EntryResult::Responded { content: "42".into() }),
                        entry("b", EntryResult::Excluded),
                    ],
                },
            ],
            exclusions: vec![],
        }
    }

    #[test]
    fn test_synthesis_only_shows_markers() {
        let output = ConsoleFormatter.render(&report(), OutputFormat::Synthesis);
        assert!(output.contains("42 is well supported"));
        assert!(output.contains("no response from b (excluded earlier this round)"));
    }

    #[test]
    fn test_json_round_trip_shape() {
        let output = ConsoleFormatter.render(&report(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["round"], 1);
        assert_eq!(value["phases"][1]["entries"][1]["status"], "excluded");
    }

    #[test]
    fn test_integrity_lists_every_issue() {
        use council_domain::session::integrity::{IntegrityIssue, IntegrityReport};
        colored::control::set_override(false);
        let statuses = vec![
            IntegrityStatus {
                agent: AgentName::new("a").unwrap(),
                on_disk: IntegrityReport {
                    checked: 3,
                    issues: vec![],
                    tip: Some("abc".into()),
                },
                resealed: vec![],
            },
            IntegrityStatus {
                agent: AgentName::new("b").unwrap(),
                on_disk: IntegrityReport {
                    checked: 4,
                    issues: vec![
                        IntegrityIssue::HashMismatch { index: 1 },
                        IntegrityIssue::BrokenLink { index: 3 },
                    ],
                    tip: Some("def".into()),
                },
                resealed: vec![IntegrityIssue::Unsealed { index: 0 }],
            },
        ];
        let output = ConsoleFormatter::format_integrity(&statuses);
        assert!(output.contains("a intact (3 records)"));
        assert!(output.contains("b issues found (4 records)"));
        assert!(output.contains("- record 1 was modified after it was written"));
        assert!(output.contains("- record 3 does not link to its predecessor"));
        assert!(output.contains("- record 0 is unsealed"));
        assert!(output.contains("run /rebuild b to re-seal"));
        assert!(!output.contains("run /rebuild a"));
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "  "), "  a\n  b");
    }
}
