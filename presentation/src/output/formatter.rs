//! Output formatter trait

use crate::output::report::RoundReport;
use council_domain::OutputFormat;

/// Trait for formatting round reports
pub trait OutputFormatter {
    /// Format every phase of the round
    fn format(&self, report: &RoundReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &RoundReport) -> String;

    /// Format the syntheses and revised answers only (concise output)
    fn format_synthesis_only(&self, report: &RoundReport) -> String;

    /// Dispatch on `format`
    fn render(&self, report: &RoundReport, format: OutputFormat) -> String {
        match format {
            OutputFormat::Full => self.format(report),
            OutputFormat::Synthesis => self.format_synthesis_only(report),
            OutputFormat::Json => self.format_json(report),
        }
    }
}
