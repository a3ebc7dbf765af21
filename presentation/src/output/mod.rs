//! Output formatting for round reports, status and timelines

pub mod console;
pub mod formatter;
pub mod report;
