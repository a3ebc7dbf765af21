//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: provider/model pair serving an agent
//! - [`question::Question`]: a validated user prompt for a council round
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod model;
pub mod question;
pub mod string;
