//! Agent subdomain: identities, generation parameters and the roster.
//!
//! - [`entities::AgentSpec`]: one configured participant
//! - [`roster::Roster`]: the validated set of participants for a session
//! - [`validation`]: structured roster issues with severities

pub mod entities;
pub mod roster;
pub mod validation;
