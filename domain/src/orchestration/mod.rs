//! Council workflow domain
//!
//! The four-phase state machine, the per-round workflow state and the
//! outcome types the orchestrator collects at each phase barrier.

pub mod entities;
pub mod policy;
pub mod state;
pub mod value_objects;
