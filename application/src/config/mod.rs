//! Application-level configuration.
//!
//! - [`ExecutionParams`]: phase deadline, retries, context window, synthesis policy

pub mod execution_params;

pub use execution_params::{ExecutionParams, RetryPolicy};
