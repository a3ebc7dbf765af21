//! Progress reporting for council rounds

pub mod reporter;
