//! Core data model, configuration, error and recommendation types

pub mod config;
pub mod error;
pub mod recommendation;
pub mod snapshot;
