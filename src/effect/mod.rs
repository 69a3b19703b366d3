//! Before/after effect measurement

pub mod reporter;

pub use reporter::{Checkpoint, EffectReport, EffectReporter, Improvement, MemoryStats};
