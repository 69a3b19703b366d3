//! Statistical analyzers over snapshot slices
//!
//! Every analyzer is a pure function over `&[MemorySnapshot]`. Pass a stable
//! copy of the history (see [`crate::MemoryMonitor::snapshots`]), never a
//! live buffer.

pub mod gc;
pub mod objects;
pub mod stats;
pub mod trend;

pub use gc::{analyze_gc_efficiency, analyze_gc_patterns, generate_gc_recommendations};
pub use objects::{analyze_fragmentation, analyze_memory_patterns, analyze_object_distribution};
pub use trend::{analyze_memory_stability, analyze_memory_trend, analyze_peaks, TrendDirection};
