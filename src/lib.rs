//! Memory Profiler and Optimization Advisor
//!
//! Samples process memory, GC counters and an object census into a bounded
//! history, then analyzes that history for trends, fragmentation, GC
//! behaviour and likely leaks.
//!
//! ## Features
//!
//! - **Monitoring**: on-demand or periodic snapshots on a tokio task
//! - **Analysis**: trend, peaks, stability, fragmentation, object mix, GC
//! - **Advice**: scored report with grade and prioritized recommendations
//! - **Leak Detection**: per-type growth confidence
//! - **Effect Tracking**: baseline vs checkpoint improvements
//! - **Reports**: JSON report on disk and a text dashboard
//!
//! Analyzers never panic on short input; they return an
//! [`AnalysisOutcome`] describing why there is no result.

pub mod core;
pub mod analysis;
pub mod advisor;
pub mod leaks;
pub mod effect;
pub mod monitor;
pub mod report;
pub mod context;

// Re-exports
pub use core::config::ProfilerConfig;
pub use core::error::{AnalysisOutcome, AnalysisResult, ProfilerError, ProfilerResult};
pub use core::snapshot::{GcGenerationStats, MemorySnapshot, TopObject};
pub use advisor::{ComprehensiveReport, Grade, OptimizationAdvisor, Priority, Recommendation};
pub use leaks::{LeakDetector, LeakRecord};
pub use effect::{EffectReporter, MemoryStats};
pub use monitor::{MemoryMonitor, ObjectCensus, RuntimeIntrospector};
pub use report::ProfilingReport;
pub use context::ProfilerContext;
