//! Snapshot collection and display

pub mod dashboard;
pub mod probe;
pub mod realtime;

pub use dashboard::render_dashboard;
pub use probe::{MemoryProbe, MemoryReading, NoRuntime, ObjectCensus, RuntimeIntrospector, SysinfoProbe};
pub use realtime::{MemoryMonitor, ObjectGrowthStats};
