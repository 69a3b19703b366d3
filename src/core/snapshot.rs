//! Point-in-time memory snapshot
//!
//! A [`MemorySnapshot`] is created once and never mutated. The constructor
//! sanitizes numeric fields so analyzers can rely on non-negative, finite
//! values and a fragmentation ratio inside [0, 1].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cumulative counters for one GC generation (index 0 is the youngest).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcGenerationStats {
    /// Number of collection events so far
    pub collections: u64,
    /// Number of objects collected so far
    pub collected: u64,
}

impl GcGenerationStats {
    pub fn new(collections: u64, collected: u64) -> Self {
        Self { collections, collected }
    }
}

/// One entry of the ranked object census.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopObject {
    pub type_name: String,
    pub count: u64,
    pub size_bytes: u64,
}

/// Process memory, GC counters and object census at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Resident set size (MB)
    pub process_memory_mb: f64,
    /// Virtual memory size (MB)
    pub virtual_memory_mb: f64,
    /// Share of system memory used by the process (0-100)
    pub memory_percent: f64,
    pub gc_stats: Vec<GcGenerationStats>,
    pub object_counts: HashMap<String, u64>,
    pub top_objects: Vec<TopObject>,
    /// Estimated heap fragmentation (0.0-1.0)
    pub fragmentation_ratio: f64,
}

impl MemorySnapshot {
    /// Create a snapshot with memory figures only.
    pub fn new(timestamp: f64, process_memory_mb: f64) -> Self {
        Self {
            timestamp: non_negative(timestamp),
            process_memory_mb: non_negative(process_memory_mb),
            virtual_memory_mb: 0.0,
            memory_percent: 0.0,
            gc_stats: Vec::new(),
            object_counts: HashMap::new(),
            top_objects: Vec::new(),
            fragmentation_ratio: 0.0,
        }
    }

    pub fn with_virtual_memory(mut self, virtual_memory_mb: f64) -> Self {
        self.virtual_memory_mb = non_negative(virtual_memory_mb);
        self
    }

    pub fn with_memory_percent(mut self, memory_percent: f64) -> Self {
        self.memory_percent = non_negative(memory_percent);
        self
    }

    pub fn with_gc_stats(mut self, gc_stats: Vec<GcGenerationStats>) -> Self {
        self.gc_stats = gc_stats;
        self
    }

    pub fn with_object_counts<I, S>(mut self, counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        self.object_counts = counts.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    pub fn with_top_objects(mut self, top_objects: Vec<TopObject>) -> Self {
        self.top_objects = top_objects;
        self
    }

    pub fn with_fragmentation(mut self, ratio: f64) -> Self {
        self.fragmentation_ratio = non_negative(ratio).min(1.0);
        self
    }

    /// Total live objects in the census
    pub fn total_objects(&self) -> u64 {
        self.object_counts.values().sum()
    }

    /// Sum of collection events over all generations
    pub fn total_collections(&self) -> u64 {
        self.gc_stats.iter().map(|g| g.collections).sum()
    }

    /// Sum of collected objects over all generations
    pub fn total_collected(&self) -> u64 {
        self.gc_stats.iter().map(|g| g.collected).sum()
    }

    /// Count for a type, 0 when absent
    pub fn count_of(&self, type_name: &str) -> u64 {
        self.object_counts.get(type_name).copied().unwrap_or(0)
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Series of resident memory values, in snapshot order
pub fn memory_series(snapshots: &[MemorySnapshot]) -> Vec<f64> {
    snapshots.iter().map(|s| s.process_memory_mb).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitizes_fields() {
        let snap = MemorySnapshot::new(-5.0, f64::NAN)
            .with_fragmentation(1.7)
            .with_memory_percent(-3.0);
        assert_eq!(snap.timestamp, 0.0);
        assert_eq!(snap.process_memory_mb, 0.0);
        assert_eq!(snap.fragmentation_ratio, 1.0);
        assert_eq!(snap.memory_percent, 0.0);
    }

    #[test]
    fn test_totals() {
        let snap = MemorySnapshot::new(1.0, 100.0)
            .with_gc_stats(vec![GcGenerationStats::new(10, 500), GcGenerationStats::new(2, 40)])
            .with_object_counts([("dict", 30u64), ("list", 12)]);
        assert_eq!(snap.total_objects(), 42);
        assert_eq!(snap.total_collections(), 12);
        assert_eq!(snap.total_collected(), 540);
        assert_eq!(snap.count_of("tuple"), 0);
    }
}
