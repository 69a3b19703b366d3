//! Snapshot sources
//!
//! [`MemoryProbe`] reads process memory from the OS. [`RuntimeIntrospector`]
//! supplies GC counters and an object census; Rust programs have no GC
//! runtime, so [`ObjectCensus`] lets an application report its own
//! allocations per type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use sysinfo::{Pid, System};
use tracing::{debug, warn};

use crate::core::error::{ProfilerError, ProfilerResult};
use crate::core::snapshot::{GcGenerationStats, TopObject};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Process memory figures from one probe read
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub resident_mb: f64,
    pub virtual_mb: f64,
    /// Share of total system memory (0-100)
    pub memory_percent: f64,
}

/// OS-level source of process memory figures
pub trait MemoryProbe: Send + Sync {
    fn read(&self) -> ProfilerResult<MemoryReading>;
}

/// Probe for the current process backed by `sysinfo`
pub struct SysinfoProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> ProfilerResult<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| ProfilerError::Probe(format!("cannot resolve current pid: {}", e)))?;
        Ok(Self::for_pid(pid))
    }

    pub fn for_pid(pid: Pid) -> Self {
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl MemoryProbe for SysinfoProbe {
    fn read(&self) -> ProfilerResult<MemoryReading> {
        let mut system = self.system.lock().unwrap_or_else(|p| p.into_inner());
        system.refresh_memory();
        if !system.refresh_process(self.pid) {
            return Err(ProfilerError::Probe(format!("process {} not found", self.pid)));
        }

        let process = system
            .process(self.pid)
            .ok_or_else(|| ProfilerError::Probe(format!("process {} vanished", self.pid)))?;

        let resident = process.memory() as f64;
        let total = system.total_memory() as f64;
        let memory_percent = if total > 0.0 { resident / total * 100.0 } else { 0.0 };

        Ok(MemoryReading {
            resident_mb: resident / BYTES_PER_MB,
            virtual_mb: process.virtual_memory() as f64 / BYTES_PER_MB,
            memory_percent,
        })
    }
}

/// Object census taken at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusSample {
    /// Live instances per type, all types
    pub counts: HashMap<String, u64>,
    /// Largest types by estimated size, at most `limit` entries
    pub top: Vec<TopObject>,
    /// Bytes accounted for by the census
    pub total_bytes: u64,
}

/// Runtime-level source of GC counters and object census
pub trait RuntimeIntrospector: Send + Sync {
    /// Cumulative counters per generation, youngest first
    fn gc_generations(&self) -> Vec<GcGenerationStats>;

    fn object_census(&self, limit: usize) -> CensusSample;
}

/// Introspector for processes without a managed runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRuntime;

impl RuntimeIntrospector for NoRuntime {
    fn gc_generations(&self) -> Vec<GcGenerationStats> {
        Vec::new()
    }

    fn object_census(&self, _limit: usize) -> CensusSample {
        CensusSample::default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TypeTally {
    count: u64,
    bytes: u64,
}

#[derive(Default)]
struct CensusState {
    types: HashMap<String, TypeTally>,
    generations: Vec<GcGenerationStats>,
}

/// Application-fed allocation registry
///
/// Callers report allocations and frees per type name; reclamation passes
/// (arena resets, cache sweeps) can be reported as collections of a
/// generation so the GC analyzers have something to work with.
#[derive(Default)]
pub struct ObjectCensus {
    state: Mutex<CensusState>,
}

impl ObjectCensus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CensusState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Object census lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn record_alloc(&self, type_name: &str, size_bytes: u64) {
        let mut state = self.lock();
        let tally = state.types.entry(type_name.to_string()).or_default();
        tally.count += 1;
        tally.bytes = tally.bytes.saturating_add(size_bytes);
    }

    /// Frees for unknown types or below zero are ignored
    pub fn record_free(&self, type_name: &str, size_bytes: u64) {
        let mut state = self.lock();
        match state.types.get_mut(type_name) {
            Some(tally) if tally.count > 0 => {
                tally.count -= 1;
                tally.bytes = tally.bytes.saturating_sub(size_bytes);
            }
            _ => debug!("Ignoring free of untracked type {}", type_name),
        }
    }

    /// Record one reclamation pass for `generation`
    pub fn record_collection(&self, generation: usize, collected: u64) {
        let mut state = self.lock();
        if state.generations.len() <= generation {
            state.generations.resize(generation + 1, GcGenerationStats::default());
        }
        let slot = &mut state.generations[generation];
        slot.collections += 1;
        slot.collected = slot.collected.saturating_add(collected);
    }

    pub fn live_count(&self, type_name: &str) -> u64 {
        self.lock().types.get(type_name).map(|t| t.count).unwrap_or(0)
    }
}

impl RuntimeIntrospector for ObjectCensus {
    fn gc_generations(&self) -> Vec<GcGenerationStats> {
        self.lock().generations.clone()
    }

    fn object_census(&self, limit: usize) -> CensusSample {
        let state = self.lock();

        let counts = state
            .types
            .iter()
            .filter(|(_, t)| t.count > 0)
            .map(|(name, t)| (name.clone(), t.count))
            .collect();

        let mut top: Vec<TopObject> = state
            .types
            .iter()
            .filter(|(_, t)| t.count > 0)
            .map(|(name, t)| TopObject {
                type_name: name.clone(),
                count: t.count,
                size_bytes: t.bytes,
            })
            .collect();
        top.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.type_name.cmp(&b.type_name))
        });
        top.truncate(limit);

        CensusSample {
            counts,
            top,
            total_bytes: state.types.values().map(|t| t.bytes).sum(),
        }
    }
}

/// Share of resident memory not accounted for by the census
///
/// 0 when the census carries no sizes or resident memory is unknown.
pub fn estimate_fragmentation(census_bytes: u64, resident_mb: f64) -> f64 {
    let resident = resident_mb * BYTES_PER_MB;
    if census_bytes == 0 || resident <= 0.0 {
        return 0.0;
    }
    (1.0 - census_bytes as f64 / resident).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_probe_reads_self() {
        let probe = SysinfoProbe::new().unwrap();
        let reading = probe.read().unwrap();
        assert!(reading.resident_mb > 0.0);
        assert!(reading.memory_percent >= 0.0 && reading.memory_percent <= 100.0);
    }

    #[test]
    fn test_census_alloc_free() {
        let census = ObjectCensus::new();
        census.record_alloc("Buffer", 4096);
        census.record_alloc("Buffer", 4096);
        census.record_alloc("Node", 64);
        census.record_free("Buffer", 4096);
        census.record_free("Ghost", 10);

        assert_eq!(census.live_count("Buffer"), 1);
        assert_eq!(census.live_count("Ghost"), 0);

        let sample = census.object_census(1);
        assert_eq!(sample.counts.len(), 2);
        assert_eq!(sample.top.len(), 1);
        assert_eq!(sample.top[0].type_name, "Buffer");
        assert_eq!(sample.total_bytes, 4096 + 64);
    }

    #[test]
    fn test_census_drops_fully_freed_types() {
        let census = ObjectCensus::new();
        census.record_alloc("Tmp", 8);
        census.record_free("Tmp", 8);
        census.record_free("Tmp", 8);
        assert!(census.object_census(10).counts.is_empty());
    }

    #[test]
    fn test_record_collection_grows_generations() {
        let census = ObjectCensus::new();
        census.record_collection(2, 30);
        census.record_collection(0, 5);
        census.record_collection(0, 7);

        let gens = census.gc_generations();
        assert_eq!(gens.len(), 3);
        assert_eq!(gens[0], GcGenerationStats::new(2, 12));
        assert_eq!(gens[1], GcGenerationStats::default());
        assert_eq!(gens[2], GcGenerationStats::new(1, 30));
    }

    #[test]
    fn test_no_runtime_is_empty() {
        assert!(NoRuntime.gc_generations().is_empty());
        assert_eq!(NoRuntime.object_census(100), CensusSample::default());
    }

    #[test]
    fn test_estimate_fragmentation() {
        assert_eq!(estimate_fragmentation(0, 100.0), 0.0);
        assert_eq!(estimate_fragmentation(1024, 0.0), 0.0);
        let half = (50.0 * BYTES_PER_MB) as u64;
        assert!((estimate_fragmentation(half, 100.0) - 0.5).abs() < 1e-9);
        assert_eq!(estimate_fragmentation(u64::MAX, 1.0), 0.0);
    }
}
