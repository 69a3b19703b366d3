//! Real-time memory monitoring
//!
//! A [`MemoryMonitor`] owns a bounded snapshot history. Snapshots are taken
//! on demand or by one background tokio task started with
//! [`MemoryMonitor::start`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::probe::{estimate_fragmentation, MemoryProbe, NoRuntime, RuntimeIntrospector, SysinfoProbe};
use crate::analysis::objects::count_series;
use crate::core::config::ProfilerConfig;
use crate::core::error::{ProfilerError, ProfilerResult};
use crate::core::snapshot::MemorySnapshot;
use crate::leaks::estimated_object_size;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Growth of one object type inside the leak-detection window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectGrowthStats {
    pub leak_rate_mb_per_sec: f64,
    pub history_length: usize,
    pub total_growth: i64,
    pub max_count: u64,
}

struct MonitorInner {
    config: Arc<ProfilerConfig>,
    probe: Arc<dyn MemoryProbe>,
    introspector: Arc<dyn RuntimeIntrospector>,
    history: Mutex<VecDeque<MemorySnapshot>>,
    active: AtomicBool,
}

impl MonitorInner {
    fn history(&self) -> MutexGuard<'_, VecDeque<MemorySnapshot>> {
        self.history.lock().unwrap_or_else(|poisoned| {
            warn!("Snapshot history lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn take_snapshot(&self) -> Option<MemorySnapshot> {
        let mut history = self.history();

        let reading = match self.probe.read() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Snapshot failed: {}", e);
                return None;
            }
        };

        let timestamp = next_timestamp(now_secs(), history.back());
        let mut snapshot = MemorySnapshot::new(timestamp, reading.resident_mb)
            .with_virtual_memory(reading.virtual_mb)
            .with_memory_percent(reading.memory_percent)
            .with_gc_stats(self.introspector.gc_generations());

        if self.config.deep_introspection {
            let census = self
                .introspector
                .object_census(self.config.introspection_sample_limit);
            snapshot = snapshot
                .with_fragmentation(estimate_fragmentation(census.total_bytes, reading.resident_mb))
                .with_object_counts(census.counts)
                .with_top_objects(census.top);
        }

        while history.len() >= self.config.max_history.max(1) {
            history.pop_front();
        }
        history.push_back(snapshot.clone());

        debug!(
            "Snapshot {}: {:.1} MB, {} objects",
            history.len(),
            snapshot.process_memory_mb,
            snapshot.total_objects()
        );
        Some(snapshot)
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Wall-clock time, never earlier than the previous snapshot
fn next_timestamp(now: f64, previous: Option<&MemorySnapshot>) -> f64 {
    match previous {
        Some(prev) if prev.timestamp > now => {
            debug!("Clock stepped back {:.3}s, holding timestamp", prev.timestamp - now);
            prev.timestamp
        }
        _ => now,
    }
}

pub struct MemoryMonitor {
    inner: Arc<MonitorInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryMonitor {
    /// Monitor the current process via `sysinfo`, without runtime introspection
    pub fn new(config: Arc<ProfilerConfig>) -> ProfilerResult<Self> {
        let probe = SysinfoProbe::new()?;
        Ok(Self::with_sources(config, Arc::new(probe), Arc::new(NoRuntime)))
    }

    pub fn with_sources(
        config: Arc<ProfilerConfig>,
        probe: Arc<dyn MemoryProbe>,
        introspector: Arc<dyn RuntimeIntrospector>,
    ) -> Self {
        let capacity = config.max_history.min(4096);
        Self {
            inner: Arc::new(MonitorInner {
                config,
                probe,
                introspector,
                history: Mutex::new(VecDeque::with_capacity(capacity)),
                active: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.inner.config
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start periodic sampling on the ambient tokio runtime
    ///
    /// Calling again while running does nothing.
    pub fn start(&self) -> ProfilerResult<()> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            ProfilerError::NotSupported("background sampling needs a tokio runtime".to_string())
        })?;

        let mut task = self.task();
        if task.as_ref().map_or(false, |t| !t.is_finished()) {
            debug!("Monitoring already active");
            return Ok(());
        }

        let period = Duration::from_secs(self.inner.config.snapshot_interval_secs.max(1));
        self.inner.active.store(true, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        *task = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !inner.active.load(Ordering::SeqCst) {
                    break;
                }
                inner.take_snapshot();
            }
        }));

        info!("Memory monitoring started ({}s interval)", period.as_secs());
        Ok(())
    }

    /// Stop sampling; history is kept
    pub fn stop(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task().take() {
            task.abort();
            info!("Memory monitoring stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Capture one snapshot and append it to the history
    pub fn take_snapshot(&self) -> Option<MemorySnapshot> {
        self.inner.take_snapshot()
    }

    /// Copy of the history, oldest first
    pub fn snapshots(&self) -> Vec<MemorySnapshot> {
        self.inner.history().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<MemorySnapshot> {
        self.inner.history().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.history().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.history().is_empty()
    }

    pub fn reset(&self) {
        self.inner.history().clear();
        debug!("Snapshot history cleared");
    }

    /// Per-type growth over the snapshots inside the leak-detection window
    pub fn object_growth_statistics(&self) -> BTreeMap<String, ObjectGrowthStats> {
        let snapshots = self.snapshots();
        window_growth(&snapshots, self.inner.config.leak_detection_window_secs as f64)
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn window_growth(snapshots: &[MemorySnapshot], window_secs: f64) -> BTreeMap<String, ObjectGrowthStats> {
    let Some(latest) = snapshots.last() else {
        return BTreeMap::new();
    };
    let cutoff = latest.timestamp - window_secs;
    let start = snapshots
        .iter()
        .position(|s| s.timestamp >= cutoff)
        .unwrap_or(snapshots.len() - 1);
    let window = &snapshots[start..];
    let span = latest.timestamp - window[0].timestamp;

    count_series(window)
        .into_iter()
        .map(|(object_type, counts)| {
            let first = counts.first().copied().unwrap_or(0);
            let last = counts.last().copied().unwrap_or(0);
            let total_growth = last as i64 - first as i64;
            let leak_rate_mb_per_sec = if span > 0.0 && total_growth > 0 {
                total_growth as f64 * estimated_object_size(&object_type) as f64 / BYTES_PER_MB / span
            } else {
                0.0
            };
            let stats = ObjectGrowthStats {
                leak_rate_mb_per_sec,
                history_length: counts.len(),
                total_growth,
                max_count: counts.iter().copied().max().unwrap_or(0),
            };
            (object_type, stats)
        })
        .collect()
}
