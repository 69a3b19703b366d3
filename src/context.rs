//! Shared profiler components
//!
//! One [`ProfilerContext`] owns the monitor, advisor, leak detector and
//! effect reporter for a process. Construct it once and pass it (or an
//! `Arc` of it) to whatever needs profiling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::advisor::{ComprehensiveReport, OptimizationAdvisor};
use crate::core::config::ProfilerConfig;
use crate::core::error::ProfilerResult;
use crate::effect::{Checkpoint, EffectReporter, MemoryStats};
use crate::leaks::{LeakDetector, LeakRecord, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::monitor::MemoryMonitor;
use crate::report::ProfilingReport;

pub struct ProfilerContext {
    config: Arc<ProfilerConfig>,
    pub monitor: MemoryMonitor,
    pub advisor: OptimizationAdvisor,
    pub leak_detector: LeakDetector,
    pub effect_reporter: EffectReporter,
}

impl ProfilerContext {
    /// Context monitoring the current process through `sysinfo`
    pub fn new(config: ProfilerConfig) -> ProfilerResult<Self> {
        let config = Arc::new(config);
        let monitor = MemoryMonitor::new(Arc::clone(&config))?;
        Ok(Self::with_monitor(config, monitor))
    }

    pub fn with_monitor(config: Arc<ProfilerConfig>, monitor: MemoryMonitor) -> Self {
        Self {
            advisor: OptimizationAdvisor::new(Arc::clone(&config)),
            leak_detector: LeakDetector::new(),
            effect_reporter: EffectReporter::new(),
            monitor,
            config,
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn comprehensive_report(&self) -> ComprehensiveReport {
        self.advisor.generate_comprehensive_report(&self.monitor.snapshots())
    }

    /// Run leak detection over the current history
    ///
    /// Too little history yields an empty list.
    pub fn detect_leaks(&self) -> Vec<LeakRecord> {
        let snapshots = self.monitor.snapshots();
        match self.leak_detector.detect_leaks(&snapshots, DEFAULT_CONFIDENCE_THRESHOLD) {
            Ok(leaks) => leaks,
            Err(e) => {
                debug!("Leak detection skipped: {}", e);
                Vec::new()
            }
        }
    }

    /// Take a snapshot now and make it the effect baseline
    pub fn set_baseline(&self) -> Option<MemoryStats> {
        let snapshot = self.monitor.take_snapshot()?;
        let stats = MemoryStats::from_snapshot(&snapshot);
        self.effect_reporter.set_baseline(stats.clone());
        Some(stats)
    }

    /// Take a snapshot now and record it as a checkpoint
    pub fn checkpoint(&self, name: &str, description: &str) -> Option<Checkpoint> {
        let Some(snapshot) = self.monitor.take_snapshot() else {
            warn!("Checkpoint '{}' skipped: no snapshot", name);
            return None;
        };
        Some(self.effect_reporter.record_checkpoint(
            MemoryStats::from_snapshot(&snapshot),
            name,
            description,
        ))
    }

    pub fn generate_report(&self) -> ProfilingReport {
        let snapshots = self.monitor.snapshots();
        let recommendations = self
            .advisor
            .identify_optimization_opportunities(&snapshots)
            .into_iter()
            .map(|r| r.message)
            .collect();

        ProfilingReport::build(
            &snapshots,
            self.monitor.is_active(),
            self.monitor.object_growth_statistics(),
            recommendations,
        )
    }

    /// Save the report to `path`, or to a timestamped file in the report directory
    pub fn save_report(&self, path: Option<&Path>) -> ProfilerResult<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => ProfilingReport::default_path(&self.config.report_dir),
        };
        self.generate_report().save(&path)
    }
}
