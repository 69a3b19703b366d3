//! Optimization effect reporting
//!
//! Records a baseline and a series of named checkpoints, and measures how
//! far each checkpoint moved memory, fragmentation and object counts away
//! from the baseline that was current when it was recorded.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::core::error::{AnalysisOutcome, AnalysisResult};
use crate::core::snapshot::MemorySnapshot;

/// Reduction ratio that earns full marks (30%)
const FULL_SCORE_RATIO: f64 = 0.30;
const MEMORY_WEIGHT: f64 = 0.7;
const FRAGMENTATION_WEIGHT: f64 = 0.3;

/// Aggregate statistics compared by the effect reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub timestamp: f64,
    pub process_memory_mb: f64,
    pub fragmentation_ratio: f64,
    pub total_objects: u64,
}

impl MemoryStats {
    pub fn from_snapshot(snapshot: &MemorySnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            process_memory_mb: snapshot.process_memory_mb,
            fragmentation_ratio: snapshot.fragmentation_ratio,
            total_objects: snapshot.total_objects(),
        }
    }
}

/// Change relative to the baseline (positive = better)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub memory_reduction_mb: f64,
    pub memory_reduction_percent: f64,
    pub fragmentation_improvement: f64,
    pub object_reduction: i64,
}

impl Improvement {
    fn between(baseline: &MemoryStats, current: &MemoryStats) -> Self {
        let memory_reduction_mb = baseline.process_memory_mb - current.process_memory_mb;
        let memory_reduction_percent = if baseline.process_memory_mb > 0.0 {
            memory_reduction_mb / baseline.process_memory_mb * 100.0
        } else {
            0.0
        };

        Self {
            memory_reduction_mb,
            memory_reduction_percent,
            fragmentation_improvement: baseline.fragmentation_ratio - current.fragmentation_ratio,
            object_reduction: baseline.total_objects as i64 - current.total_objects as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub description: String,
    pub stats: MemoryStats,
    /// Baseline current at record time
    pub baseline: Option<MemoryStats>,
    /// None when no baseline was set at record time
    pub improvement: Option<Improvement>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectReport {
    pub baseline: MemoryStats,
    pub latest_checkpoint: String,
    pub latest_improvement: Improvement,
    pub checkpoints: Vec<Checkpoint>,
    pub effectiveness_score: f64,
    pub future_recommendations: Vec<String>,
}

#[derive(Default)]
struct EffectState {
    baseline: Option<MemoryStats>,
    checkpoints: Vec<Checkpoint>,
}

/// Baseline and checkpoint store, safe to share between threads
pub struct EffectReporter {
    state: Mutex<EffectState>,
}

impl EffectReporter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EffectState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EffectState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Effect reporter lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Replace the baseline. Existing checkpoints keep their improvements.
    pub fn set_baseline(&self, stats: MemoryStats) {
        info!(
            "Baseline set: {:.1} MB, fragmentation {:.2}, {} objects",
            stats.process_memory_mb, stats.fragmentation_ratio, stats.total_objects
        );
        self.lock().baseline = Some(stats);
    }

    pub fn baseline(&self) -> Option<MemoryStats> {
        self.lock().baseline.clone()
    }

    /// Append a checkpoint, measured against the current baseline
    pub fn record_checkpoint(
        &self,
        stats: MemoryStats,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Checkpoint {
        let name = name.into();
        let mut state = self.lock();

        let baseline = state.baseline.clone();
        let improvement = match &baseline {
            Some(baseline) => Some(Improvement::between(baseline, &stats)),
            None => {
                warn!("Checkpoint '{}' recorded without a baseline", name);
                None
            }
        };

        let checkpoint = Checkpoint {
            name,
            description: description.into(),
            stats,
            baseline,
            improvement,
            recorded_at: chrono::Local::now().to_rfc3339(),
        };
        state.checkpoints.push(checkpoint.clone());
        checkpoint
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.lock().checkpoints.clone()
    }

    /// Summarize the latest checkpoint against the baseline it was recorded with
    ///
    /// A checkpoint recorded before any baseline falls back to the current one.
    pub fn generate_effect_report(&self) -> AnalysisResult<EffectReport> {
        let (current_baseline, checkpoints) = {
            let state = self.lock();
            (state.baseline.clone(), state.checkpoints.clone())
        };

        let current_baseline = current_baseline.ok_or(AnalysisOutcome::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let latest = checkpoints.last().ok_or(AnalysisOutcome::InsufficientData {
            required: 1,
            available: 0,
        })?;

        let (baseline, latest_improvement) = match (&latest.baseline, &latest.improvement) {
            (Some(baseline), Some(improvement)) => (baseline.clone(), improvement.clone()),
            _ => {
                let improvement = Improvement::between(&current_baseline, &latest.stats);
                (current_baseline, improvement)
            }
        };

        let memory_ratio = memory_ratio(&latest_improvement);
        let fragmentation_ratio = fragmentation_ratio(&baseline, &latest_improvement);
        let effectiveness_score = effectiveness(memory_ratio, fragmentation_ratio);

        Ok(EffectReport {
            latest_checkpoint: latest.name.clone(),
            future_recommendations: future_recommendations(memory_ratio, fragmentation_ratio),
            baseline,
            latest_improvement,
            checkpoints,
            effectiveness_score,
        })
    }
}

impl Default for EffectReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn memory_ratio(improvement: &Improvement) -> f64 {
    improvement.memory_reduction_percent / 100.0
}

fn fragmentation_ratio(baseline: &MemoryStats, improvement: &Improvement) -> f64 {
    if baseline.fragmentation_ratio > 0.0 {
        improvement.fragmentation_improvement / baseline.fragmentation_ratio
    } else {
        0.0
    }
}

/// Weighted score where a 30% improvement on either axis earns full marks
pub fn effectiveness(memory_ratio: f64, fragmentation_ratio: f64) -> f64 {
    let memory = (memory_ratio / FULL_SCORE_RATIO).clamp(0.0, 1.0);
    let fragmentation = (fragmentation_ratio / FULL_SCORE_RATIO).clamp(0.0, 1.0);
    (MEMORY_WEIGHT * memory + FRAGMENTATION_WEIGHT * fragmentation).clamp(0.0, 1.0)
}

fn future_recommendations(memory_ratio: f64, fragmentation_ratio: f64) -> Vec<String> {
    let mut recs = Vec::new();

    if memory_ratio < 0.0 {
        recs.push("Memory grew since the baseline; revert or profile the latest change".to_string());
    } else if memory_ratio < 0.1 {
        recs.push("Memory reduction is under 10%; look for larger structural savings such as pooling or streaming".to_string());
    } else if memory_ratio < FULL_SCORE_RATIO {
        recs.push("Memory reduction is solid; repeat the optimization on the next largest consumers".to_string());
    }

    if fragmentation_ratio < 0.1 {
        recs.push("Fragmentation barely changed; group allocations by lifetime or use arenas".to_string());
    }

    if recs.is_empty() {
        recs.push("Optimizations are effective; keep monitoring to catch regressions".to_string());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(memory: f64, fragmentation: f64, objects: u64) -> MemoryStats {
        MemoryStats {
            timestamp: 0.0,
            process_memory_mb: memory,
            fragmentation_ratio: fragmentation,
            total_objects: objects,
        }
    }

    #[test]
    fn test_noop_checkpoint() {
        let reporter = EffectReporter::new();
        let s = stats(512.0, 0.2, 10_000);
        reporter.set_baseline(s.clone());
        let cp = reporter.record_checkpoint(s, "noop", "");
        let improvement = cp.improvement.unwrap();
        assert_eq!(improvement.memory_reduction_mb, 0.0);
        assert_eq!(improvement.memory_reduction_percent, 0.0);
        assert_eq!(improvement.object_reduction, 0);
    }

    #[test]
    fn test_empty_without_baseline_or_checkpoints() {
        let reporter = EffectReporter::new();
        assert!(reporter.generate_effect_report().is_err());

        reporter.set_baseline(stats(100.0, 0.1, 10));
        assert!(reporter.generate_effect_report().is_err());
    }

    #[test]
    fn test_zero_baseline_guard() {
        let reporter = EffectReporter::new();
        reporter.set_baseline(stats(0.0, 0.0, 0));
        let cp = reporter.record_checkpoint(stats(50.0, 0.1, 5), "grew", "");
        let improvement = cp.improvement.unwrap();
        assert_eq!(improvement.memory_reduction_percent, 0.0);
        assert_eq!(improvement.object_reduction, -5);
    }

    #[test]
    fn test_report_uses_latest_and_keeps_history() {
        let reporter = EffectReporter::new();
        reporter.set_baseline(stats(1000.0, 0.4, 50_000));
        reporter.record_checkpoint(stats(900.0, 0.35, 45_000), "cache limit", "bounded LRU");
        reporter.record_checkpoint(stats(700.0, 0.28, 30_000), "pooling", "buffer pool");

        let report = reporter.generate_effect_report().unwrap();
        assert_eq!(report.latest_checkpoint, "pooling");
        assert_eq!(report.checkpoints.len(), 2);
        assert!((report.latest_improvement.memory_reduction_percent - 30.0).abs() < 1e-9);
        // memory 30% -> 0.7, fragmentation 0.12/0.4 = 30% -> 0.3
        assert!((report.effectiveness_score - 1.0).abs() < 1e-9);
        assert_eq!(report.future_recommendations.len(), 1);
    }

    #[test]
    fn test_baseline_change_not_retroactive() {
        let reporter = EffectReporter::new();
        reporter.set_baseline(stats(1000.0, 0.2, 100));
        reporter.record_checkpoint(stats(800.0, 0.2, 100), "first", "");
        reporter.set_baseline(stats(800.0, 0.2, 100));

        let checkpoints = reporter.checkpoints();
        let first = checkpoints[0].improvement.as_ref().unwrap();
        assert!((first.memory_reduction_mb - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_later_baseline_leaves_report_unchanged() {
        let reporter = EffectReporter::new();
        reporter.set_baseline(stats(500.0, 0.4, 1_000));
        reporter.record_checkpoint(stats(500.0, 0.36, 1_000), "defrag", "");
        let before = reporter.generate_effect_report().unwrap();
        // fragmentation 0.04/0.4 = 10% -> 0.3 x 1/3
        assert!((before.effectiveness_score - 0.1).abs() < 1e-9);

        reporter.set_baseline(stats(500.0, 0.05, 1_000));
        let after = reporter.generate_effect_report().unwrap();
        assert!((after.effectiveness_score - before.effectiveness_score).abs() < 1e-12);
        assert_eq!(after.baseline.fragmentation_ratio, 0.4);
        assert_eq!(after.latest_improvement, before.latest_improvement);
    }

    #[test]
    fn test_checkpoint_before_baseline_uses_current() {
        let reporter = EffectReporter::new();
        let cp = reporter.record_checkpoint(stats(80.0, 0.1, 10), "early", "");
        assert!(cp.baseline.is_none());

        reporter.set_baseline(stats(100.0, 0.1, 10));
        let report = reporter.generate_effect_report().unwrap();
        assert_eq!(report.baseline.process_memory_mb, 100.0);
        assert!((report.latest_improvement.memory_reduction_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_effectiveness_clamped() {
        assert_eq!(effectiveness(-0.5, -0.5), 0.0);
        assert!((effectiveness(0.9, 0.9) - 1.0).abs() < 1e-9);
        assert!((effectiveness(0.15, 0.0) - 0.35).abs() < 1e-9);
    }
}
