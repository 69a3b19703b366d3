//! Per-type leak detection
//!
//! Scores every object type seen in the history by how consistently its
//! count grows. Scores are heuristic and advisory: memory figures come from
//! a fixed per-type size table, not from measured allocations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::objects::count_series;
use crate::analysis::stats;
use crate::core::error::{AnalysisOutcome, AnalysisResult};
use crate::core::snapshot::MemorySnapshot;

/// Confidence threshold used when the caller has no preference
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Records below this are discarded regardless of the caller's threshold
pub const CONFIDENCE_FLOOR: f64 = 0.5;
const MIN_SNAPSHOTS: usize = 5;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const DEFAULT_OBJECT_SIZE: u64 = 256;

/// Approximate bytes per instance for well-known type names
const OBJECT_SIZE_ESTIMATES: &[(&str, u64)] = &[
    ("dict", 1024),
    ("list", 512),
    ("set", 512),
    ("tuple", 128),
    ("str", 64),
    ("bytes", 64),
    ("function", 1024),
    ("frame", 512),
    ("type", 2048),
    ("module", 50 * 1024),
    ("String", 64),
    ("Vec", 512),
    ("HashMap", 1024),
    ("Box", 64),
];

/// Estimated bytes per instance of `type_name`
pub fn estimated_object_size(type_name: &str) -> u64 {
    OBJECT_SIZE_ESTIMATES
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, size)| *size)
        .unwrap_or(DEFAULT_OBJECT_SIZE)
}

/// A suspected leak for one object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakRecord {
    pub object_type: String,
    pub leak_rate_mb_per_sec: f64,
    pub total_leaked_mb: f64,
    /// Timestamp of the newest snapshot used for the detection
    pub detection_time: f64,
    pub confidence_score: f64,
    /// Count change per interval
    pub growth_pattern: Vec<f64>,
}

/// Confidence that a count series is leaking
///
/// 0.6 x share of growing intervals plus 0.4 x consistency, where
/// consistency is 1 - (mean absolute deviation / mean) of the growth
/// rates. Series that do not grow on average get no consistency credit.
pub fn leak_confidence(growth_rates: &[f64]) -> f64 {
    if growth_rates.is_empty() {
        return 0.0;
    }

    let positive = growth_rates.iter().filter(|&&r| r > 0.0).count() as f64;
    let positive_share = positive / growth_rates.len() as f64;

    let mean = stats::mean(growth_rates);
    let consistency = if mean > 0.0 {
        let mad = growth_rates.iter().map(|r| (r - mean).abs()).sum::<f64>()
            / growth_rates.len() as f64;
        (1.0 - mad / mean).max(0.0)
    } else {
        0.0
    };

    (0.6 * positive_share + 0.4 * consistency).clamp(0.0, 1.0)
}

/// Stateful detector; each run replaces the previous results
pub struct LeakDetector {
    leaks: Mutex<HashMap<String, LeakRecord>>,
}

impl LeakDetector {
    pub fn new() -> Self {
        Self {
            leaks: Mutex::new(HashMap::new()),
        }
    }

    /// Score every type in `snapshots` and keep those above the threshold
    ///
    /// The effective threshold is never below [`CONFIDENCE_FLOOR`]. Returned
    /// records are sorted by confidence, then leak rate.
    pub fn detect_leaks(
        &self,
        snapshots: &[MemorySnapshot],
        confidence_threshold: f64,
    ) -> AnalysisResult<Vec<LeakRecord>> {
        AnalysisOutcome::require(MIN_SNAPSHOTS, snapshots.len())?;

        let threshold = confidence_threshold.max(CONFIDENCE_FLOOR);
        let first = &snapshots[0];
        let last = &snapshots[snapshots.len() - 1];
        let span = (last.timestamp - first.timestamp).max(0.0);

        let mut records: Vec<LeakRecord> = count_series(snapshots)
            .into_iter()
            .filter_map(|(object_type, counts)| {
                score_type(object_type, &counts, span, last.timestamp, threshold)
            })
            .collect();

        records.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.leak_rate_mb_per_sec
                        .partial_cmp(&a.leak_rate_mb_per_sec)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.object_type.cmp(&b.object_type))
        });

        let mut state = self.leaks.lock().unwrap_or_else(|poisoned| {
            warn!("Leak detector lock poisoned, recovering");
            poisoned.into_inner()
        });
        state.clear();
        for record in &records {
            state.insert(record.object_type.clone(), record.clone());
        }

        if records.is_empty() {
            debug!("No leak suspects above confidence {:.2}", threshold);
        } else {
            info!(
                "{} leak suspect(s) detected, top: {} ({:.2})",
                records.len(),
                records[0].object_type,
                records[0].confidence_score
            );
        }

        Ok(records)
    }

    /// Records from the most recent detection run
    pub fn current_leaks(&self) -> Vec<LeakRecord> {
        let state = self.leaks.lock().unwrap_or_else(|p| p.into_inner());
        let mut leaks: Vec<LeakRecord> = state.values().cloned().collect();
        leaks.sort_by(|a, b| a.object_type.cmp(&b.object_type));
        leaks
    }

    pub fn leak_for(&self, object_type: &str) -> Option<LeakRecord> {
        let state = self.leaks.lock().unwrap_or_else(|p| p.into_inner());
        state.get(object_type).cloned()
    }
}

impl Default for LeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn score_type(
    object_type: String,
    counts: &[u64],
    span: f64,
    detection_time: f64,
    threshold: f64,
) -> Option<LeakRecord> {
    let first = *counts.first()?;
    let last = *counts.last()?;
    if last <= first {
        return None;
    }

    let as_f64: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let growth_pattern = stats::deltas(&as_f64);
    let confidence = leak_confidence(&growth_pattern);
    if confidence < threshold {
        return None;
    }

    let size = estimated_object_size(&object_type) as f64;
    let total_leaked_mb = (last - first) as f64 * size / BYTES_PER_MB;
    let leak_rate_mb_per_sec = if span > 0.0 { total_leaked_mb / span } else { 0.0 };

    Some(LeakRecord {
        object_type,
        leak_rate_mb_per_sec,
        total_leaked_mb,
        detection_time,
        confidence_score: confidence,
        growth_pattern,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(types: &[(&str, &[u64])]) -> Vec<MemorySnapshot> {
        let len = types.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        (0..len)
            .map(|i| {
                MemorySnapshot::new(i as f64 * 10.0, 100.0)
                    .with_object_counts(types.iter().map(|(name, c)| (*name, c[i])))
            })
            .collect()
    }

    #[test]
    fn test_linear_series_high_confidence() {
        let rates = stats::deltas(&[100.0, 150.0, 200.0, 250.0, 300.0, 350.0]);
        assert!(leak_confidence(&rates) >= 0.9);
    }

    #[test]
    fn test_flat_series_low_confidence() {
        let rates = stats::deltas(&[500.0; 8]);
        assert!(leak_confidence(&rates) <= 0.1);

        let detector = LeakDetector::new();
        let snaps = history(&[("dict", &[40, 40, 40, 40, 40, 40])]);
        let leaks = detector.detect_leaks(&snaps, CONFIDENCE_FLOOR).unwrap();
        assert!(leaks.is_empty());
    }

    #[test]
    fn test_detects_growing_type() {
        let detector = LeakDetector::new();
        let snaps = history(&[
            ("dict", &[100, 200, 300, 400, 500, 600]),
            ("str", &[50, 45, 52, 48, 50, 49]),
        ]);
        let leaks = detector
            .detect_leaks(&snaps, DEFAULT_CONFIDENCE_THRESHOLD)
            .unwrap();

        assert_eq!(leaks.len(), 1);
        let dict = &leaks[0];
        assert_eq!(dict.object_type, "dict");
        assert_eq!(dict.growth_pattern, vec![100.0; 5]);
        assert!((dict.total_leaked_mb - 500.0 * 1024.0 / BYTES_PER_MB).abs() < 1e-9);
        assert!((dict.leak_rate_mb_per_sec - dict.total_leaked_mb / 50.0).abs() < 1e-12);
        assert_eq!(dict.detection_time, 50.0);
        assert_eq!(detector.leak_for("dict").as_ref(), Some(dict));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let detector = LeakDetector::new();
        let snaps = history(&[
            ("module", &[1, 2, 3, 4, 5]),
            ("list", &[10, 20, 30, 40, 50]),
        ]);
        let a = detector.detect_leaks(&snaps, 0.7).unwrap();
        let b = detector.detect_leaks(&snaps, 0.7).unwrap();
        assert_eq!(a, b);
        assert_eq!(detector.current_leaks().len(), 2);
    }

    #[test]
    fn test_rerun_supersedes_state() {
        let detector = LeakDetector::new();
        let growing = history(&[("list", &[10, 20, 30, 40, 50])]);
        detector.detect_leaks(&growing, 0.7).unwrap();
        assert!(detector.leak_for("list").is_some());

        let flat = history(&[("list", &[50, 50, 50, 50, 50])]);
        detector.detect_leaks(&flat, 0.7).unwrap();
        assert!(detector.leak_for("list").is_none());
    }

    #[test]
    fn test_requires_five_snapshots_and_floor() {
        let detector = LeakDetector::new();
        let snaps = history(&[("list", &[1, 2, 3, 4])]);
        assert!(detector.detect_leaks(&snaps, 0.7).is_err());

        // two of five intervals grow and the jumps are uneven
        let erratic = history(&[("list", &[1, 3, 3, 3, 3, 9])]);
        assert!(detector.detect_leaks(&erratic, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_size_table() {
        assert_eq!(estimated_object_size("dict"), 1024);
        assert_eq!(estimated_object_size("module"), 51200);
        assert_eq!(estimated_object_size("SomethingElse"), DEFAULT_OBJECT_SIZE);
    }
}
