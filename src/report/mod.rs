//! Persisted profiling report
//!
//! One JSON document with a fixed set of top-level sections. Sections with
//! no data render as `null` or empty rather than failing the whole report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::gc::{analyze_gc_efficiency, GcEfficiency};
use crate::core::error::ProfilerResult;
use crate::core::snapshot::{MemorySnapshot, TopObject};
use crate::monitor::ObjectGrowthStats;

/// Most recent snapshots kept in `memory_trend`
pub const TREND_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilingSummary {
    pub generated_at: String,
    pub snapshot_count: usize,
    pub monitoring_active: bool,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub duration_secs: f64,
    pub current_memory_mb: Option<f64>,
    pub peak_memory_mb: Option<f64>,
    pub min_memory_mb: Option<f64>,
    pub average_memory_mb: Option<f64>,
    pub current_fragmentation: Option<f64>,
    pub average_fragmentation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: f64,
    pub memory_mb: f64,
    pub virtual_memory_mb: f64,
    pub memory_percent: f64,
    pub fragmentation: f64,
    pub object_count_total: u64,
}

impl From<&MemorySnapshot> for TrendPoint {
    fn from(s: &MemorySnapshot) -> Self {
        Self {
            timestamp: s.timestamp,
            memory_mb: s.process_memory_mb,
            virtual_memory_mb: s.virtual_memory_mb,
            memory_percent: s.memory_percent,
            fragmentation: s.fragmentation_ratio,
            object_count_total: s.total_objects(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilingReport {
    pub profiling_summary: ProfilingSummary,
    pub memory_trend: Vec<TrendPoint>,
    pub top_objects: Vec<TopObject>,
    pub object_counts: BTreeMap<String, u64>,
    pub gc_statistics: Option<GcEfficiency>,
    pub leak_detection: BTreeMap<String, ObjectGrowthStats>,
    pub optimization_recommendations: Vec<String>,
}

impl ProfilingReport {
    pub fn build(
        snapshots: &[MemorySnapshot],
        monitoring_active: bool,
        leak_detection: BTreeMap<String, ObjectGrowthStats>,
        optimization_recommendations: Vec<String>,
    ) -> Self {
        let latest = snapshots.last();
        let memory: Vec<f64> = snapshots.iter().map(|s| s.process_memory_mb).collect();
        let fragmentation: Vec<f64> = snapshots.iter().map(|s| s.fragmentation_ratio).collect();

        let profiling_summary = ProfilingSummary {
            generated_at: chrono::Local::now().to_rfc3339(),
            snapshot_count: snapshots.len(),
            monitoring_active,
            first_timestamp: snapshots.first().map(|s| s.timestamp),
            last_timestamp: latest.map(|s| s.timestamp),
            duration_secs: match (snapshots.first(), latest) {
                (Some(first), Some(last)) => (last.timestamp - first.timestamp).max(0.0),
                _ => 0.0,
            },
            current_memory_mb: latest.map(|s| s.process_memory_mb),
            peak_memory_mb: memory.iter().copied().reduce(f64::max),
            min_memory_mb: memory.iter().copied().reduce(f64::min),
            average_memory_mb: mean_of(&memory),
            current_fragmentation: latest.map(|s| s.fragmentation_ratio),
            average_fragmentation: mean_of(&fragmentation),
        };

        let skip = snapshots.len().saturating_sub(TREND_LIMIT);

        Self {
            profiling_summary,
            memory_trend: snapshots[skip..].iter().map(TrendPoint::from).collect(),
            top_objects: latest.map(|s| s.top_objects.clone()).unwrap_or_default(),
            object_counts: latest
                .map(|s| s.object_counts.iter().map(|(k, v)| (k.clone(), *v)).collect())
                .unwrap_or_default(),
            gc_statistics: analyze_gc_efficiency(snapshots).ok(),
            leak_detection,
            optimization_recommendations,
        }
    }

    /// Default file name under `dir`, stamped with local time
    pub fn default_path(dir: &Path) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        dir.join(format!("memory_profiling_report_{}.json", stamp))
    }

    pub fn to_json(&self) -> ProfilerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as UTF-8 JSON, creating parent directories
    pub fn save(&self, path: &Path) -> ProfilerResult<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        info!("Profiling report saved to {}", path.display());
        Ok(path.to_path_buf())
    }
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::GcGenerationStats;

    fn history(n: usize) -> Vec<MemorySnapshot> {
        (0..n)
            .map(|i| {
                MemorySnapshot::new(i as f64 * 30.0, 100.0 + i as f64)
                    .with_gc_stats(vec![GcGenerationStats::new(i as u64 * 10, i as u64 * 100)])
                    .with_object_counts([("dict", 10 + i as u64)])
            })
            .collect()
    }

    #[test]
    fn test_top_level_keys() {
        let report = ProfilingReport::build(&history(3), false, BTreeMap::new(), vec![]);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "profiling_summary",
            "memory_trend",
            "top_objects",
            "object_counts",
            "gc_statistics",
            "leak_detection",
            "optimization_recommendations",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(obj.len(), 7);
        assert_eq!(value["memory_trend"][0]["object_count_total"], 10);

        let summary = obj["profiling_summary"].as_object().unwrap();
        for key in [
            "snapshot_count",
            "duration_secs",
            "current_memory_mb",
            "peak_memory_mb",
            "min_memory_mb",
            "average_memory_mb",
            "current_fragmentation",
            "average_fragmentation",
        ] {
            assert!(summary.contains_key(key), "missing summary {}", key);
        }
    }

    #[test]
    fn test_summary_memory_and_fragmentation() {
        let snaps = vec![
            MemorySnapshot::new(0.0, 120.0).with_fragmentation(0.2),
            MemorySnapshot::new(30.0, 80.0).with_fragmentation(0.4),
        ];
        let summary = ProfilingReport::build(&snaps, false, BTreeMap::new(), vec![]).profiling_summary;
        assert_eq!(summary.min_memory_mb, Some(80.0));
        assert_eq!(summary.peak_memory_mb, Some(120.0));
        assert_eq!(summary.average_memory_mb, Some(100.0));
        assert_eq!(summary.current_fragmentation, Some(0.4));
        assert!((summary.average_fragmentation.unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(summary.duration_secs, 30.0);
    }

    #[test]
    fn test_trend_truncated_to_recent() {
        let report = ProfilingReport::build(&history(80), true, BTreeMap::new(), vec![]);
        assert_eq!(report.memory_trend.len(), TREND_LIMIT);
        assert_eq!(report.memory_trend[0].memory_mb, 130.0);
        assert_eq!(report.profiling_summary.peak_memory_mb, Some(179.0));
        assert!(report.gc_statistics.is_some());
    }

    #[test]
    fn test_empty_history_degrades() {
        let report = ProfilingReport::build(&[], false, BTreeMap::new(), vec![]);
        assert!(report.memory_trend.is_empty());
        assert!(report.gc_statistics.is_none());
        assert_eq!(report.profiling_summary.current_memory_mb, None);
        assert_eq!(report.profiling_summary.min_memory_mb, None);
        assert_eq!(report.profiling_summary.average_fragmentation, None);

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert!(value["gc_statistics"].is_null());
    }

    #[test]
    fn test_save_preserves_non_ascii() {
        let dir = std::env::temp_dir().join(format!("memprof_report_{}", std::process::id()));
        let path = ProfilingReport::default_path(&dir);
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("memory_profiling_report_"));

        let recs = vec!["メモリリークの可能性: dict".to_string()];
        let report = ProfilingReport::build(&history(2), false, BTreeMap::new(), recs);
        let saved = report.save(&path).unwrap();

        let text = std::fs::read_to_string(&saved).unwrap();
        assert!(text.contains("メモリリークの可能性"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
