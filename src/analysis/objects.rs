//! Object census and fragmentation analysis
//!
//! Characterizes how live objects are distributed across types, how that
//! distribution changes over the history, and flags structural risks such
//! as steady growth, periodic spikes and monotonically growing types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::stats;
use crate::core::error::{AnalysisOutcome, AnalysisResult};
use crate::core::snapshot::{memory_series, MemorySnapshot};

/// Relative change a type needs before it counts as growing or shrinking
const SIGNIFICANT_CHANGE: f64 = 0.10;
const GROWTH_TOP_N: usize = 5;
const MAX_LEAK_CANDIDATES: usize = 10;
/// Final count must exceed the initial count by this factor
const LEAK_GROWTH_FACTOR: f64 = 1.5;

/// Fragmentation severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentationSeverity {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl FragmentationSeverity {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.1 {
            FragmentationSeverity::Minimal
        } else if ratio < 0.3 {
            FragmentationSeverity::Low
        } else if ratio < 0.5 {
            FragmentationSeverity::Moderate
        } else if ratio < 0.7 {
            FragmentationSeverity::High
        } else {
            FragmentationSeverity::Critical
        }
    }
}

impl std::fmt::Display for FragmentationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FragmentationSeverity::Minimal => "minimal",
            FragmentationSeverity::Low => "low",
            FragmentationSeverity::Moderate => "moderate",
            FragmentationSeverity::High => "high",
            FragmentationSeverity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentationAnalysis {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// mean(last 5) - mean(first 5)
    pub trend: f64,
    pub severity: FragmentationSeverity,
    pub worsening: bool,
}

/// Change of one type between the first and last snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeChange {
    pub type_name: String,
    pub initial: u64,
    pub current: u64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectGrowth {
    pub growing: Vec<TypeChange>,
    pub shrinking: Vec<TypeChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDistribution {
    pub total_objects: u64,
    pub distinct_types: usize,
    /// Share of all objects held by the top 10% of types
    pub concentration_ratio: f64,
    /// Normalized Shannon entropy (0 = one type, 1 = uniform)
    pub diversity_score: f64,
    pub top_types: Vec<(String, u64)>,
    /// None with fewer than two snapshots
    pub growth: Option<ObjectGrowth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcEffectiveness {
    pub collections_per_snapshot: f64,
    /// "high" below 10 collections per snapshot, else "low"
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPatterns {
    pub steady_growth: bool,
    pub periodic_spikes: bool,
    pub spike_frequency: f64,
    /// Types whose count never decreased and grew more than 1.5x
    pub memory_leaks: Vec<String>,
    pub gc_effectiveness: Option<GcEffectiveness>,
}

/// Fragmentation level and direction over the history
pub fn analyze_fragmentation(
    snapshots: &[MemorySnapshot],
) -> AnalysisResult<FragmentationAnalysis> {
    AnalysisOutcome::require(1, snapshots.len())?;

    let ratios: Vec<f64> = snapshots.iter().map(|s| s.fragmentation_ratio).collect();
    let average = stats::mean(&ratios);
    let min = ratios.iter().copied().fold(f64::MAX, f64::min);
    let max = ratios.iter().copied().fold(f64::MIN, f64::max);

    let window = ratios.len().min(5);
    let trend = stats::mean(&ratios[ratios.len() - window..]) - stats::mean(&ratios[..window]);

    Ok(FragmentationAnalysis {
        // rounding in the sum can push the mean a hair outside [min, max]
        average: average.clamp(min, max),
        min,
        max,
        trend,
        severity: FragmentationSeverity::from_ratio(average),
        worsening: trend > 0.05,
    })
}

/// Distribution of the latest census, plus first-to-last growth
pub fn analyze_object_distribution(
    snapshots: &[MemorySnapshot],
) -> AnalysisResult<ObjectDistribution> {
    let latest = snapshots
        .last()
        .ok_or(AnalysisOutcome::InsufficientData { required: 1, available: 0 })?;

    let total_objects = latest.total_objects();
    if total_objects == 0 {
        return Err(AnalysisOutcome::Degenerate("object census is empty".into()));
    }

    let mut ranked: Vec<(String, u64)> = latest
        .object_counts
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let distinct_types = ranked.len();
    let top_k = ((distinct_types as f64 * 0.1).ceil() as usize).max(1);
    let top_sum: u64 = ranked.iter().take(top_k).map(|(_, c)| *c).sum();

    let growth = if snapshots.len() >= 2 {
        Some(object_growth(&snapshots[0], latest))
    } else {
        None
    };

    Ok(ObjectDistribution {
        total_objects,
        distinct_types,
        concentration_ratio: top_sum as f64 / total_objects as f64,
        diversity_score: normalized_entropy(ranked.iter().map(|(_, c)| *c)),
        top_types: ranked.into_iter().take(10).collect(),
        growth,
    })
}

/// Shannon entropy of the count distribution divided by log2(distinct types)
fn normalized_entropy<I: Iterator<Item = u64> + Clone>(counts: I) -> f64 {
    let total: u64 = counts.clone().sum();
    let distinct = counts.clone().filter(|&c| c > 0).count();
    if total == 0 || distinct < 2 {
        return 0.0;
    }

    let entropy: f64 = counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();

    (entropy / (distinct as f64).log2()).clamp(0.0, 1.0)
}

fn object_growth(first: &MemorySnapshot, last: &MemorySnapshot) -> ObjectGrowth {
    let mut growing = Vec::new();
    let mut shrinking = Vec::new();

    for (type_name, &initial) in &first.object_counts {
        let Some(&current) = last.object_counts.get(type_name) else {
            continue;
        };
        if initial == 0 {
            continue;
        }

        let change = (current as f64 - initial as f64) / initial as f64;
        let entry = TypeChange {
            type_name: type_name.clone(),
            initial,
            current,
            change_percent: change * 100.0,
        };

        if change >= SIGNIFICANT_CHANGE {
            growing.push(entry);
        } else if change <= -SIGNIFICANT_CHANGE {
            shrinking.push(entry);
        }
    }

    let by_magnitude = |a: &TypeChange, b: &TypeChange| {
        b.change_percent
            .abs()
            .partial_cmp(&a.change_percent.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.type_name.cmp(&b.type_name))
    };
    growing.sort_by(by_magnitude);
    shrinking.sort_by(by_magnitude);
    growing.truncate(GROWTH_TOP_N);
    shrinking.truncate(GROWTH_TOP_N);

    ObjectGrowth { growing, shrinking }
}

/// Steady growth, spikes, monotonically growing types and GC cadence
pub fn analyze_memory_patterns(snapshots: &[MemorySnapshot]) -> AnalysisResult<MemoryPatterns> {
    AnalysisOutcome::require(5, snapshots.len())?;

    let values = memory_series(snapshots);
    let head = stats::mean(&values[..3]);
    let tail = stats::mean(&values[values.len() - 3..]);

    let interior = values.len() - 2;
    let spike_frequency = stats::local_maxima(&values).len() as f64 / interior as f64;

    Ok(MemoryPatterns {
        steady_growth: tail > head * 1.1,
        periodic_spikes: spike_frequency > 0.1,
        spike_frequency,
        memory_leaks: monotonic_growth_candidates(snapshots),
        gc_effectiveness: gc_effectiveness(snapshots),
    })
}

fn monotonic_growth_candidates(snapshots: &[MemorySnapshot]) -> Vec<String> {
    let types: BTreeSet<&str> = snapshots
        .iter()
        .flat_map(|s| s.object_counts.keys().map(String::as_str))
        .collect();

    let mut candidates: Vec<(String, u64)> = types
        .into_iter()
        .filter_map(|type_name| {
            let series: Vec<u64> = snapshots.iter().map(|s| s.count_of(type_name)).collect();
            let non_decreasing = series.windows(2).all(|w| w[1] >= w[0]);
            let initial = series[0];
            let last = series[series.len() - 1];

            (non_decreasing && last as f64 > initial as f64 * LEAK_GROWTH_FACTOR)
                .then(|| (type_name.to_string(), last - initial))
        })
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    candidates
        .into_iter()
        .take(MAX_LEAK_CANDIDATES)
        .map(|(name, _)| name)
        .collect()
}

fn gc_effectiveness(snapshots: &[MemorySnapshot]) -> Option<GcEffectiveness> {
    let first = snapshots.iter().find(|s| !s.gc_stats.is_empty())?;
    let last = snapshots.iter().rev().find(|s| !s.gc_stats.is_empty())?;
    if first.gc_stats.len() != last.gc_stats.len() {
        return None;
    }

    let delta = last.total_collections().saturating_sub(first.total_collections());
    let per_snapshot = delta as f64 / snapshots.len() as f64;

    Some(GcEffectiveness {
        collections_per_snapshot: per_snapshot,
        level: if per_snapshot < 10.0 { "high" } else { "low" }.to_string(),
    })
}

/// Per-type counts for every type seen anywhere in the slice (missing = 0)
pub fn count_series(snapshots: &[MemorySnapshot]) -> HashMap<String, Vec<u64>> {
    let types: BTreeSet<&str> = snapshots
        .iter()
        .flat_map(|s| s.object_counts.keys().map(String::as_str))
        .collect();

    types
        .into_iter()
        .map(|t| {
            let series = snapshots.iter().map(|s| s.count_of(t)).collect();
            (t.to_string(), series)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::GcGenerationStats;

    fn with_fragmentation(ratios: &[f64]) -> Vec<MemorySnapshot> {
        ratios
            .iter()
            .enumerate()
            .map(|(i, &r)| MemorySnapshot::new(i as f64, 100.0).with_fragmentation(r))
            .collect()
    }

    #[test]
    fn test_fragmentation_average_within_bounds() {
        let sequences: [&[f64]; 4] = [
            &[0.1, 0.1, 0.1],
            &[0.0, 1.0],
            &[0.33, 0.21, 0.87, 0.05, 0.61, 0.44, 0.12],
            &[0.7],
        ];
        for seq in sequences {
            let frag = analyze_fragmentation(&with_fragmentation(seq)).unwrap();
            assert!(frag.average >= frag.min && frag.average <= frag.max);
        }
    }

    #[test]
    fn test_fragmentation_severity_and_trend() {
        let frag = analyze_fragmentation(&with_fragmentation(&[
            0.1, 0.1, 0.2, 0.2, 0.3, 0.5, 0.6, 0.7, 0.8, 0.9,
        ]))
        .unwrap();
        assert!(frag.worsening);
        assert!((frag.trend - 0.52).abs() < 1e-9);
        assert_eq!(frag.severity, FragmentationSeverity::Moderate);

        assert_eq!(FragmentationSeverity::from_ratio(0.05), FragmentationSeverity::Minimal);
        assert_eq!(FragmentationSeverity::from_ratio(0.3), FragmentationSeverity::Moderate);
        assert_eq!(FragmentationSeverity::from_ratio(0.95), FragmentationSeverity::Critical);
        assert!(analyze_fragmentation(&[]).is_err());
    }

    #[test]
    fn test_distribution_concentration_and_diversity() {
        let snaps = vec![MemorySnapshot::new(0.0, 50.0)
            .with_object_counts([("a", 25u64), ("b", 25), ("c", 25), ("d", 25)])];
        let dist = analyze_object_distribution(&snaps).unwrap();
        assert_eq!(dist.total_objects, 100);
        assert!((dist.diversity_score - 1.0).abs() < 1e-9);
        assert!((dist.concentration_ratio - 0.25).abs() < 1e-9);
        assert!(dist.growth.is_none());

        let single = vec![MemorySnapshot::new(0.0, 50.0).with_object_counts([("a", 10u64)])];
        let dist = analyze_object_distribution(&single).unwrap();
        assert_eq!(dist.diversity_score, 0.0);
        assert_eq!(dist.concentration_ratio, 1.0);
    }

    #[test]
    fn test_distribution_growth_uses_intersection() {
        let snaps = vec![
            MemorySnapshot::new(0.0, 50.0)
                .with_object_counts([("dict", 100u64), ("list", 100), ("gone", 40), ("same", 50)]),
            MemorySnapshot::new(1.0, 60.0)
                .with_object_counts([("dict", 150u64), ("list", 80), ("new", 900), ("same", 52)]),
        ];
        let growth = analyze_object_distribution(&snaps).unwrap().growth.unwrap();
        assert_eq!(growth.growing.len(), 1);
        assert_eq!(growth.growing[0].type_name, "dict");
        assert!((growth.growing[0].change_percent - 50.0).abs() < 1e-9);
        assert_eq!(growth.shrinking.len(), 1);
        assert_eq!(growth.shrinking[0].type_name, "list");
    }

    #[test]
    fn test_empty_census_is_degenerate() {
        let snaps = vec![MemorySnapshot::new(0.0, 50.0)];
        assert!(matches!(
            analyze_object_distribution(&snaps),
            Err(AnalysisOutcome::Degenerate(_))
        ));
    }

    #[test]
    fn test_patterns_flag_growing_type() {
        let foo = [10u64, 12, 15, 20, 35];
        let snaps: Vec<MemorySnapshot> = foo
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let snap = MemorySnapshot::new(i as f64, 100.0 + i as f64);
                if i == 2 {
                    snap.with_object_counts([("Foo", c), ("Bar", 3)])
                } else {
                    snap.with_object_counts([("Foo", c)])
                }
            })
            .collect();

        let patterns = analyze_memory_patterns(&snaps).unwrap();
        assert!(patterns.memory_leaks.contains(&"Foo".to_string()));
        assert!(!patterns.memory_leaks.contains(&"Bar".to_string()));
        assert!(patterns.gc_effectiveness.is_none());
    }

    #[test]
    fn test_patterns_growth_spikes_and_gc() {
        let memory = [100.0, 100.0, 100.0, 150.0, 120.0, 160.0, 130.0, 170.0];
        let snaps: Vec<MemorySnapshot> = memory
            .iter()
            .enumerate()
            .map(|(i, &m)| {
                MemorySnapshot::new(i as f64, m)
                    .with_gc_stats(vec![GcGenerationStats::new(i as u64 * 4, 100)])
            })
            .collect();

        let patterns = analyze_memory_patterns(&snaps).unwrap();
        assert!(patterns.steady_growth);
        assert!(patterns.periodic_spikes);
        let gc = patterns.gc_effectiveness.unwrap();
        assert!((gc.collections_per_snapshot - 3.5).abs() < 1e-9);
        assert_eq!(gc.level, "high");

        assert!(analyze_memory_patterns(&snaps[..4]).is_err());
    }
}
