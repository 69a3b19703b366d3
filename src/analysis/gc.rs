//! Garbage collection efficiency analysis
//!
//! Everything here is derived from cumulative per-generation counters, so
//! only deltas between snapshots carry information. Pause impact is not
//! measured; it is inferred from memory stability and labeled as such.

use serde::{Deserialize, Serialize};

use super::stats;
use crate::core::recommendation::{Priority, Recommendation, RecommendationCategory};
use crate::core::error::{AnalysisOutcome, AnalysisResult};
use crate::core::snapshot::MemorySnapshot;

const FREQUENT_MINOR_GC_PER_SEC: f64 = 20.0;
const FREQUENT_MAJOR_GC_PER_SEC: f64 = 0.1;
const HIGH_GC_FREQUENCY_PER_SEC: f64 = 10.0;
const LOW_EFFICIENCY: f64 = 0.5;
/// Objects per collection below which collections look wasted
const MIN_OBJECTS_PER_COLLECTION: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcPerformanceLevel {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl GcPerformanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.2 {
            GcPerformanceLevel::Critical
        } else if score < 0.4 {
            GcPerformanceLevel::Poor
        } else if score < 0.6 {
            GcPerformanceLevel::Fair
        } else if score < 0.8 {
            GcPerformanceLevel::Good
        } else {
            GcPerformanceLevel::Excellent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDelta {
    pub generation: usize,
    pub collections: u64,
    pub collected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcEfficiency {
    pub generations: Vec<GenerationDelta>,
    pub total_gc_collections: u64,
    pub total_objects_collected: u64,
    pub time_span_secs: f64,
    pub gc_frequency_per_second: f64,
    pub memory_stability: f64,
    pub frequency_score: f64,
    pub efficiency_score: f64,
    pub performance_level: GcPerformanceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// Estimated pause impact; a proxy derived from memory stability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseImpact {
    pub estimated_impact: f64,
    pub level: ImpactLevel,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

impl CorrelationStrength {
    fn from_coefficient(r: f64) -> Self {
        let r = r.abs();
        if r < 0.3 {
            CorrelationStrength::Weak
        } else if r < 0.7 {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Strong
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcMemoryCorrelation {
    pub coefficient: f64,
    pub strength: CorrelationStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcPatterns {
    pub minor_gc_rate: f64,
    pub frequent_minor_gc: bool,
    /// None with fewer than three generations
    pub major_gc_rate: Option<f64>,
    pub frequent_major_gc: bool,
    pub pause_impact: PauseImpact,
    pub memory_correlation: GcMemoryCorrelation,
}

/// Snapshots carrying GC counters, checked for a consistent generation count
fn valid_gc_snapshots(
    snapshots: &[MemorySnapshot],
    required: usize,
) -> AnalysisResult<Vec<&MemorySnapshot>> {
    let valid: Vec<&MemorySnapshot> =
        snapshots.iter().filter(|s| !s.gc_stats.is_empty()).collect();
    AnalysisOutcome::require(required, valid.len())?;

    let first = valid[0].gc_stats.len();
    let last = valid[valid.len() - 1].gc_stats.len();
    if first != last {
        return Err(AnalysisOutcome::MismatchedGenerations { first, last });
    }
    Ok(valid)
}

fn generation_deltas(first: &MemorySnapshot, last: &MemorySnapshot) -> Vec<GenerationDelta> {
    first
        .gc_stats
        .iter()
        .zip(&last.gc_stats)
        .enumerate()
        .map(|(generation, (a, b))| GenerationDelta {
            generation,
            collections: b.collections.saturating_sub(a.collections),
            collected: b.collected.saturating_sub(a.collected),
        })
        .collect()
}

fn time_span(first: &MemorySnapshot, last: &MemorySnapshot) -> f64 {
    (last.timestamp - first.timestamp).max(0.0)
}

fn per_second(count: u64, span: f64) -> f64 {
    if span > 0.0 {
        count as f64 / span
    } else {
        0.0
    }
}

/// 1 - coefficient of variation of the memory series, clamped to [0, 1]
fn memory_stability(snapshots: &[&MemorySnapshot]) -> f64 {
    let values: Vec<f64> = snapshots.iter().map(|s| s.process_memory_mb).collect();
    (1.0 - stats::coefficient_of_variation(&values)).clamp(0.0, 1.0)
}

/// How appropriate a collection rate is; best between 1 and 5 per second
pub fn frequency_score(per_sec: f64) -> f64 {
    if (1.0..=5.0).contains(&per_sec) {
        1.0
    } else if (0.5..1.0).contains(&per_sec) || (per_sec > 5.0 && per_sec <= 10.0) {
        0.7
    } else if per_sec > 10.0 && per_sec <= 20.0 {
        0.4
    } else {
        0.2
    }
}

/// Collection counts, rate and a composite efficiency score
pub fn analyze_gc_efficiency(snapshots: &[MemorySnapshot]) -> AnalysisResult<GcEfficiency> {
    let valid = valid_gc_snapshots(snapshots, 2)?;
    let first = valid[0];
    let last = valid[valid.len() - 1];

    let generations = generation_deltas(first, last);
    let total_gc_collections: u64 = generations.iter().map(|g| g.collections).sum();
    let total_objects_collected: u64 = generations.iter().map(|g| g.collected).sum();

    let span = time_span(first, last);
    let frequency = per_second(total_gc_collections, span);
    let stability = memory_stability(&valid);
    let freq_score = frequency_score(frequency);
    let efficiency = (0.6 * stability + 0.4 * freq_score).clamp(0.0, 1.0);

    Ok(GcEfficiency {
        generations,
        total_gc_collections,
        total_objects_collected,
        time_span_secs: span,
        gc_frequency_per_second: frequency,
        memory_stability: stability,
        frequency_score: freq_score,
        efficiency_score: efficiency,
        performance_level: GcPerformanceLevel::from_score(efficiency),
    })
}

/// Minor/major collection pressure, pause proxy and memory correlation
pub fn analyze_gc_patterns(snapshots: &[MemorySnapshot]) -> AnalysisResult<GcPatterns> {
    let valid = valid_gc_snapshots(snapshots, 5)?;
    let first = valid[0];
    let last = valid[valid.len() - 1];
    let span = time_span(first, last);
    let deltas = generation_deltas(first, last);

    let minor_gc_rate = per_second(deltas[0].collections, span);
    let major_gc_rate = deltas.get(2).map(|d| per_second(d.collections, span));

    let stability = memory_stability(&valid);
    let estimated_impact = 1.0 - stability;
    let level = if estimated_impact < 0.2 {
        ImpactLevel::Low
    } else if estimated_impact < 0.5 {
        ImpactLevel::Medium
    } else {
        ImpactLevel::High
    };

    // per-interval memory change vs per-interval collection events
    let memory: Vec<f64> = valid.iter().map(|s| s.process_memory_mb).collect();
    let memory_deltas = stats::deltas(&memory);
    let gc_events: Vec<f64> = valid
        .windows(2)
        .map(|w| w[1].total_collections().saturating_sub(w[0].total_collections()) as f64)
        .collect();
    let coefficient = stats::pearson(&memory_deltas, &gc_events);

    Ok(GcPatterns {
        minor_gc_rate,
        frequent_minor_gc: minor_gc_rate > FREQUENT_MINOR_GC_PER_SEC,
        major_gc_rate,
        frequent_major_gc: major_gc_rate.is_some_and(|r| r > FREQUENT_MAJOR_GC_PER_SEC),
        pause_impact: PauseImpact {
            estimated_impact,
            level,
            source: "estimated from memory stability, not measured pause time".to_string(),
        },
        memory_correlation: GcMemoryCorrelation {
            coefficient,
            strength: CorrelationStrength::from_coefficient(coefficient),
        },
    })
}

/// Rule-based GC tuning advice
pub fn generate_gc_recommendations(snapshots: &[MemorySnapshot]) -> Vec<Recommendation> {
    let Ok(efficiency) = analyze_gc_efficiency(snapshots) else {
        return Vec::new();
    };
    let mut recs = Vec::new();

    if efficiency.gc_frequency_per_second > HIGH_GC_FREQUENCY_PER_SEC {
        recs.push(Recommendation::new(
            Priority::High,
            RecommendationCategory::GarbageCollection,
            format!(
                "GC runs {:.1} times per second; consider reducing short-lived allocations or raising collection thresholds",
                efficiency.gc_frequency_per_second
            ),
        ));
    }

    if efficiency.efficiency_score < LOW_EFFICIENCY {
        recs.push(Recommendation::new(
            Priority::High,
            RecommendationCategory::GarbageCollection,
            format!(
                "GC efficiency is low ({:.2}); review allocation patterns and object lifetimes",
                efficiency.efficiency_score
            ),
        ));
    }

    if efficiency.generations.len() >= 3 {
        let gen0 = efficiency.generations[0].collections as f64;
        let gen2 = efficiency.generations[2].collections as f64;
        if gen0 > 0.0 && gen2 > gen0 * 0.1 {
            recs.push(Recommendation::new(
                Priority::High,
                RecommendationCategory::GarbageCollection,
                format!(
                    "Major collections are {:.0}% of minor collections; long-lived objects are being promoted too often",
                    gen2 / gen0 * 100.0
                ),
            ));
        }
    }

    if efficiency.total_gc_collections > 0 {
        let per_collection =
            efficiency.total_objects_collected as f64 / efficiency.total_gc_collections as f64;
        if per_collection < MIN_OBJECTS_PER_COLLECTION {
            recs.push(Recommendation::new(
                Priority::Low,
                RecommendationCategory::GarbageCollection,
                format!(
                    "Each collection reclaims only {:.1} objects on average; collections may be triggered too eagerly",
                    per_collection
                ),
            ));
        }
    }

    recs
}
