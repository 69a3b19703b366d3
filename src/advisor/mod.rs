//! Optimization advisor
//!
//! Runs the trend, object and GC analyzers over one snapshot slice and fuses
//! their results into a single scored report. An analyzer that returns no
//! result contributes "no signal" (a neutral sub-score) instead of aborting
//! the report.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::analysis::gc::{self, GcEfficiency};
use crate::analysis::objects::{self, FragmentationAnalysis, ObjectDistribution};
use crate::analysis::trend::{self, StabilityAnalysis, TrendAnalysis, TrendDirection};
use crate::core::config::ProfilerConfig;
use crate::core::snapshot::MemorySnapshot;
pub use crate::core::recommendation::{
    self, prioritize, prioritize_messages, Priority, Recommendation, RecommendationCategory,
};

const TREND_WEIGHT: f64 = 0.25;
const STABILITY_WEIGHT: f64 = 0.20;
const FRAGMENTATION_WEIGHT: f64 = 0.20;
const OBJECTS_WEIGHT: f64 = 0.15;
const GC_WEIGHT: f64 = 0.20;
/// Sub-score used when an analyzer had nothing to say
const NO_SIGNAL_SCORE: f64 = 0.5;
const MANY_OBJECTS: u64 = 100_000;

/// Letter grade for the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    F,
    D,
    C,
    CPlus,
    B,
    BPlus,
    A,
    APlus,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Grade::APlus
        } else if score >= 0.8 {
            Grade::A
        } else if score >= 0.7 {
            Grade::BPlus
        } else if score >= 0.6 {
            Grade::B
        } else if score >= 0.5 {
            Grade::CPlus
        } else if score >= 0.4 {
            Grade::C
        } else if score >= 0.3 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-component scores feeding the overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub trend: f64,
    pub stability: f64,
    pub fragmentation: f64,
    pub objects: f64,
    pub gc: f64,
}

impl ScoreBreakdown {
    /// Weighted sum, clamped to [0, 1]
    pub fn overall(&self) -> f64 {
        let score = self.trend * TREND_WEIGHT
            + self.stability * STABILITY_WEIGHT
            + self.fragmentation * FRAGMENTATION_WEIGHT
            + self.objects * OBJECTS_WEIGHT
            + self.gc * GC_WEIGHT;
        if score.is_nan() {
            return 0.0;
        }
        score.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub generated_at: String,
    pub snapshot_count: usize,
    pub trend: Option<TrendAnalysis>,
    pub stability: Option<StabilityAnalysis>,
    pub fragmentation: Option<FragmentationAnalysis>,
    pub objects: Option<ObjectDistribution>,
    pub gc: Option<GcEfficiency>,
    pub scores: ScoreBreakdown,
    pub overall_score: f64,
    pub grade: Grade,
    pub recommendations: Vec<Recommendation>,
    pub quick_wins: Vec<String>,
    pub long_term_strategies: Vec<String>,
}

/// Fuses analyzer output into scored, prioritized advice
pub struct OptimizationAdvisor {
    config: Arc<ProfilerConfig>,
}

impl OptimizationAdvisor {
    pub fn new(config: Arc<ProfilerConfig>) -> Self {
        Self { config }
    }

    /// Run every analyzer and assemble the report
    pub fn generate_comprehensive_report(&self, snapshots: &[MemorySnapshot]) -> ComprehensiveReport {
        let trend = trend::analyze_memory_trend(snapshots)
            .map_err(|e| debug!("trend analysis skipped: {}", e))
            .ok();
        let stability = trend::analyze_memory_stability(snapshots)
            .map_err(|e| debug!("stability analysis skipped: {}", e))
            .ok();
        let fragmentation = objects::analyze_fragmentation(snapshots)
            .map_err(|e| debug!("fragmentation analysis skipped: {}", e))
            .ok();
        let distribution = objects::analyze_object_distribution(snapshots)
            .map_err(|e| debug!("object analysis skipped: {}", e))
            .ok();
        let gc = gc::analyze_gc_efficiency(snapshots)
            .map_err(|e| debug!("gc analysis skipped: {}", e))
            .ok();

        let scores = score_breakdown(
            trend.as_ref(),
            stability.as_ref(),
            fragmentation.as_ref(),
            distribution.as_ref(),
            gc.as_ref(),
        );
        let overall_score = scores.overall();

        ComprehensiveReport {
            generated_at: chrono::Local::now().to_rfc3339(),
            snapshot_count: snapshots.len(),
            trend,
            stability,
            fragmentation,
            objects: distribution,
            gc,
            scores,
            overall_score,
            grade: Grade::from_score(overall_score),
            recommendations: self.identify_optimization_opportunities(snapshots),
            quick_wins: quick_wins(snapshots),
            long_term_strategies: long_term_strategies(),
        }
    }

    /// All rule sets, concatenated and sorted by priority
    pub fn identify_optimization_opportunities(
        &self,
        snapshots: &[MemorySnapshot],
    ) -> Vec<Recommendation> {
        let mut recs = self.trend_rules(snapshots);
        recs.extend(self.object_rules(snapshots));
        recs.extend(gc::generate_gc_recommendations(snapshots));
        recs.extend(pattern_rules(snapshots));
        prioritize(recs)
    }

    fn trend_rules(&self, snapshots: &[MemorySnapshot]) -> Vec<Recommendation> {
        let mut recs = Vec::new();
        let Ok(trend) = trend::analyze_memory_trend(snapshots) else {
            return recs;
        };

        if trend.direction == TrendDirection::Increasing {
            recs.push(Recommendation::new(
                Priority::High,
                RecommendationCategory::Trend,
                format!(
                    "Memory usage is increasing by {:.2} MB per snapshot ({:+.1}% overall); check caches and long-lived collections",
                    trend.slope, trend.growth_percent
                ),
            ));
        }

        if trend.volatility > 0.2 {
            recs.push(Recommendation::new(
                Priority::Low,
                RecommendationCategory::Trend,
                format!(
                    "Memory usage is volatile (coefficient of variation {:.2}); batch allocations to smooth usage",
                    trend.volatility
                ),
            ));
        }

        if trend.last_mb > self.config.memory_threshold_mb {
            recs.push(Recommendation::new(
                Priority::Critical,
                RecommendationCategory::Trend,
                format!(
                    "Resident memory {:.0} MB exceeds the {:.0} MB threshold",
                    trend.last_mb, self.config.memory_threshold_mb
                ),
            ));
        }

        recs
    }

    fn object_rules(&self, snapshots: &[MemorySnapshot]) -> Vec<Recommendation> {
        let mut recs = Vec::new();

        if let Ok(frag) = objects::analyze_fragmentation(snapshots) {
            if frag.average > self.config.fragmentation_threshold {
                let priority = if frag.average >= 0.5 {
                    Priority::Critical
                } else {
                    Priority::High
                };
                recs.push(Recommendation::new(
                    priority,
                    RecommendationCategory::Fragmentation,
                    format!(
                        "Heap fragmentation is {} ({:.0}% on average); consider object pooling or arena allocation",
                        frag.severity,
                        frag.average * 100.0
                    ),
                ));
            }
            if frag.worsening {
                recs.push(Recommendation::new(
                    Priority::High,
                    RecommendationCategory::Fragmentation,
                    format!("Fragmentation is worsening (+{:.2} over the history)", frag.trend),
                ));
            }
        }

        if let Ok(dist) = objects::analyze_object_distribution(snapshots) {
            if dist.concentration_ratio > 0.5 {
                if let Some((name, count)) = dist.top_types.first() {
                    recs.push(Recommendation::new(
                        Priority::Low,
                        RecommendationCategory::Objects,
                        format!(
                            "'{}' holds {:.0}% of live objects ({} instances); review its allocation sites",
                            name,
                            dist.concentration_ratio * 100.0,
                            count
                        ),
                    ));
                }
            }
            if dist.total_objects > MANY_OBJECTS {
                recs.push(Recommendation::new(
                    Priority::High,
                    RecommendationCategory::Objects,
                    format!(
                        "{} live objects tracked; consider shorter object lifetimes or streaming processing",
                        dist.total_objects
                    ),
                ));
            }
            if let Some(growth) = &dist.growth {
                for change in growth.growing.iter().filter(|c| c.change_percent >= 50.0) {
                    recs.push(Recommendation::new(
                        Priority::High,
                        RecommendationCategory::Objects,
                        format!(
                            "'{}' grew {:.0}% ({} -> {})",
                            change.type_name, change.change_percent, change.initial, change.current
                        ),
                    ));
                }
            }
        }

        recs
    }
}

fn pattern_rules(snapshots: &[MemorySnapshot]) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let Ok(patterns) = objects::analyze_memory_patterns(snapshots) else {
        return recs;
    };

    if !patterns.memory_leaks.is_empty() {
        recs.push(Recommendation::new(
            Priority::Critical,
            RecommendationCategory::Pattern,
            format!(
                "Possible leak: counts only ever grew for {}",
                patterns.memory_leaks.join(", ")
            ),
        ));
    }
    if patterns.steady_growth {
        recs.push(Recommendation::new(
            Priority::High,
            RecommendationCategory::Pattern,
            "Memory grows steadily across the session; verify that caches are bounded",
        ));
    }
    if patterns.periodic_spikes {
        recs.push(Recommendation::new(
            Priority::Low,
            RecommendationCategory::Pattern,
            format!(
                "Periodic memory spikes ({:.0}% of samples); spread out bulk work",
                patterns.spike_frequency * 100.0
            ),
        ));
    }
    if let Some(gc) = &patterns.gc_effectiveness {
        if gc.level == "low" {
            recs.push(Recommendation::new(
                Priority::High,
                RecommendationCategory::Pattern,
                format!(
                    "{:.1} collections per snapshot; reduce temporary allocations",
                    gc.collections_per_snapshot
                ),
            ));
        }
    }

    recs
}

fn score_breakdown(
    trend: Option<&TrendAnalysis>,
    stability: Option<&StabilityAnalysis>,
    fragmentation: Option<&FragmentationAnalysis>,
    objects: Option<&ObjectDistribution>,
    gc: Option<&GcEfficiency>,
) -> ScoreBreakdown {
    let trend = trend.map_or(NO_SIGNAL_SCORE, |t| {
        let base = if t.direction == TrendDirection::Stable { 1.0 } else { 0.5 };
        base * (1.0 - t.volatility.min(1.0))
    });
    let stability = stability.map_or(NO_SIGNAL_SCORE, |s| s.stability_score);
    let fragmentation = fragmentation.map_or(NO_SIGNAL_SCORE, |f| 1.0 - f.average);
    let objects = objects.map_or(NO_SIGNAL_SCORE, |o| {
        (o.diversity_score + (1.0 - o.concentration_ratio)) / 2.0
    });
    let gc = gc.map_or(NO_SIGNAL_SCORE, |g| g.efficiency_score);

    ScoreBreakdown { trend, stability, fragmentation, objects, gc }
}

/// Cheap actions suggested by the latest snapshot
pub fn quick_wins(snapshots: &[MemorySnapshot]) -> Vec<String> {
    let mut wins = Vec::new();
    let Some(latest) = snapshots.last() else {
        return wins;
    };

    if !latest.gc_stats.is_empty() {
        wins.push("Trigger a manual collection at idle points to release unreachable objects".to_string());
    }
    if latest.total_objects() > MANY_OBJECTS {
        wins.push(format!(
            "{} live objects: release temporary objects sooner and shorten object lifetimes",
            latest.total_objects()
        ));
    }
    wins
}

/// Architectural suggestions, independent of the data
pub fn long_term_strategies() -> Vec<String> {
    vec![
        "Introduce object pools for frequently allocated types".to_string(),
        "Stream large inputs instead of loading them fully into memory".to_string(),
        "Bound every cache with a size limit and an eviction policy".to_string(),
        "Add memory regression checks to continuous integration".to_string(),
    ]
}
