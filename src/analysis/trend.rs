//! Memory usage trend analysis
//!
//! Works on the `process_memory_mb` series of a snapshot slice. Regression
//! uses the snapshot index as the independent variable, so the slope is in
//! MB per snapshot and assumes a roughly uniform sampling cadence.

use serde::{Deserialize, Serialize};

use super::stats;
use crate::core::error::{AnalysisOutcome, AnalysisResult};
use crate::core::snapshot::{memory_series, MemorySnapshot};

/// Slope (MB per snapshot) beyond which the series counts as moving
const TREND_SLOPE_THRESHOLD: f64 = 0.1;
/// Peaks/valleys this far from the mean are significant
const SIGNIFICANCE_RATIO: f64 = 0.2;
const STABLE_SCORE: f64 = 0.7;

/// Direction of the memory series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    fn from_slope(slope: f64) -> Self {
        if slope > TREND_SLOPE_THRESHOLD {
            TrendDirection::Increasing
        } else if slope < -TREND_SLOPE_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// MB per snapshot index
    pub slope: f64,
    /// Coefficient of variation (std / mean)
    pub volatility: f64,
    pub growth_percent: f64,
    pub direction: TrendDirection,
    pub mean_mb: f64,
    pub first_mb: f64,
    pub last_mb: f64,
    pub sample_count: usize,
}

/// An interior local extremum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakAnalysis {
    pub peaks: Vec<Extremum>,
    pub valleys: Vec<Extremum>,
    pub significant_peaks: usize,
    pub significant_valleys: usize,
    pub peak_frequency: f64,
    pub valley_frequency: f64,
    pub avg_peak_mb: f64,
    pub avg_valley_mb: f64,
    pub max_peak_mb: f64,
    pub min_valley_mb: f64,
    /// `f64::INFINITY` when there are no valleys
    pub peak_valley_ratio: f64,
}

impl PeakAnalysis {
    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    pub fn valley_count(&self) -> usize {
        self.valleys.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    /// max - min of the raw series (MB)
    pub amplitude_mb: f64,
    /// Share of interior points where the direction reverses
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityAnalysis {
    pub stability_score: f64,
    pub is_stable: bool,
    pub window: usize,
    pub moving_average: Vec<f64>,
    pub mean_deviation_mb: f64,
    pub oscillation: Oscillation,
}

/// Regression, volatility and growth of the memory series
pub fn analyze_memory_trend(snapshots: &[MemorySnapshot]) -> AnalysisResult<TrendAnalysis> {
    AnalysisOutcome::require(2, snapshots.len())?;

    let values = memory_series(snapshots);
    let slope = stats::index_slope(&values);
    let first = values[0];
    let last = values[values.len() - 1];

    let growth_percent = if first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    Ok(TrendAnalysis {
        slope,
        volatility: stats::coefficient_of_variation(&values),
        growth_percent,
        direction: TrendDirection::from_slope(slope),
        mean_mb: stats::mean(&values),
        first_mb: first,
        last_mb: last,
        sample_count: values.len(),
    })
}

/// Strict interior peaks and valleys of the memory series
pub fn analyze_peaks(snapshots: &[MemorySnapshot]) -> AnalysisResult<PeakAnalysis> {
    AnalysisOutcome::require(3, snapshots.len())?;

    let values = memory_series(snapshots);
    let n = values.len() as f64;
    let mean = stats::mean(&values);

    let to_extrema = |indices: Vec<usize>| -> Vec<Extremum> {
        indices
            .into_iter()
            .map(|index| Extremum { index, value: values[index] })
            .collect()
    };
    let peaks = to_extrema(stats::local_maxima(&values));
    let valleys = to_extrema(stats::local_minima(&values));

    let significant_peaks = peaks
        .iter()
        .filter(|p| p.value > mean * (1.0 + SIGNIFICANCE_RATIO))
        .count();
    let significant_valleys = valleys
        .iter()
        .filter(|v| v.value < mean * (1.0 - SIGNIFICANCE_RATIO))
        .count();

    let peak_values: Vec<f64> = peaks.iter().map(|p| p.value).collect();
    let valley_values: Vec<f64> = valleys.iter().map(|v| v.value).collect();

    let peak_valley_ratio = if valleys.is_empty() {
        f64::INFINITY
    } else {
        peaks.len() as f64 / valleys.len() as f64
    };

    Ok(PeakAnalysis {
        significant_peaks,
        significant_valleys,
        peak_frequency: peaks.len() as f64 / n,
        valley_frequency: valleys.len() as f64 / n,
        avg_peak_mb: stats::mean(&peak_values),
        avg_valley_mb: stats::mean(&valley_values),
        max_peak_mb: peak_values.iter().copied().fold(0.0, f64::max),
        min_valley_mb: valley_values.iter().copied().reduce(f64::min).unwrap_or(0.0),
        peak_valley_ratio,
        peaks,
        valleys,
    })
}

/// Deviation from a trailing moving average, plus oscillation
pub fn analyze_memory_stability(
    snapshots: &[MemorySnapshot],
) -> AnalysisResult<StabilityAnalysis> {
    AnalysisOutcome::require(5, snapshots.len())?;

    let values = memory_series(snapshots);
    let window = (values.len() / 2).min(5);
    let moving_average = stats::moving_average(&values, window);
    let mean_deviation = stats::mean_abs_deviation(&values, &moving_average);
    let mean = stats::mean(&values);

    let stability_score = if mean > 0.0 {
        (1.0 - mean_deviation / mean).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(StabilityAnalysis {
        stability_score,
        is_stable: stability_score >= STABLE_SCORE,
        window,
        moving_average,
        mean_deviation_mb: mean_deviation,
        oscillation: oscillation(&values),
    })
}

fn oscillation(values: &[f64]) -> Oscillation {
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);

    let interior = values.len().saturating_sub(2);
    let reversals = values
        .windows(3)
        .filter(|w| (w[1] - w[0]) * (w[2] - w[1]) < 0.0)
        .count();

    Oscillation {
        amplitude_mb: if values.is_empty() { 0.0 } else { max - min },
        frequency: if interior > 0 {
            reversals as f64 / interior as f64
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<MemorySnapshot> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| MemorySnapshot::new(i as f64, v))
            .collect()
    }

    #[test]
    fn test_trend_needs_two_snapshots() {
        assert!(matches!(
            analyze_memory_trend(&[]),
            Err(AnalysisOutcome::InsufficientData { required: 2, available: 0 })
        ));
        assert!(analyze_memory_trend(&series(&[100.0])).is_err());
    }

    #[test]
    fn test_constant_series_is_stable() {
        let trend = analyze_memory_trend(&series(&[250.0; 8])).unwrap();
        assert!(trend.slope.abs() < 1e-9);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.growth_percent, 0.0);
        assert_eq!(trend.volatility, 0.0);
    }

    #[test]
    fn test_increasing_scenario() {
        let values = [100.0, 102.0, 104.0, 103.0, 106.0, 108.0, 110.0, 109.0, 112.0, 115.0];
        let trend = analyze_memory_trend(&series(&values)).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!(trend.slope > 0.1, "slope {}", trend.slope);
        assert!((trend.growth_percent - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_decreasing_and_zero_start() {
        let trend = analyze_memory_trend(&series(&[0.0, 50.0, 20.0, 10.0])).unwrap();
        assert_eq!(trend.growth_percent, 0.0);

        let trend = analyze_memory_trend(&series(&[500.0, 400.0, 300.0])).unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn test_peaks_and_valleys() {
        let peaks = analyze_peaks(&series(&[1.0, 3.0, 2.0, 5.0, 1.0])).unwrap();
        let peak_idx: Vec<usize> = peaks.peaks.iter().map(|p| p.index).collect();
        let valley_idx: Vec<usize> = peaks.valleys.iter().map(|v| v.index).collect();
        assert_eq!(peak_idx, vec![1, 3]);
        assert_eq!(peaks.peaks[0].value, 3.0);
        assert_eq!(peaks.peaks[1].value, 5.0);
        assert_eq!(valley_idx, vec![2]);
        assert_eq!(peaks.peak_valley_ratio, 2.0);
        assert_eq!(peaks.max_peak_mb, 5.0);
        assert_eq!(peaks.min_valley_mb, 2.0);
        assert!((peaks.peak_frequency - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_significant_extremes() {
        // mean 850/7 ~= 121.4: 150 clears +20%, 140 does not; 60 clears -20%
        let values = [100.0, 150.0, 100.0, 60.0, 100.0, 140.0, 100.0];
        let peaks = analyze_peaks(&series(&values)).unwrap();
        assert_eq!(peaks.peak_count(), 2);
        assert_eq!(peaks.valley_count(), 1);
        assert_eq!(peaks.significant_peaks, 1);
        assert_eq!(peaks.significant_valleys, 1);

        let mild = analyze_peaks(&series(&[100.0, 110.0, 100.0, 95.0, 100.0])).unwrap();
        assert_eq!(mild.peak_count(), 1);
        assert_eq!(mild.significant_peaks, 0);
        assert_eq!(mild.significant_valleys, 0);
    }

    #[test]
    fn test_no_valleys_is_infinite_ratio() {
        let peaks = analyze_peaks(&series(&[1.0, 4.0, 2.0])).unwrap();
        assert_eq!(peaks.peak_count(), 1);
        assert_eq!(peaks.valley_count(), 0);
        assert!(peaks.peak_valley_ratio.is_infinite());
    }

    #[test]
    fn test_plateau_is_not_a_peak() {
        let peaks = analyze_peaks(&series(&[1.0, 3.0, 3.0, 1.0])).unwrap();
        assert!(peaks.peaks.is_empty());
        assert!(analyze_peaks(&series(&[1.0, 2.0])).is_err());
    }

    #[test]
    fn test_stability() {
        let flat = analyze_memory_stability(&series(&[200.0; 10])).unwrap();
        assert_eq!(flat.stability_score, 1.0);
        assert!(flat.is_stable);
        assert_eq!(flat.window, 5);
        assert_eq!(flat.oscillation.amplitude_mb, 0.0);

        let jagged = analyze_memory_stability(&series(&[10.0, 200.0, 10.0, 200.0, 10.0, 200.0]))
            .unwrap();
        assert!(!jagged.is_stable);
        assert_eq!(jagged.oscillation.frequency, 1.0);
        assert_eq!(jagged.oscillation.amplitude_mb, 190.0);

        assert!(analyze_memory_stability(&series(&[1.0; 4])).is_err());
    }
}
