//! Simple text-based dashboard

use crate::advisor::ComprehensiveReport;
use crate::core::snapshot::MemorySnapshot;

const BAR_WIDTH: usize = 40;

fn bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| "n/a".to_string())
}

pub fn render_dashboard(latest: Option<&MemorySnapshot>, report: &ComprehensiveReport) -> String {
    let (rss, vms, percent, objects) = match latest {
        Some(s) => (s.process_memory_mb, s.virtual_memory_mb, s.memory_percent, s.total_objects()),
        None => (0.0, 0.0, 0.0, 0),
    };

    let trend = or_na(report.trend.as_ref().map(|t| {
        format!("{} ({:+.2} MB/sample, {:+.1}%)", t.direction, t.slope, t.growth_percent)
    }));
    let stability = or_na(report.stability.as_ref().map(|s| {
        format!("{:.2}{}", s.stability_score, if s.is_stable { " stable" } else { "" })
    }));
    let fragmentation = or_na(report.fragmentation.as_ref().map(|f| {
        format!("{:.2} ({})", f.average, f.severity)
    }));
    let gc = or_na(report.gc.as_ref().map(|g| {
        format!("{:.2} ({:?}, {:.2}/s)", g.efficiency_score, g.performance_level, g.gc_frequency_per_second)
    }));

    let mut out = format!(
r#"
================ Memory Profiler Dashboard ================

Process Memory: {} {:.1}%
Resident:  {:>10.1} MB
Virtual:   {:>10.1} MB
Objects:   {:>10}

------------------------ Analysis ------------------------
Samples:        {}
Trend:          {}
Stability:      {}
Fragmentation:  {}
GC Efficiency:  {}

Score: {:.2}  Grade: {}
"#,
        bar(percent / 100.0),
        percent,
        rss,
        vms,
        objects,
        report.snapshot_count,
        trend,
        stability,
        fragmentation,
        gc,
        report.overall_score,
        report.grade,
    );

    if !report.recommendations.is_empty() {
        out.push_str("\n--------------------- Recommendations ---------------------\n");
        for rec in report.recommendations.iter().take(5) {
            out.push_str(&format!("  {}\n", rec));
        }
    }
    out.push_str("============================================================\n");
    out
}
