//! Memory profiler CLI

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use memprof_advisor::monitor::render_dashboard;
use memprof_advisor::{ProfilerConfig, ProfilerContext};

#[derive(Parser)]
#[command(name = "memprof")]
#[command(about = "Memory profiler and optimization advisor", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current process memory
    Status,

    /// Sample this process, analyze the history and save a report
    Profile {
        #[arg(short, long, default_value = "10")]
        samples: usize,

        /// Seconds between samples
        #[arg(short, long, default_value = "1")]
        interval: u64,

        /// Report path (defaults to a timestamped file in report_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<(ProfilerConfig, PathBuf), Box<dyn std::error::Error>> {
    let path = path.cloned().unwrap_or_else(ProfilerConfig::default_path);
    let base = if path.exists() {
        ProfilerConfig::load(&path)?
    } else {
        ProfilerConfig::default()
    };
    let config = base.with_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok((config, path))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let (config, config_path) = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Status => {
            let ctx = ProfilerContext::new(config)?;
            match ctx.monitor.take_snapshot() {
                Some(snap) => {
                    println!("Process Memory:");
                    println!("  Resident:  {:.1} MB", snap.process_memory_mb);
                    println!("  Virtual:   {:.1} MB", snap.virtual_memory_mb);
                    println!("  Share:     {:.2}%", snap.memory_percent);
                    println!(
                        "  Threshold: {}",
                        if snap.process_memory_mb > ctx.config().memory_threshold_mb {
                            "EXCEEDED"
                        } else {
                            "OK"
                        }
                    );
                }
                None => println!("Memory status unavailable"),
            }
        }

        Commands::Profile { samples, interval, output } => {
            info!("Profiling {} samples at {}s intervals", samples, interval);
            let ctx = ProfilerContext::new(config)?;
            ctx.set_baseline();

            for i in 0..samples {
                if ctx.monitor.take_snapshot().is_none() {
                    warn!("Sample {} failed", i + 1);
                }
                if i + 1 < samples {
                    tokio::time::sleep(Duration::from_secs(interval)).await;
                }
            }

            let report = ctx.comprehensive_report();
            println!("{}", render_dashboard(ctx.monitor.latest().as_ref(), &report));

            for leak in ctx.detect_leaks() {
                println!(
                    "Leak suspect: {} ({:.3} MB/s, confidence {:.2})",
                    leak.object_type, leak.leak_rate_mb_per_sec, leak.confidence_score
                );
            }

            if ctx.checkpoint("profile end", "after sampling").is_some() {
                if let Ok(effect) = ctx.effect_reporter.generate_effect_report() {
                    println!(
                        "Change since start: {:+.1} MB",
                        -effect.latest_improvement.memory_reduction_mb
                    );
                }
            }

            let path = ctx.save_report(output.as_deref())?;
            println!("Report saved to {}", path.display());
        }

        Commands::Config { init } => {
            println!("Current Configuration ({}):", config_path.display());
            println!("{}", toml::to_string_pretty(&config)?);
            if init {
                config.save(&config_path)?;
                println!("Written to {}", config_path.display());
            }
        }
    }

    Ok(())
}
