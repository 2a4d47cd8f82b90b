use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use ipreconcile::collector::SnapshotCollector;
use ipreconcile::config_loader;
use ipreconcile::output;
use ipreconcile::reconcile::Reconciler;

/// Address-space reconciliation for multi-cloud IP pool utilization
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the cloud and pool configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Directory holding one <cloud>.json allocation snapshot per cloud
    #[arg(short, long)]
    snapshots: PathBuf,

    /// Earlier report.json whose allocations stand in for clouds that fail to load
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, default_value = "report_output")]
    output: PathBuf,

    /// Also write a human-readable report.txt
    #[arg(long)]
    text: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel collection workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .wrap_err("Failed to configure thread pool")?;
    }

    info!("Configuration file: {:?}", args.config);
    info!("Snapshot directory: {:?}", args.snapshots);
    let config = config_loader::load_config(&args.config)?;
    let reconciler = Reconciler::from_config(&config);

    let previous = match &args.previous {
        Some(path) => match output::read_json_report(path) {
            Ok(report) => {
                info!("Loaded {} fallback allocations from {:?}", report.allocations.len(), path);
                Some(report.allocations)
            }
            Err(e) => {
                warn!("Ignoring previous report: {:#}", e);
                None
            }
        },
        None => None,
    };

    let collector = SnapshotCollector::new(&args.snapshots);
    let report = reconciler.run(&collector, previous.as_deref());

    fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", args.output.display()))?;
    output::write_json_report(&report, &args.output.join("report.json"))?;
    if args.text {
        output::write_text_report(&report, &args.output.join("report.txt"))?;
    }

    for warning in &report.warnings {
        warn!("{}", warning.message);
    }
    info!(
        "{} of {} addresses used ({:.2}%), {} conflicting addresses",
        report.used, report.total, report.usage_pct, report.duplicate_summary.conflicting_ips
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(&[
            "ipreconcile",
            "--config", "clouds.yaml",
            "--snapshots", "snapshots",
        ]);

        assert_eq!(args.config, PathBuf::from("clouds.yaml"));
        assert_eq!(args.snapshots, PathBuf::from("snapshots"));
        assert_eq!(args.output, PathBuf::from("report_output"));
        assert_eq!(args.previous, None);
        assert!(!args.text);
        assert_eq!(args.threads, 0);
    }

    #[test]
    fn test_previous_and_text_args() {
        let args = Args::parse_from(&[
            "ipreconcile",
            "-c", "clouds.yaml",
            "-s", "snapshots",
            "--previous", "last/report.json",
            "--text",
            "-j", "4",
        ]);

        assert_eq!(args.previous, Some(PathBuf::from("last/report.json")));
        assert!(args.text);
        assert_eq!(args.threads, 4);
    }
}
