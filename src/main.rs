use std::path::Path;

use anyhow::Context;
use ev_charging_forecast::{pipeline, TrainingConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: train_model <sessions_file> <logs_file>";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [sessions_path, logs_path] = args.as_slice() else {
        println!("{USAGE}");
        std::process::exit(1);
    };

    // after a successful parse stdout carries only the report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = TrainingConfig::default();
    let report = pipeline::run(Path::new(sessions_path), Path::new(logs_path), &config)
        .with_context(|| format!("training on {sessions_path} and {logs_path} failed"))?;

    println!("{}", report.to_json_line().context("failed to encode report")?);
    Ok(())
}
