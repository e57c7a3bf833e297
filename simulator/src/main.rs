use anyhow::Context;
use clap::Parser;
use generator::profile::build_scan;
use log::info;
use monitor::bridge::MonitorBridge;
use monitor::model::MonitorModel;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod monitor;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline scan driver for the radar moments core")]
struct Args {
    /// Run one offline scan and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of indexed beams the synthetic sweep should cover
    #[arg(long, default_value_t = 8)]
    beams: usize,
    /// Seed for the scenario generator
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Keep the monitor endpoint alive for posted scenarios
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.config {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.beams, args.seed)
    };

    let runner = Runner::new(workflow_config.clone());
    let bridge = MonitorBridge::new(Arc::new(runner.clone()));

    if args.offline {
        let pulses = build_scan(&workflow_config.scenario, &workflow_config.radar)?;
        info!("offline scan: {} synthetic pulses", pulses.len());
        let summary = runner.run_scan(&pulses)?;

        println!(
            "Offline scan -> pulses {}, beams {}, gates flagged {}",
            summary.metrics.pulses_ingested,
            summary.beams.len(),
            summary.gates_flagged
        );

        let model = MonitorModel::from_summary(
            &summary,
            workflow_config.scenario.description.clone(),
        );
        bridge.publish(&model)?;
        bridge.publish_status("Offline scan results ready.");

        let report_path = PathBuf::from("tools/data/scan_summary.json");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&report_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing scan report {}", report_path.display()))?;
    }
    if args.serve {
        bridge.publish_status("Monitor endpoint running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
