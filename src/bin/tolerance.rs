use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tolerance::engines::{SimulatedDram, SimulationConfig};
use tolerance::memory::{DramGeometry, RowBankColEncoder};
use tolerance::{Campaign, CampaignConfig, CampaignReport, DriveOptions, StopReason, drive};

/// CLI arguments for the `tolerance` binary.
///
/// Runs a hammer tolerance campaign against the simulated DRAM module and prints
/// the error summary.
#[derive(Debug, Parser, Serialize)]
struct CliArgs {
    /// The campaign config file.
    #[clap(long = "config", default_value = "config/campaign.json")]
    config: PathBuf,
    /// The module config file, holding optional `geometry` and `simulation`
    /// sections. The default module is simulated if omitted.
    #[arg(long)]
    module: Option<PathBuf>,
    /// Override the seed of the simulated module.
    #[arg(long)]
    seed: Option<u64>,
    /// The timeout in minutes. The campaign stops at the next iteration boundary
    /// and the partial statistics are reported.
    #[arg(long)]
    timeout: Option<u64>,
    /// Directory to write the JSON report to. Nothing is written if omitted.
    #[arg(long)]
    results: Option<PathBuf>,
    /// Do not draw progress bars.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleConfig {
    #[serde(default)]
    geometry: DramGeometry,
    #[serde(default)]
    simulation: SimulationConfig,
}

fn load_module(args: &CliArgs) -> anyhow::Result<ModuleConfig> {
    let mut module: ModuleConfig = match &args.module {
        Some(path) => {
            let f = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(f))
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => ModuleConfig::default(),
    };
    module.geometry.validate()?;
    if let Some(seed) = args.seed {
        module.simulation.seed = seed;
    }
    Ok(module)
}

fn main() -> anyhow::Result<()> {
    let progress = init_logging_with_progress()?;

    // parse args
    let args = CliArgs::parse();
    let config = CampaignConfig::from_jsonfile(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let module = load_module(&args)?;
    info!("Args: {:?}", args);

    let mut campaign =
        Campaign::new(config, Box::new(RowBankColEncoder::new(module.geometry)))?;
    let mut dram = SimulatedDram::new(module.geometry, module.simulation)?;
    let options = DriveOptions {
        timeout: args.timeout.map(|t| Duration::from_secs(t * 60)),
        progress: (!args.no_progress).then(|| progress.clone()),
    };
    let reason = drive(&mut campaign, &mut dram, options)?;
    info!("Simulated module executed {} passes", dram.passes());
    if reason == StopReason::Timeout {
        warn!(
            "Campaign incomplete, summary covers {} iterations",
            campaign.iteration()
        );
    }

    println!("{}", campaign.render_summary());

    if let Some(dir) = args.results.clone() {
        // persist results to disk and exit
        let now = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        fs::create_dir_all(&dir)?;
        let results_file = dir.join(format!("results_{}.json", now));
        info!("Writing campaign report to file {}.", results_file.display());
        #[derive(Serialize)]
        struct CampaignResult {
            args: CliArgs,
            stop_reason: StopReason,
            report: CampaignReport,
        }
        let res = CampaignResult {
            args,
            stop_reason: reason,
            report: campaign.into_report(),
        };
        let mut json_file = BufWriter::new(File::create(results_file)?);
        serde_json::to_writer_pretty(&mut json_file, &res)?;
        json_file.flush()?;
    }
    Ok(())
}

fn init_logging_with_progress() -> anyhow::Result<MultiProgress> {
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let progress = MultiProgress::new();
    LogWrapper::new(progress.clone(), logger).try_init()?;
    Ok(progress)
}
