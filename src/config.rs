use clap::error::ErrorKind as ClapErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{
    ArrivalExhaustion, DistributionConfig, MaintenanceConfig, MaintenancePolicy, NegativeSamples,
    ProcessConfig, SimConfig,
};

const DEFAULT_DURATION_TICKS: u64 = 28_800;

#[derive(Parser, Debug)]
#[command(name = "queue-sim", about = "Tick-based queue simulation with scheduled maintenance")]
pub struct Cli {
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation from a config file and/or flags.
    Run(RunArgs),
    /// Print a generated sample stream, one value per line.
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub duration: Option<u64>,
    #[arg(long)]
    pub servers: Option<usize>,
    #[arg(long, help = "Inter-arrival process: exp:MEAN or normal:MEAN:STD_DEV")]
    pub arrivals: Option<String>,
    #[arg(long, help = "Service-duration process: exp:MEAN or normal:MEAN:STD_DEV")]
    pub service: Option<String>,
    #[arg(long = "maintenance-interval", help = "Repeat once per server")]
    pub maintenance_intervals: Vec<u64>,
    #[arg(long)]
    pub maintenance_duration: Option<u64>,
    #[arg(long, value_enum)]
    pub maintenance_policy: Option<PolicyArg>,
    #[arg(long, value_enum)]
    pub negative_samples: Option<NegativeArg>,
    #[arg(long, help = "Fail instead of closing the arrival stream when it runs out")]
    pub strict_arrivals: bool,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_enum, default_value = "human")]
    pub format: FormatArg,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(long)]
    pub process: String,
    #[arg(long)]
    pub count: usize,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, help = "Print running totals instead of raw durations")]
    pub totalize: bool,
    #[arg(long, value_enum, default_value = "clamp")]
    pub negative_samples: NegativeArg,
}

#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    #[default]
    Human,
    Summary,
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    Overlap,
    Interrupt,
    Defer,
}

impl From<PolicyArg> for MaintenancePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Overlap => MaintenancePolicy::Overlap,
            PolicyArg::Interrupt => MaintenancePolicy::Interrupt,
            PolicyArg::Defer => MaintenancePolicy::Defer,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum NegativeArg {
    Clamp,
    Preserve,
}

impl From<NegativeArg> for NegativeSamples {
    fn from(value: NegativeArg) -> Self {
        match value {
            NegativeArg::Clamp => NegativeSamples::Clamp,
            NegativeArg::Preserve => NegativeSamples::Preserve,
        }
    }
}

pub fn parse_args() -> Result<Cli> {
    Cli::try_parse().map_err(|e| match e.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => e.exit(),
        _ => Error::Cli(e.to_string()),
    })
}

/// Merges flags over an optional config file. Flags win.
pub fn build_config(args: RunArgs) -> Result<(SimConfig, FormatArg)> {
    let file_config = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };

    let arrivals = args
        .arrivals
        .as_deref()
        .map(DistributionConfig::parse)
        .transpose()?;
    let service = args
        .service
        .as_deref()
        .map(DistributionConfig::parse)
        .transpose()?;

    let mut config = match file_config {
        Some(mut config) => {
            if let Some(distribution) = arrivals {
                config.arrivals.distribution = distribution;
            }
            if let Some(distribution) = service {
                config.service.distribution = distribution;
            }
            config
        }
        None => {
            let arrivals = arrivals.ok_or_else(|| missing_flag("--arrivals"))?;
            let service = service.ok_or_else(|| missing_flag("--service"))?;
            SimConfig {
                duration_ticks: DEFAULT_DURATION_TICKS,
                servers: 1,
                arrivals: ProcessConfig::new(arrivals),
                service: ProcessConfig::new(service),
                maintenance: MaintenanceConfig::default(),
                arrival_exhaustion: ArrivalExhaustion::default(),
                seed: None,
                breakdowns: Vec::new(),
                initial_queue: 0,
            }
        }
    };

    if let Some(duration) = args.duration {
        config.duration_ticks = duration;
    }
    if let Some(servers) = args.servers {
        config.servers = servers;
    }
    if !args.maintenance_intervals.is_empty() {
        config.maintenance.intervals = args.maintenance_intervals.clone();
        if config.maintenance.intervals.len() == 1 && config.servers == 2 {
            let interval = config.maintenance.intervals[0];
            config.maintenance.intervals.push(interval);
        }
    }
    if let Some(duration) = args.maintenance_duration {
        config.maintenance.duration = duration;
    }
    if let Some(policy) = args.maintenance_policy {
        config.maintenance.policy = policy.into();
    }
    if let Some(negatives) = args.negative_samples {
        config.arrivals.negative_samples = negatives.into();
        config.service.negative_samples = negatives.into();
    }
    if args.strict_arrivals {
        config.arrival_exhaustion = ArrivalExhaustion::Fail;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok((config, args.format))
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}

fn missing_flag(flag: &str) -> Error {
    Error::Cli(format!("{} is required when no --config is given", flag))
}
