use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Phase offset applied to the second server's maintenance rule.
pub const MAINTENANCE_STAGGER_TICKS: u64 = 3600;

/// Upper bound on the simulated horizon; every per-tick series is this long.
pub const MAX_DURATION_TICKS: u64 = 10_000_000;

/// Upper bound on a generated stream.
pub const MAX_SAMPLES: usize = 10_000_000;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimConfig {
    pub duration_ticks: u64,
    #[serde(default = "default_servers")]
    pub servers: usize,
    pub arrivals: ProcessConfig,
    pub service: ProcessConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub arrival_exhaustion: ArrivalExhaustion,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Accepted for compatibility; never applied to the run.
    #[serde(default)]
    pub breakdowns: Vec<u64>,
    /// Accepted for compatibility; the queue always starts empty.
    #[serde(default)]
    pub initial_queue: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProcessConfig {
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub negative_samples: NegativeSamples,
}

impl ProcessConfig {
    pub fn new(distribution: DistributionConfig) -> Self {
        Self {
            distribution,
            count: None,
            negative_samples: NegativeSamples::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DistributionConfig {
    Exponential { mean: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl DistributionConfig {
    /// Parses `exp:MEAN` or `normal:MEAN:STD_DEV`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || Error::InvalidProcess(trimmed.to_string());
        let mut parts = trimmed.split(':').map(str::trim);
        let kind = parts.next().unwrap_or("");
        let mut number = || -> Result<f64> {
            parts
                .next()
                .filter(|value| !value.is_empty())
                .ok_or_else(invalid)?
                .parse::<f64>()
                .map_err(|_| invalid())
        };

        let parsed = match kind {
            "exp" | "exponential" => DistributionConfig::Exponential { mean: number()? },
            "normal" => {
                let mean = number()?;
                let std_dev = number()?;
                DistributionConfig::Normal { mean, std_dev }
            }
            _ => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            DistributionConfig::Exponential { mean } => {
                if !mean.is_finite() || mean <= 0.0 {
                    return Err(Error::InvalidMean(mean));
                }
            }
            DistributionConfig::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return Err(Error::InvalidNormalMean(mean));
                }
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(Error::InvalidStdDev(std_dev));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for DistributionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionConfig::Exponential { mean } => write!(f, "exp:{}", mean),
            DistributionConfig::Normal { mean, std_dev } => {
                write!(f, "normal:{}:{}", mean, std_dev)
            }
        }
    }
}

/// What to do with samples that round to a negative integer.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum NegativeSamples {
    #[default]
    Clamp,
    Preserve,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_intervals")]
    pub intervals: Vec<u64>,
    #[serde(default = "default_maintenance_duration")]
    pub duration: u64,
    #[serde(default = "default_stagger")]
    pub stagger: u64,
    #[serde(default)]
    pub policy: MaintenancePolicy,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            intervals: default_intervals(),
            duration: default_maintenance_duration(),
            stagger: default_stagger(),
            policy: MaintenancePolicy::default(),
        }
    }
}

impl MaintenanceConfig {
    /// One rule per server; server `i` is phased by `i * stagger`.
    pub fn rules(&self, servers: usize) -> Vec<MaintenanceRule> {
        self.intervals
            .iter()
            .take(servers)
            .enumerate()
            .map(|(idx, &interval)| MaintenanceRule {
                interval,
                phase: self.stagger * idx as u64,
            })
            .collect()
    }
}

/// Fires on every tick where `tick % interval == phase`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct MaintenanceRule {
    pub interval: u64,
    pub phase: u64,
}

impl MaintenanceRule {
    pub fn triggers_at(&self, tick: u64) -> bool {
        self.interval > 0 && tick % self.interval == self.phase
    }

    pub fn can_trigger(&self) -> bool {
        self.phase < self.interval
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenancePolicy {
    /// Maintenance starts at once; a customer in service still completes.
    #[default]
    Overlap,
    /// Maintenance starts at once and drops the customer in service.
    Interrupt,
    /// Maintenance waits until the server is idle.
    Defer,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ArrivalExhaustion {
    /// A consumed stream means no further arrivals.
    #[default]
    Close,
    /// Running out of arrival instants before the horizon is an error.
    Fail,
}

impl fmt::Display for MaintenancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MaintenancePolicy::Overlap => "overlap",
            MaintenancePolicy::Interrupt => "interrupt",
            MaintenancePolicy::Defer => "defer",
        };
        write!(f, "{}", label)
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.duration_ticks == 0 {
            return Err(Error::DurationZero);
        }
        if self.duration_ticks > MAX_DURATION_TICKS {
            return Err(Error::DurationTooLong {
                max: MAX_DURATION_TICKS,
                got: self.duration_ticks,
            });
        }
        if !(1..=2).contains(&self.servers) {
            return Err(Error::InvalidServerCount(self.servers));
        }
        if self.maintenance.intervals.len() < self.servers {
            return Err(Error::MaintenanceIntervalCount {
                expected: self.servers,
                got: self.maintenance.intervals.len(),
            });
        }
        for (idx, interval) in self.maintenance.intervals.iter().enumerate() {
            if *interval == 0 {
                return Err(Error::InvalidMaintenanceInterval { server: idx + 1 });
            }
        }
        if self.maintenance.duration == 0 {
            return Err(Error::MaintenanceDurationZero);
        }
        for process in [&self.arrivals, &self.service] {
            process.distribution.validate()?;
            match process.count {
                Some(0) => return Err(Error::SampleCountZero),
                Some(count) if count > MAX_SAMPLES => {
                    return Err(Error::SampleCountTooLarge {
                        max: MAX_SAMPLES,
                        got: count,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn default_servers() -> usize {
    1
}

fn default_intervals() -> Vec<u64> {
    vec![14_400, 14_400]
}

fn default_maintenance_duration() -> u64 {
    1_800
}

fn default_stagger() -> u64 {
    MAINTENANCE_STAGGER_TICKS
}
