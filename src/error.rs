use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("servers must be 1 or 2 (got {0})")]
    InvalidServerCount(usize),
    #[error("engine needs at least one server")]
    NoServers,
    #[error("duration_ticks must be greater than 0")]
    DurationZero,
    #[error("duration_ticks must be at most {max} (got {got})")]
    DurationTooLong { max: u64, got: u64 },
    #[error("maintenance interval for server {server} must be > 0")]
    InvalidMaintenanceInterval { server: usize },
    #[error("expected {expected} maintenance intervals, got {got}")]
    MaintenanceIntervalCount { expected: usize, got: usize },
    #[error("maintenance duration must be > 0")]
    MaintenanceDurationZero,
    #[error("sample count must be greater than 0")]
    SampleCountZero,
    #[error("sample count must be at most {max} (got {got})")]
    SampleCountTooLarge { max: usize, got: usize },
    #[error("exponential mean must be finite and > 0 (got {0})")]
    InvalidMean(f64),
    #[error("normal mean must be finite (got {0})")]
    InvalidNormalMean(f64),
    #[error("standard deviation must be finite and >= 0 (got {0})")]
    InvalidStdDev(f64),
    #[error("invalid process '{0}': expected exp:mean or normal:mean:std_dev")]
    InvalidProcess(String),
    #[error("arrival instants exhausted at tick {tick} ({len} supplied)")]
    ArrivalsExhausted { tick: u64, len: usize },
    #[error("service durations exhausted at tick {tick} ({len} supplied)")]
    ServiceExhausted { tick: u64, len: usize },
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
    #[error("failed to render output: {0}")]
    Output(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Invalid static parameters, detected before the first tick.
    Configuration,
    /// An input stream ran out mid-run.
    Exhaustion,
    /// CLI, config-file or output problems.
    Usage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ArrivalsExhausted { .. } | Error::ServiceExhausted { .. } => {
                ErrorKind::Exhaustion
            }
            Error::ConfigIo(_)
            | Error::ConfigParse(_)
            | Error::UnsupportedConfigFormat(_)
            | Error::Cli(_)
            | Error::Output(_) => ErrorKind::Usage,
            _ => ErrorKind::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
