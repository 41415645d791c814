use std::io::IsTerminal;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use queue_sim::config::{self, Command, FormatArg, GenerateArgs};
use queue_sim::engine;
use queue_sim::error::Result;
use queue_sim::generator;
use queue_sim::models::DistributionConfig;
use queue_sim::output::{CsvFormatter, Formatter, HumanFormatter, JsonFormatter, SummaryFormatter};
use queue_sim::totalizer;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = config::parse_args()?;
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Run(args) => {
            let (config, format) = config::build_config(args)?;
            let result = engine::run_simulation(&config)?;
            let output = formatter_for(&format).write(&result)?;
            print!("{}", output);
        }
        Command::Generate(args) => generate(args)?,
    }

    Ok(())
}

fn generate(args: GenerateArgs) -> Result<()> {
    let distribution = DistributionConfig::parse(&args.process)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut values = generator::generate(
        &mut rng,
        args.count,
        &distribution,
        args.negative_samples.into(),
    )?;
    if args.totalize {
        values = totalizer::totalize(&values);
    }
    for value in values {
        println!("{}", value);
    }
    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
}

fn formatter_for(format: &FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Csv => Box::new(CsvFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
    }
}
