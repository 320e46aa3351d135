use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use healthcast::{RunOptions, ScenarioSelection, init_logging, run};

#[derive(Parser, Debug)]
#[command(name = "healthcast")]
#[command(about = "Monte Carlo forecast of client health metrics")]
struct Args {
    /// Path to the assumptions document (JSON, or YAML by extension)
    #[arg(short, long, default_value = "mc_assumptions.json")]
    config: PathBuf,

    /// Override the intake workbook path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override the number of simulations per client
    #[arg(long)]
    n_sim: Option<u32>,

    /// Run seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Scenarios to run
    #[arg(long, value_enum, default_value_t = ScenarioArg::Both)]
    scenario: ScenarioArg,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenarioArg {
    Both,
    Decline,
    Improvement,
}

impl From<ScenarioArg> for ScenarioSelection {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Both => ScenarioSelection::Both,
            ScenarioArg::Decline => ScenarioSelection::Decline,
            ScenarioArg::Improvement => ScenarioSelection::Improvement,
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level, args.log_file.as_deref())?;

    let options = RunOptions {
        config: args.config,
        input: args.input,
        output_dir: args.output_dir,
        n_sim: args.n_sim,
        seed: args.seed,
        scenarios: args.scenario.into(),
    };

    let start = Instant::now();
    let summaries = run(&options)?;

    println!("Done in {:.1}s", start.elapsed().as_secs_f64());
    for summary in &summaries {
        println!(
            "{} output: {} ({} clients, {} sanity findings)",
            summary.scenario,
            summary.output.display(),
            summary.clients,
            summary.sanity_findings
        );
    }

    tracing::info!("healthcast finished");
    Ok(())
}
