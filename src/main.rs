//! Task Bench serial driver - CLI

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use taskbench_serial::graph::{DependenceType, GraphConfig, KernelConfig, KernelKind};
use taskbench_serial::util::{config, logger};
use taskbench_serial::{check_config, run_config, BenchConfig, ExecutionMode, RunReport, NAME, VERSION};

/// Serial reference executor for time-stepped task graphs
#[derive(Parser, Debug)]
#[command(name = "taskbench-serial")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute the configured graphs and print timing
    Run {
        #[command(flatten)]
        graphs: GraphArgs,

        /// Propagate scalars instead of running the verifying kernel
        #[arg(long)]
        scalar: bool,
    },

    /// Validate the configured graphs and describe them without executing
    Check {
        #[command(flatten)]
        graphs: GraphArgs,
    },

    /// Print version information
    Version,
}

/// Graph selection: a config file, or a single graph built from flags.
#[derive(ClapArgs, Debug)]
struct GraphArgs {
    /// TOML file listing the graphs to execute (replaces the graph flags)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of timesteps
    #[arg(long, conflicts_with = "config", default_value_t = 4)]
    steps: i64,

    /// Maximum number of points per timestep
    #[arg(long, conflicts_with = "config", default_value_t = 4)]
    width: i64,

    /// Dependence pattern
    #[arg(long = "type", value_enum, conflicts_with = "config", default_value_t = DependenceType::Trivial)]
    dependence: DependenceType,

    /// Neighbours per point for nearest and spread
    #[arg(long, conflicts_with = "config", default_value_t = 3)]
    radix: i64,

    /// Dependence sets cycled through by spread
    #[arg(long, conflicts_with = "config", default_value_t = 3)]
    period: i64,

    /// Point kernel
    #[arg(long, value_enum, conflicts_with = "config", default_value_t = KernelKind::Empty)]
    kernel: KernelKind,

    /// Kernel iterations
    #[arg(long, conflicts_with = "config", default_value_t = 0)]
    iter: u64,

    /// Output bytes per point
    #[arg(long, conflicts_with = "config", default_value_t = 16)]
    output: usize,

    /// Scratch bytes per point
    #[arg(long, conflicts_with = "config", default_value_t = 0)]
    scratch: usize,

    /// Timestep rows kept resident
    #[arg(long, conflicts_with = "config", default_value_t = 5)]
    fields: i64,
}

impl GraphArgs {
    fn into_config(self) -> Result<BenchConfig> {
        if let Some(path) = self.config {
            return config::load_config(&path)
                .with_context(|| format!("Failed to load config: {}", path.display()));
        }
        Ok(BenchConfig::single(GraphConfig {
            timesteps: self.steps,
            max_width: self.width,
            dependence: self.dependence,
            radix: self.radix,
            period: self.period,
            nb_fields: self.fields,
            output_bytes_per_task: self.output,
            scratch_bytes_per_task: self.scratch,
            kernel: KernelConfig::new(self.kernel, self.iter),
        }))
    }
}

fn print_report(report: &RunReport) {
    let stats = &report.stats;
    println!("Total Tasks {}", stats.total_tasks());
    println!("Total Dependencies {}", stats.total_dependencies());
    println!("Elapsed Time {:.6e} seconds", report.elapsed.as_secs_f64());
    println!("Tasks/s {:.6e}", report.tasks_per_second());
    if !report.is_clean() {
        println!(
            "Diagnostics {} (points skipped {}, dependencies skipped {}, graphs skipped {})",
            report.total_diagnostics(),
            stats.points_skipped,
            stats.dependencies_skipped,
            stats.graphs_skipped
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli(args.verbose);

    match args.command {
        Commands::Run { graphs, scalar } => {
            let mut config = graphs.into_config()?;
            if scalar {
                config.mode = ExecutionMode::Scalar;
            }
            let report = run_config(&config)?;
            print_report(&report);
        }
        Commands::Check { graphs } => {
            let config = graphs.into_config()?;
            for (idx, description) in check_config(&config)?.iter().enumerate() {
                println!("graph {}: {}", idx, description);
            }
            eprintln!("Check passed!");
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
