//! Command-line interface for the approach clustering pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::StopCondition;
use crate::core::context::{RunContext, DEFAULT_LOG_TARGET};
use crate::core::loaders::{load_flight_csv, FlightTable};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "approach-clustering")]
#[command(about = "Cluster flight trajectories approaching an airport", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write log records to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the DBSCAN radius over approaching flights and plot every step
    Cluster {
        /// Flight position CSV
        input_path: PathBuf,
        /// Destination airport code
        #[arg(short, long)]
        airport_code: Option<String>,
        /// Output directory for PNG files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Maximum number of flights in the distance matrix
        #[arg(long)]
        max_flights: Option<usize>,
        /// Step size as a fraction of the reference row spread
        #[arg(long)]
        alpha: Option<f64>,
        /// Minimum samples per cluster
        #[arg(long)]
        min_samples: Option<usize>,
        /// Stop once exactly this many distinct labels appear
        #[arg(long)]
        target_clusters: Option<usize>,
    },

    /// Plot the traffic density heat-map of approaching flights (PNG)
    Density {
        /// Flight position CSV
        input_path: PathBuf,
        /// Destination airport code
        #[arg(short, long)]
        airport_code: Option<String>,
        /// Output directory for the PNG file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List origin and destination airports with their row counts
    Airports {
        /// Flight position CSV
        input_path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Logger for the given verbosity. Without `-v`, run-scoped records (table
/// preview, flight counts, per-step labels, final labeling) are still kept at
/// Info while everything else stays at Warn.
fn logging_builder(verbose: u8, log_file: Option<&Path>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs();
    if verbose == 0 {
        builder.filter_module(DEFAULT_LOG_TARGET, log::LevelFilter::Info);
    }

    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}, logging to stderr", path.display(), e),
        }
    }

    builder
}

fn init_logging(verbose: u8, log_file: Option<&Path>) {
    logging_builder(verbose, log_file).init();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    init_logging(cli.verbose, cli.log_file.as_deref());

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Cluster {
            input_path,
            airport_code,
            output_dir,
            max_flights,
            alpha,
            min_samples,
            target_clusters,
        } => {
            let mut config = config;
            if let Some(code) = airport_code {
                config.filter.airport_code = code;
            }
            if let Some(dir) = output_dir {
                config.plot.output_dir = dir;
            }
            if let Some(n) = max_flights {
                config.encoding.max_flights = n;
            }
            if let Some(a) = alpha {
                config.sweep.alpha = a;
            }
            if let Some(k) = min_samples {
                config.sweep.min_samples = k;
            }
            if let Some(t) = target_clusters {
                config.sweep.stop = StopCondition::Exact(t);
            }
            cmd_cluster(&input_path, &config);
        }
        Commands::Density {
            input_path,
            airport_code,
            output_dir,
        } => {
            let mut config = config;
            if let Some(code) = airport_code {
                config.filter.airport_code = code;
            }
            if let Some(dir) = output_dir {
                config.plot.output_dir = dir;
            }
            cmd_density(&input_path, &config);
        }
        Commands::Airports { input_path } => {
            cmd_airports(&input_path);
        }
    }
}

/// Load the input table behind a spinner, exiting on failure.
fn load_table(input_path: &Path) -> FlightTable {
    let spinner = create_spinner("Loading flight CSV...");
    match load_flight_csv(input_path) {
        Ok(table) => {
            spinner.finish_and_clear();
            table
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load {}: {}", input_path.display(), e);
            std::process::exit(1);
        }
    }
}

fn cmd_cluster(input_path: &Path, config: &PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();
    let ctx = RunContext::new(&config.plot.output_dir);

    println!("Running approach clustering...");
    println!("Input: {}", input_path.display());
    println!("Output directory: {}", ctx.output_dir().display());
    println!("Parameters:");
    println!("  airport_code: {}", config.filter.airport_code);
    println!("  max_flights: {}", config.encoding.max_flights);
    println!("  alpha: {}", config.sweep.alpha);
    println!("  min_samples: {}", config.sweep.min_samples);
    println!("  stop: {:?}", config.sweep.stop);

    let table = load_table(input_path);

    let spinner = create_spinner("Building distance matrix...");
    let result = pipeline::run_pipeline_with_progress(&table, config, &ctx, |done, total| {
        spinner.set_message(format!("Building distance matrix ({}/{} rows)...", done, total));
    });
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            let outcome = &report.outcome;
            let groups: Vec<String> = report
                .flight_groups
                .iter()
                .map(|(label, ids)| format!("{}:{}", label, ids.len()))
                .collect();

            print_summary(
                "Clustering Complete",
                &[
                    ("Input file", input_path.display().to_string()),
                    ("Run id", report.run_id.clone()),
                    ("Rows selected", format!("{} of {}", report.rows_selected, report.rows_loaded)),
                    ("Flights clustered", report.flights_clustered.to_string()),
                    ("Sweep steps", outcome.steps.len().to_string()),
                    ("Final radius", format!("{:.6}", outcome.final_radius)),
                    ("Distinct labels", outcome.labeling.cluster_count().to_string()),
                    ("Label sizes", groups.join(" ")),
                    ("Stop reason", format!("{:?}", outcome.stop_reason)),
                    ("Plots written", report.cluster_plots.len().to_string()),
                    ("Plot failures", outcome.observer_failures.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Clustering failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_density(input_path: &Path, config: &PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();
    let ctx = RunContext::new(&config.plot.output_dir);

    println!("Plotting traffic density...");
    println!("Input: {}", input_path.display());
    println!("Output directory: {}", ctx.output_dir().display());

    let table = load_table(input_path);

    let spinner = create_spinner("Rendering density heat-map...");
    let result = pipeline::select_flights(&table, config, &ctx)
        .and_then(|selected| pipeline::render_density(&selected, &config.plot, &ctx).map(|p| (selected.len(), p)));
    spinner.finish_and_clear();

    match result {
        Ok((rows, path)) => {
            print_summary(
                "Density Plot Complete",
                &[
                    ("Input file", input_path.display().to_string()),
                    ("Airport", config.filter.airport_code.clone()),
                    ("Rows plotted", rows.to_string()),
                    ("Output PNG", path.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Density plot failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_airports(input_path: &Path) {
    let start = Instant::now();
    let table = load_table(input_path);

    let origins = table.origin_counts();
    let destinations = table.destination_counts();

    println!("Origins:");
    for (code, count) in &origins {
        println!("  {:<8} {}", code, count);
    }
    println!("Destinations:");
    for (code, count) in &destinations {
        println!("  {:<8} {}", code, count);
    }

    print_summary(
        "Airport Listing Complete",
        &[
            ("Input file", input_path.display().to_string()),
            ("Rows", table.len().to_string()),
            ("Flights", table.flight_ids().len().to_string()),
            ("Origins", origins.len().to_string()),
            ("Destinations", destinations.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
