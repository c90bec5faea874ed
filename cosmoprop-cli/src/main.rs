use clap::{Parser, Subcommand};
use cosmoprop_core::diagnostics::{format_diagnostic, format_parse_error};
use cosmoprop_core::output::{OutputSink, TextSink};
use cosmoprop_core::physics_data::{PhysicsData, TabulatedPhysics};
use cosmoprop_core::{analyze_config, build_simulation, parse_script, RunSummary};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cosmoprop")]
#[command(about = "Cosmological particle propagation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a propagation script
    Run {
        /// Path to the run script
        file: PathBuf,
        /// JSON file with interaction rates, spectra and decay data
        #[arg(long)]
        tables: Option<PathBuf>,
        /// Write records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override the script's thread count
        #[arg(long)]
        threads: Option<usize>,
        /// Override the script's seed
        #[arg(long)]
        seed: Option<u64>,
        /// Log progress every tenth of the run
        #[arg(long)]
        progress: bool,
    },
    /// Parse and check a script without running it
    Check {
        file: PathBuf,
    },
    /// Print the parsed configuration as JSON
    Config {
        file: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            tables,
            output,
            threads,
            seed,
            progress,
        } => run_file(&file, tables.as_deref(), output.as_deref(), threads, seed, progress),
        Commands::Check { file } => check_file(&file),
        Commands::Config { file } => print_config(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_file(file: &Path) -> Result<(String, cosmoprop_core::RunConfig), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(file)?;
    match parse_script(&source) {
        Ok(config) => Ok((source, config)),
        Err(e) => Err(format_parse_error(&e, &source).into()),
    }
}

fn load_physics(tables: Option<&Path>) -> Result<Arc<dyn PhysicsData>, Box<dyn std::error::Error>> {
    let physics = match tables {
        Some(path) => TabulatedPhysics::from_json(&fs::read_to_string(path)?)?,
        None => {
            log::warn!("no physics tables given; only built-in decay data is available");
            TabulatedPhysics::new()
        }
    };
    Ok(Arc::new(physics))
}

fn run_file(
    file: &Path,
    tables: Option<&Path>,
    output: Option<&Path>,
    threads: Option<usize>,
    seed: Option<u64>,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (source, config) = parse_file(file)?;
    for warning in analyze_config(&config).warnings() {
        log::warn!("{}", format_diagnostic(warning, &source));
    }

    let columns = config.output;
    let simulation = build_simulation(config, load_physics(tables)?)?;
    let mut options = simulation.config.run_options();
    options.show_progress = progress;
    if let Some(threads) = threads {
        options.threads = threads;
    }
    if let Some(seed) = seed {
        options.seed = seed;
    }

    let summary = match output {
        Some(path) => {
            let mut sink = TextSink::create(path, columns)?;
            let summary = simulation.run_with(&mut sink, &options)?;
            sink.close()?;
            summary
        }
        None => {
            let mut sink = TextSink::new(std::io::stdout(), columns);
            let summary = simulation.run_with(&mut sink, &options)?;
            sink.close()?;
            summary
        }
    };
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    eprintln!(
        "{} primaries, {} records (total weight {:.3}), {} secondaries, {} thinned{}",
        summary.emitted,
        summary.observed,
        summary.total_weight,
        summary.secondaries,
        summary.thinned,
        if summary.cancelled { " [cancelled]" } else { "" }
    );
}

fn check_file(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (source, config) = parse_file(file)?;
    let diagnostics = analyze_config(&config);
    for diagnostic in diagnostics.iter() {
        eprintln!("{}", format_diagnostic(diagnostic, &source));
    }
    if diagnostics.has_errors() {
        return Err(format!("{} error(s) in {}", diagnostics.errors().count(), file.display()).into());
    }
    println!("{}: ok", file.display());
    Ok(())
}

fn print_config(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (_, config) = parse_file(file)?;
    println!("{}", config.to_json()?);
    Ok(())
}
