use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use nbflow_cli::{load_config, load_notebook};
use nbflow_graph::{to_dot, ConverterConfig, CurioSerializer, GraphBuilder, GraphSummary};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nbflow")]
#[command(about = "Convert Jupyter notebooks into Curio dataflow workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a notebook into a Curio dataflow JSON document
    Convert(ConvertArgs),

    /// Print the inferred dependency graph
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Notebook to convert (.ipynb)
    notebook: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Notebook to inspect (.ipynb)
    notebook: PathBuf,

    /// Output format (json lists every cell, dot draws the dataflow without imports)
    #[arg(long, value_enum, default_value_t = InspectFormat::Json)]
    format: InspectFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum InspectFormat {
    Json,
    Dot,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert(args) => run_convert(args, &config)?,
        Commands::Inspect(args) => run_inspect(args, &config)?,
    }

    Ok(())
}

fn build_graph(notebook: &Path, config: &ConverterConfig) -> Result<nbflow_graph::DependencyGraph> {
    log::info!("Analyzing notebook: {}", notebook.display());
    let fragments = load_notebook(notebook)?;
    if fragments.is_empty() {
        log::warn!("No code cells found in {}", notebook.display());
    }

    let mut builder = GraphBuilder::new(config)?;
    Ok(builder.build(&fragments))
}

fn run_convert(args: ConvertArgs, config: &ConverterConfig) -> Result<()> {
    let graph = build_graph(&args.notebook, config)?;
    let document = CurioSerializer::new(config)?.serialize(&graph);

    let json = if args.compact {
        serde_json::to_string(&document)?
    } else {
        serde_json::to_string_pretty(&document)?
    };

    match args.output {
        Some(path) => {
            fs::write(&path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Curio dataflow written to {}", path.display());
        }
        None => write_stdout(&json)?,
    }

    Ok(())
}

fn run_inspect(args: InspectArgs, config: &ConverterConfig) -> Result<()> {
    let graph = build_graph(&args.notebook, config)?;

    let rendered = match args.format {
        InspectFormat::Json => serde_json::to_string_pretty(&GraphSummary::from_graph(&graph))?,
        InspectFormat::Dot => to_dot(&graph.without_imports(), &config.export),
    };
    write_stdout(rendered.trim_end())
}

fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").context("Failed to write to stdout")?;
    Ok(())
}
