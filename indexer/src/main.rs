use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ics_core::pipeline::{build_inverted_index, generate_report};
use ics_core::{EngineConfig, RunMode};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build an on-disk inverted index from crawled HTML records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Analyst,
    Developer,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Analyst => RunMode::Analyst,
            Mode::Developer => RunMode::Developer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, flush partial indexes, merge, report
    Build {
        /// Dataset root directory holding crawl records (*.json)
        #[arg(long)]
        dataset: PathBuf,
        /// Directory where index artifacts are written
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Project flavor; developer enforces the minimum partial flush count
        #[arg(long, value_enum, default_value_t = Mode::Analyst)]
        mode: Mode,
        /// Documents per partial index before a flush
        #[arg(long, default_value_t = 1500)]
        partial_flush_docs: usize,
        /// Minimum number of partial indexes in developer mode
        #[arg(long, default_value_t = 3)]
        min_partial_flushes: usize,
        /// Also flush once this many postings are held in memory
        #[arg(long)]
        max_resident_postings: Option<usize>,
        /// Regex matching a single token
        #[arg(long, default_value = "[A-Za-z0-9]+")]
        token_regex: String,
        #[arg(long, default_value_t = 3.0)]
        title_boost: f32,
        #[arg(long, default_value_t = 2.0)]
        heading_boost: f32,
        #[arg(long, default_value_t = 1.5)]
        bold_boost: f32,
    },
    /// Recompute analytics from an existing index
    Report {
        /// Directory where index artifacts are stored
        #[arg(long, default_value = "output")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            dataset,
            output,
            mode,
            partial_flush_docs,
            min_partial_flushes,
            max_resident_postings,
            token_regex,
            title_boost,
            heading_boost,
            bold_boost,
        } => {
            let mut config = EngineConfig::new(dataset, output, mode.into());
            config.partial_flush_docs = partial_flush_docs;
            config.min_partial_flushes = min_partial_flushes;
            config.max_resident_postings = max_resident_postings;
            config.token_regex = token_regex;
            config.title_boost = title_boost;
            config.heading_boost = heading_boost;
            config.bold_boost = bold_boost;

            let summary = build_inverted_index(&config)?;
            tracing::info!(
                documents = summary.documents,
                skipped = summary.skipped,
                partials = summary.partials,
                terms = summary.terms,
                "build finished"
            );
            println!("{}", serde_json::to_string_pretty(&summary.analytics)?);
            Ok(())
        }
        Commands::Report { output } => {
            let analytics = generate_report(&output)?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
            Ok(())
        }
    }
}
