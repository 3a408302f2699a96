//! Vibe CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "vibe")]
#[command(about = "Repository intelligence: code index, boundary checks, cycles and change coupling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the repository and bring the index up to date
    Index,
    /// Re-index a single file (or drop it if it no longer exists)
    IndexFile {
        /// File path, absolute or relative to the root
        path: PathBuf,
    },
    /// Check dependency edges against the configured boundary rules
    Boundaries {
        /// Exit non-zero when any violation is found
        #[arg(long)]
        strict: bool,

        /// Never exit non-zero, even on engine errors
        #[arg(long)]
        best_effort: bool,

        /// Stop after this many violations
        #[arg(long, default_value_t = vibe_analysis::DEFAULT_MAX_VIOLATIONS)]
        max_violations: usize,
    },
    /// Mine commit history for co-change clusters, leaks and hubs
    Coupling {
        /// Override the configured commit limit
        #[arg(long)]
        max_commits: Option<usize>,

        /// Only consider commits after this date (passed to git)
        #[arg(long)]
        since: Option<String>,
    },
    /// Look for a cycle in the project reference graph
    Cycles,
    /// Rank files by fan-in, fan-out, size and symbol count
    Hotspots {
        #[arg(short, long, default_value_t = vibe_analysis::DEFAULT_HOTSPOT_LIMIT)]
        limit: usize,
    },
    /// List the files that depend on a file, directly or transitively
    Impact {
        /// File path, absolute or relative to the root
        path: PathBuf,

        #[arg(short, long, default_value_t = vibe_analysis::DEFAULT_IMPACT_LIMIT)]
        limit: usize,
    },
    /// Full-text search over symbols and file content
    Search {
        query: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Watch the repository and re-index files as they change
    Watch,
    /// Remove the index database
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("vibe={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Vibe v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Repository root: {}", cli.root.display());

    let root = cli.root;
    match cli.command {
        Commands::Index => commands::index(&root),
        Commands::IndexFile { path } => commands::index_file(&root, &path),
        Commands::Boundaries { strict, best_effort, max_violations } => {
            let policy = commands::ExitPolicy::from_flags(strict, best_effort);
            commands::boundaries(&root, policy, max_violations)
        }
        Commands::Coupling { max_commits, since } => commands::coupling(&root, max_commits, since).await,
        Commands::Cycles => commands::cycles(&root),
        Commands::Hotspots { limit } => commands::hotspots(&root, limit),
        Commands::Impact { path, limit } => commands::impact(&root, &path, limit),
        Commands::Search { query, limit } => commands::search(&root, &query, limit),
        Commands::Watch => commands::watch(&root).await,
        Commands::Clear => commands::clear(&root),
        Commands::Version => {
            println!("Vibe v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}
