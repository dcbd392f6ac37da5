// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Quarry entry point - CLI and MCP server startup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use quarry::config::{self, ServerConfig};
use quarry::error::ToolError;
use quarry::indexer::IndexOptions;
use quarry::server::McpServer;
use quarry::store::{scroll_all, Filter, VectorStore};
use quarry::telemetry::{init_telemetry, TelemetryConfig};
use quarry::QuarryService;

const EXIT_OK: i32 = 0;
const EXIT_OTHER: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_STORE: i32 = 3;
const EXIT_PARTIAL: i32 = 4;

/// Quarry - retrieval-augmented documentation and code search.
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about = "Grounded answers from your repository", long_about = None)]
struct Cli {
    /// Config file path; discovery and MCP_CONFIG_FILE apply otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index docs and code into the vector store
    Index {
        /// Only the doc globs
        #[arg(long)]
        docs: bool,
        /// Only the code globs
        #[arg(long)]
        code: bool,
        /// Target the cloud collection
        #[arg(long, conflicts_with = "local")]
        cloud: bool,
        /// Target the local collection
        #[arg(long)]
        local: bool,
        /// Sweep for files that left the configured globs
        #[arg(long)]
        cleanup: bool,
        /// Report the sweep without applying it (the default)
        #[arg(long, conflicts_with = "prune")]
        dry_run: bool,
        /// Apply the sweep: soft-delete orphaned files' chunks
        #[arg(long)]
        prune: bool,
    },

    /// Show point counts per collection
    Stats,

    /// Clear the soft-delete flag
    Recover {
        /// Recover every soft-deleted chunk
        #[arg(long, conflicts_with = "file")]
        all: bool,
        /// Recover one file's chunks
        #[arg(long)]
        file: Option<String>,
        #[arg(long, conflicts_with = "local")]
        cloud: bool,
        #[arg(long)]
        local: bool,
    },

    /// Physically remove soft-deleted chunks
    Delete {
        /// List what would be removed (the default)
        #[arg(long, conflicts_with = "confirm")]
        preview: bool,
        /// Actually remove; irreversible
        #[arg(long)]
        confirm: bool,
        #[arg(long, conflicts_with = "local")]
        cloud: bool,
        #[arg(long)]
        local: bool,
    },

    /// Remove every point from a collection
    Clean {
        /// Required; the operation is irreversible
        #[arg(long)]
        confirm: bool,
        #[arg(long, conflicts_with = "local")]
        cloud: bool,
        #[arg(long)]
        local: bool,
    },

    /// Run the MCP server on stdio
    Start,

    /// Write an example config file
    Setup,
}

fn target_flag(cloud: bool, local: bool) -> Option<&'static str> {
    if cloud {
        Some("cloud")
    } else if local {
        Some("local")
    } else {
        None
    }
}

fn exit_code_for(err: &ToolError) -> i32 {
    match err {
        ToolError::Store(_) => EXIT_STORE,
        ToolError::Index(quarry::IndexError::Store(_)) => EXIT_STORE,
        _ => EXIT_OTHER,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let telemetry = match cli.command {
        Commands::Start => TelemetryConfig::server(),
        _ => TelemetryConfig::default(),
    };
    init_telemetry(&telemetry);

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    if let Commands::Setup = cli.command {
        return run_setup();
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "config error:".red(), err);
            return EXIT_CONFIG;
        }
    };

    let service = match QuarryService::new(config).await {
        Ok(service) => Arc::new(service),
        Err(err) => {
            eprintln!("{} {}", "startup error:".red(), err);
            return EXIT_OTHER;
        }
    };

    match cli.command {
        Commands::Index {
            docs,
            code,
            cloud,
            local,
            cleanup,
            dry_run: _,
            prune,
        } => run_index(&service, docs, code, target_flag(cloud, local), cleanup, prune).await,
        Commands::Stats => run_stats(&service).await,
        Commands::Recover {
            all,
            file,
            cloud,
            local,
        } => run_recover(&service, all, file, target_flag(cloud, local)).await,
        Commands::Delete {
            preview: _,
            confirm,
            cloud,
            local,
        } => run_delete(&service, confirm, target_flag(cloud, local)).await,
        Commands::Clean {
            confirm,
            cloud,
            local,
        } => run_clean(&service, confirm, target_flag(cloud, local)).await,
        Commands::Start => run_start(service).await,
        Commands::Setup => unreachable!("handled above"),
    }
}

fn load_config(explicit: Option<&std::path::Path>) -> Result<ServerConfig, quarry::ConfigError> {
    match explicit {
        Some(path) => config::load_config_file(path),
        None => {
            let cwd = std::env::current_dir().map_err(quarry::ConfigError::from)?;
            config::load_config(&cwd)
        }
    }
}

fn run_setup() -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("{} {}", "error:".red(), err);
            return EXIT_OTHER;
        }
    };
    match config::write_example_config(&cwd) {
        Ok(path) => {
            println!("Created config file: {}", path.display());
            println!("Edit the Qdrant endpoint and glob patterns, then run `quarry index`.");
            EXIT_OK
        }
        Err(err) => {
            eprintln!("{} {}", "error:".red(), err);
            EXIT_OTHER
        }
    }
}

async fn run_index(
    service: &QuarryService,
    docs: bool,
    code: bool,
    target: Option<&str>,
    cleanup: bool,
    prune: bool,
) -> i32 {
    // no selector means both
    let (docs, code) = if docs || code {
        (docs, code)
    } else {
        (true, true)
    };
    let options = IndexOptions {
        docs,
        code,
        cleanup,
        prune,
    };

    match service.index(target, options).await {
        Ok(report) => {
            println!(
                "{} {} files, {} upserted, {} unchanged, {} recovered, {} soft-deleted ({} ms)",
                "indexed".green(),
                report.files_seen,
                report.chunks_upserted,
                report.chunks_unchanged,
                report.chunks_recovered,
                report.chunks_soft_deleted,
                report.duration_ms
            );
            if cleanup {
                let mode = if report.pruned {
                    "applied".yellow()
                } else {
                    "dry run".cyan()
                };
                println!(
                    "{} orphan sweep: {} files / {} chunks ({})",
                    "cleanup".green(),
                    report.orphaned_files,
                    report.orphaned_chunks,
                    mode
                );
            }
            if report.files_errored > 0 {
                eprintln!(
                    "{} {} files failed; see warnings above",
                    "partial:".yellow(),
                    report.files_errored
                );
                return EXIT_PARTIAL;
            }
            EXIT_OK
        }
        Err(err) => {
            eprintln!("{} {}", "index error:".red(), err);
            exit_code_for(&err)
        }
    }
}

async fn run_stats(service: &QuarryService) -> i32 {
    for store in service.stores() {
        match store.stats().await {
            Ok(stats) => {
                println!(
                    "{} ({}): active={} deleted={} total={}",
                    store.name().bright_white(),
                    store.collection(),
                    stats.active,
                    stats.deleted,
                    stats.total()
                );
            }
            Err(err) => {
                eprintln!("{} {}: {}", "store error:".red(), store.name(), err);
                return EXIT_STORE;
            }
        }
    }
    EXIT_OK
}

async fn run_recover(
    service: &QuarryService,
    all: bool,
    file: Option<String>,
    target: Option<&str>,
) -> i32 {
    let filter = match (&file, all) {
        (Some(path), _) => Filter::file(quarry::normalize_path(path)),
        (None, true) => Filter::any(),
        (None, false) => {
            eprintln!("{} pass --all or --file P", "error:".red());
            return EXIT_OTHER;
        }
    };

    let store = match service.store_for(target) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{} {}", "error:".red(), err);
            return EXIT_OTHER;
        }
    };

    match store.recover(&filter).await {
        Ok(recovered) => {
            service.collection_changed().await;
            println!("{} {} chunks", "recovered".green(), recovered);
            EXIT_OK
        }
        Err(err) => {
            eprintln!("{} {}", "store error:".red(), err);
            EXIT_STORE
        }
    }
}

async fn run_delete(service: &QuarryService, confirm: bool, target: Option<&str>) -> i32 {
    let store = match service.store_for(target) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{} {}", "error:".red(), err);
            return EXIT_OTHER;
        }
    };

    let deleted = match scroll_all(store.as_ref(), &Filter::deleted()).await {
        Ok(points) => points,
        Err(err) => {
            eprintln!("{} {}", "store error:".red(), err);
            return EXIT_STORE;
        }
    };

    if deleted.is_empty() {
        println!("nothing to purge");
        return EXIT_OK;
    }

    if !confirm {
        println!(
            "{} {} soft-deleted chunks would be removed:",
            "preview".cyan(),
            deleted.len()
        );
        for point in deleted.iter().take(20) {
            println!(
                "  {} {}:{}-{}",
                point.id,
                point.payload.file_path,
                point.payload.line_start,
                point.payload.line_end
            );
        }
        if deleted.len() > 20 {
            println!("  ... and {} more", deleted.len() - 20);
        }
        println!("re-run with --confirm to apply; this is irreversible");
        return EXIT_OK;
    }

    let ids: Vec<u64> = deleted.iter().map(|p| p.id).collect();
    match store.delete_by_ids(&ids).await {
        Ok(removed) => {
            service.collection_changed().await;
            println!("{} {} chunks", "purged".yellow(), removed);
            EXIT_OK
        }
        Err(err) => {
            eprintln!("{} {}", "store error:".red(), err);
            EXIT_STORE
        }
    }
}

async fn run_clean(service: &QuarryService, confirm: bool, target: Option<&str>) -> i32 {
    if !confirm {
        eprintln!(
            "{} clean removes every point in the collection; pass --confirm",
            "error:".red()
        );
        return EXIT_OTHER;
    }

    let store = match service.store_for(target) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{} {}", "error:".red(), err);
            return EXIT_OTHER;
        }
    };

    let points = match scroll_all(store.as_ref(), &Filter::any()).await {
        Ok(points) => points,
        Err(err) => {
            eprintln!("{} {}", "store error:".red(), err);
            return EXIT_STORE;
        }
    };
    let ids: Vec<u64> = points.iter().map(|p| p.id).collect();

    match store.delete_by_ids(&ids).await {
        Ok(removed) => {
            service.collection_changed().await;
            println!("{} {} chunks", "removed".yellow(), removed);
            EXIT_OK
        }
        Err(err) => {
            eprintln!("{} {}", "store error:".red(), err);
            EXIT_STORE
        }
    }
}

async fn run_start(service: Arc<QuarryService>) -> i32 {
    if let Err(err) = service.startup().await {
        eprintln!("{} {}", "startup error:".red(), err);
        return EXIT_STORE;
    }

    let server = McpServer::new(service);
    match server.run().await {
        Ok(()) => EXIT_OK,
        Err(err) => {
            eprintln!("{} {}", "server error:".red(), err);
            EXIT_OTHER
        }
    }
}
