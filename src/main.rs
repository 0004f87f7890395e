// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use clap::{ArgAction, Parser, Subcommand};
use rag_indexer::utils::logging::{format_error, format_info, format_success, format_warning};
use rag_indexer::{
    Config, CoverageAuditor, GroqEmbeddingClient, IndexError, IndexOrchestrator, LanceDbClient,
    RetryPolicy, SchemaManager, WalScope, read_wal,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rag_indexer")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Resumable, crash-safe RAG indexing pipeline using LanceDB", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or resume the index; unchanged documents are skipped
    Index {
        /// Ignore WAL resume state and re-embed everything
        #[arg(long)]
        force: bool,

        #[arg(long, value_name = "NUM")]
        limit: Option<usize>,
    },

    /// Audit the store against recomputed chunk ids (read-only)
    Coverage,

    /// Show store row counts and WAL resume state
    Stats,

    /// Drop the chunks table and remove the WAL file
    Reset {
        #[arg(long)]
        confirm: bool,
    },

    /// Inspect WAL resume state for the configured scope
    Wal,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    rag_indexer::utils::logging::init_logger(cli.color, cli.verbose);

    info!("RAG Indexer");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        match Config::load(Some(cli.config.as_path())) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}", format_error(&format!("Failed to load configuration: {}", err)));
                return ExitCode::from(2);
            }
        }
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    let result = match cli.command {
        Commands::Index { force, limit } => cmd_index(&config, force, limit).await,
        Commands::Coverage => cmd_coverage(&config).await,
        Commands::Stats => cmd_stats(&config).await,
        Commands::Reset { confirm } => cmd_reset(&config, confirm).await,
        Commands::Wal => cmd_wal(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ (IndexError::Validation(_) | IndexError::Config(_))) => {
            eprintln!("{}", format_error(&err.to_string()));
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("{}", format_error(&err.to_string()));
            ExitCode::from(3)
        }
    }
}

fn build_embedder(config: &Config) -> Arc<GroqEmbeddingClient> {
    Arc::new(GroqEmbeddingClient::new(
        config.database.groq_api_key.clone(),
        config.database.groq_model.clone(),
        config.database.embedding_dim,
        RetryPolicy {
            max_retries: config.pipeline.max_retries,
            backoff: Duration::from_millis(config.pipeline.retry_backoff_ms),
            request_timeout: Duration::from_secs(config.pipeline.request_timeout_secs),
        },
    ))
}

fn wal_scope(config: &Config) -> WalScope {
    WalScope::new(
        config.database.table_name.clone(),
        config.schema_hash(),
        config.database.uri.clone(),
    )
}

async fn cmd_index(
    config: &Config,
    force: bool,
    limit: Option<usize>,
) -> rag_indexer::Result<()> {
    info!("Starting ingestion pipeline");

    let client = LanceDbClient::new(config.database.clone()).await?;
    client.ping().await?;

    let schema_manager = SchemaManager::new(&client);
    if !schema_manager.verify_schema().await? {
        warn!("Chunks table missing, it will be created on first upsert");
        schema_manager.initialize().await?;
    }

    let embedder = build_embedder(config);
    let orchestrator = IndexOrchestrator::new(config.clone(), client, embedder);
    let stats = orchestrator.run(force, limit).await?;

    println!(
        "{}",
        format_success(&format!(
            "Index run complete: {} indexed, {} satisfied, {} chunks upserted in {}s",
            stats.docs_indexed, stats.docs_satisfied, stats.chunks_upserted, stats.duration_secs
        ))
    );

    Ok(())
}

async fn cmd_coverage(config: &Config) -> rag_indexer::Result<()> {
    info!("Running coverage audit");

    let client = LanceDbClient::new(config.database.clone()).await?;
    client.ping().await?;

    let auditor = CoverageAuditor::new(&client, config);
    let report = auditor.audit().await?;

    println!(
        "{}",
        format_info(&format!(
            "Coverage: {}/{} chunk ids present ({:.2}%)",
            report.present,
            report.expected,
            report.coverage_pct()
        ))
    );

    if report.is_complete() {
        println!("{}", format_success("Store coverage is complete"));
        Ok(())
    } else {
        for id in report.missing.iter().take(20) {
            println!("  missing: {}", id);
        }
        if report.missing.len() > 20 {
            println!("  ... and {} more", report.missing.len() - 20);
        }
        Err(IndexError::Validation(format!(
            "{} expected chunk ids missing from the store",
            report.missing.len()
        )))
    }
}

async fn cmd_stats(config: &Config) -> rag_indexer::Result<()> {
    info!("Gathering statistics");

    let client = LanceDbClient::new(config.database.clone()).await?;
    client.ping().await?;

    let chunk_count = client.get_chunk_count().await?;
    println!("{}", format_info(&format!("Stored chunks: {}", chunk_count)));

    match read_wal(&config.wal.path, &wal_scope(config))? {
        Some(state) => {
            println!(
                "{}",
                format_info(&format!(
                    "WAL: run {} finished_ok={} done_docs={}",
                    state.run_id,
                    state.finished_ok,
                    state.done_docs.len()
                ))
            );
        }
        None => {
            println!("{}", format_info("WAL: no resumable state for this scope"));
        }
    }

    Ok(())
}

async fn cmd_reset(config: &Config, confirm: bool) -> rag_indexer::Result<()> {
    if !confirm {
        return Err(IndexError::Validation(
            "This will delete all indexed data. Use --confirm to proceed".to_string(),
        ));
    }

    warn!("Resetting index - all data will be lost");

    let client = LanceDbClient::new(config.database.clone()).await?;
    let schema_manager = SchemaManager::new(&client);
    schema_manager.drop_all_tables().await?;

    if config.wal.path.exists() {
        std::fs::remove_file(&config.wal.path)?;
        info!("Removed WAL file: {}", config.wal.path.display());
    }

    println!("{}", format_success("Index reset complete"));
    Ok(())
}

fn cmd_wal(config: &Config) -> rag_indexer::Result<()> {
    let scope = wal_scope(config);
    info!(
        "Reading WAL {} for scope ({}, {}, {})",
        config.wal.path.display(),
        scope.collection,
        scope.schema_hash,
        scope.db_path
    );

    match read_wal(&config.wal.path, &scope)? {
        Some(state) => {
            println!("{}", format_info(&format!("run_id: {}", state.run_id)));
            println!("  finished_ok: {}", state.finished_ok);
            println!("  committed_batches: {}", state.committed_batches);
            println!(
                "  upsert_rows_committed_total: {}",
                state.upsert_rows_committed_total
            );
            println!("  done_docs: {}", state.done_docs.len());
            println!("  last_seq: {}", state.last_seq);
            if state.truncated_tail_ignored {
                println!(
                    "{}",
                    format_warning("truncated tail ignored (expected after a crash)")
                );
            }
            if let Some(last) = &state.last_event {
                println!("  last_event: {}", last.name());
            }
        }
        None => {
            println!("{}", format_info("No resumable WAL state for this scope"));
        }
    }

    Ok(())
}
