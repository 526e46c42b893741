//! CensusKV CLI: transform census CSV extracts and bulk-load them into a
//! key-value store.
//!
//! # Commands
//! ```text
//! censuskv transform   --csv <path> [--out-dir ./out_json] [--variant geo|single]
//! censuskv build-table --table <name> --file <records.json>
//! censuskv load        --table <name> --file <records.json> [--commit]
//! censuskv delete      --table <name> --file <records.json> [--delete-data --confirm-delete]
//! censuskv purge       --table <name> [--purge --confirm-purge]
//! censuskv info
//! ```
//!
//! # Exit codes
//! `0` success, `1` malformed input or fatal error, `2` table purged,
//! `3` table provisioning failure, `99` missing required input.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

use censuskv_core::executor::ExecutionMode;
use censuskv_core::partition::MAX_BATCH_SIZE;
use censuskv_core::record::RecordVariant;
use censuskv_core::store::KvStore;
use censuskv_storage::{InMemoryStore, SqliteStore};

mod cmd_batch;
mod cmd_table;
mod cmd_transform;
mod config;
mod exit;

use cmd_batch::BatchOp;
use cmd_table::PurgeOutcome;
use config::AppConfig;
use exit::CliError;

#[derive(Parser)]
#[command(
    name = "censuskv",
    about = "Census CSV → JSON records → key-value store, in batches of 25",
    long_about = "
CensusKV CLI: convert census CSV extracts into JSON records and load them into
(or delete them from) a key-value store. Store-mutating commands are dry runs
unless explicitly confirmed.

ENVIRONMENT VARIABLES:
  CENSUSKV_DATABASE   Path or sqlite: URL of the store database
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// YAML or JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store database (overrides the config file)
    #[arg(long, global = true, env = "CENSUSKV_DATABASE")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a census CSV file into a JSON array of records
    Transform {
        /// Input CSV, named like 2016Census_G02_AUS_STE.csv
        #[arg(short, long)]
        csv: Option<PathBuf>,
        /// Output directory (created if missing)
        #[arg(short, long, default_value = "./out_json")]
        out_dir: PathBuf,
        /// Record shape: geo | single (default from config)
        #[arg(long)]
        variant: Option<RecordVariant>,
    },

    /// Create a table keyed like the first record in a records file
    #[command(name = "build-table")]
    BuildTable {
        #[arg(short = 'n', long)]
        table: Option<String>,
        /// Records JSON produced by `transform`
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Put every record of a records file into a table
    Load {
        #[arg(short = 'n', long)]
        table: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Actually write; without it the run is a dry run
        #[arg(long)]
        commit: bool,
    },

    /// Delete every record of a records file from a table, by key
    Delete {
        #[arg(short = 'n', long)]
        table: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Request deletion (dry run unless --confirm-delete is also given)
        #[arg(long)]
        delete_data: bool,
        #[arg(long)]
        confirm_delete: bool,
    },

    /// Delete a whole table (requires --purge and --confirm-purge)
    Purge {
        #[arg(short = 'n', long)]
        table: Option<String>,
        #[arg(long)]
        purge: bool,
        #[arg(long)]
        confirm_purge: bool,
    },

    /// Show defaults and available backends
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("✗ Config error: {e}");
            return ExitCode::from(exit::FATAL);
        }
    };
    config.apply_overrides(cli.verbose, cli.log_json, cli.database.clone());

    if let Err(e) = censuskv_observability::init_tracing(&config.log) {
        eprintln!("warning: logging not initialised: {e}");
    }

    match run(cli.command, &config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = exit::code_for(&e);
            error!(exit_code = code, "{e:#}");
            eprintln!("✗ {e:#}");
            ExitCode::from(code)
        }
    }
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T> {
    value.ok_or_else(|| CliError::MissingInput(format!("{flag} is required")).into())
}

async fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    Ok(SqliteStore::open(&config.store.database).await?)
}

/// The configured store for live runs. Dry runs never call the store, so
/// they get a throwaway in-memory one and the database is left unopened.
async fn store_for(config: &AppConfig, mode: ExecutionMode) -> Result<Box<dyn KvStore>> {
    match mode {
        ExecutionMode::Live => Ok(Box::new(open_store(config).await?)),
        ExecutionMode::DryRun => Ok(Box::new(InMemoryStore::new())),
    }
}

async fn run(command: Commands, config: &AppConfig) -> Result<u8> {
    match command {
        Commands::Transform {
            csv,
            out_dir,
            variant,
        } => {
            let csv = required(csv, "--csv")?;
            let mut transform = config.pipeline.transform.clone();
            if let Some(v) = variant {
                transform.variant = v;
            }
            let (out, summary) = cmd_transform::run(&csv, &out_dir, transform)?;
            println!(
                "✓ {} → {} ({} records, {} fields, partition {})",
                csv.display(),
                out.display(),
                summary.rows,
                summary.fields,
                summary.partition_id
            );
            Ok(exit::SUCCESS)
        }

        Commands::BuildTable { table, file } => {
            let table = required(table, "--table")?;
            let file = required(file, "--file")?;
            let store = open_store(config).await?;
            let desc = cmd_table::build(&store, &table, &file).await?;
            cmd_table::print_description(&desc);
            Ok(exit::SUCCESS)
        }

        Commands::Load {
            table,
            file,
            commit,
        } => {
            let mode = ExecutionMode::confirmed(commit);
            cmd_batch_run(config, table, file, BatchOp::Load, mode).await
        }

        Commands::Delete {
            table,
            file,
            delete_data,
            confirm_delete,
        } => {
            let mode = ExecutionMode::confirmed(delete_data && confirm_delete);
            cmd_batch_run(config, table, file, BatchOp::Delete, mode).await
        }

        Commands::Purge {
            table,
            purge,
            confirm_purge,
        } => {
            let table = required(table, "--table")?;
            let mode = ExecutionMode::confirmed(purge && confirm_purge);
            let store = store_for(config, mode).await?;
            match cmd_table::purge(store.as_ref(), &table, purge, confirm_purge).await? {
                PurgeOutcome::Refused => {
                    println!("Refusing to purge '{table}': pass both --purge and --confirm-purge");
                    Ok(exit::SUCCESS)
                }
                PurgeOutcome::Purged(desc) => {
                    println!(
                        "✓ Purged table '{}' ({} items)",
                        desc.spec.name, desc.item_count
                    );
                    Ok(exit::PURGED)
                }
            }
        }

        Commands::Info => {
            cmd_info(config);
            Ok(exit::SUCCESS)
        }
    }
}

async fn cmd_batch_run(
    config: &AppConfig,
    table: Option<String>,
    file: Option<PathBuf>,
    op: BatchOp,
    mode: ExecutionMode,
) -> Result<u8> {
    let table = required(table, "--table")?;
    let file = required(file, "--file")?;
    ensure_exists(&file)?;

    let store = store_for(config, mode).await?;
    let batch_size = config.pipeline.batch_size;
    match cmd_batch::run(store.as_ref(), &table, &file, op, mode, batch_size).await? {
        Some(report) => cmd_batch::print_report(&report),
        None => println!("No records in {}", file.display()),
    }
    Ok(exit::SUCCESS)
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::MissingInput(format!("{} does not exist", path.display())).into())
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_info(config: &AppConfig) {
    let t = &config.pipeline.transform;
    println!("CensusKV v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Pipeline:");
    println!(
        "  Batch size:          {} (max {MAX_BATCH_SIZE})",
        config.pipeline.batch_size
    );
    println!("  Record variant:      {}", t.variant);
    println!("  Sentinel:            {:?} → {}", t.sentinel_token, t.sentinel_value);
    println!("  CSV delimiter:       {:?}", t.delimiter);
    println!("  File name delimiter: {:?}", t.file_name_delimiter);
    println!();
    println!("Store:");
    println!("  Backend:             sqlite ({})", config.store.database);
    println!("  Also available:      memory (tests and dry runs)");
    println!();
    println!("Logging:               level={} json={}", config.log.level, config.log.json);
}

#[cfg(test)]
mod tests {
    use super::*;
    use censuskv_core::record::{KvPairs, Record};

    fn config_in(dir: &Path) -> (AppConfig, PathBuf) {
        let db = dir.join("store.db");
        let mut config = AppConfig::default();
        config.store.database = db.display().to_string();
        (config, db)
    }

    fn records_file(dir: &Path) -> PathBuf {
        let mut kv = KvPairs::new();
        kv.insert("Tot_P".into(), 7.0);
        let records = vec![Record::new("1", "G02", Some("STE".into()), kv)];
        let path = dir.join("recs.json");
        std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn dry_run_load_and_delete_leave_database_unopened() {
        let dir = tempfile::tempdir().unwrap();
        let (config, db) = config_in(dir.path());
        let file = records_file(dir.path());

        let load = Commands::Load {
            table: Some("census".into()),
            file: Some(file.clone()),
            commit: false,
        };
        assert_eq!(run(load, &config).await.unwrap(), exit::SUCCESS);

        let delete = Commands::Delete {
            table: Some("census".into()),
            file: Some(file),
            delete_data: true,
            confirm_delete: false,
        };
        assert_eq!(run(delete, &config).await.unwrap(), exit::SUCCESS);

        assert!(!db.exists());
    }

    #[tokio::test]
    async fn refused_purge_leaves_database_unopened() {
        let dir = tempfile::tempdir().unwrap();
        let (config, db) = config_in(dir.path());

        let purge = Commands::Purge {
            table: Some("census".into()),
            purge: true,
            confirm_purge: false,
        };
        assert_eq!(run(purge, &config).await.unwrap(), exit::SUCCESS);
        assert!(!db.exists());
    }

    #[tokio::test]
    async fn committed_load_opens_database() {
        let dir = tempfile::tempdir().unwrap();
        let (config, db) = config_in(dir.path());
        let file = records_file(dir.path());

        let load = Commands::Load {
            table: Some("census".into()),
            file: Some(file),
            commit: true,
        };
        assert_eq!(run(load, &config).await.unwrap(), exit::SUCCESS);
        assert!(db.exists());
    }
}
