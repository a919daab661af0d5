use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use capview::config::Config;
use capview::db::{ImportStore, InMemoryRegistryStore, PostgresRegistryStore};
use capview::logging;
use capview::services::{FileOutcome, ImportService, ImportSummary};
use capview::state::{create_db_pool, run_migrations};
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "capview",
    about = "Import company-registry extracts into the Capview store",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every configured entity file from a directory.
    Import {
        /// Directory with one extract file per entity (overrides import.csv_dir).
        #[arg(long)]
        csv_dir: Option<PathBuf>,
        /// Field delimiter (overrides import.delimiter).
        #[arg(long)]
        delimiter: Option<String>,
        /// Import only these entities. Repeatable.
        #[arg(long = "entity", value_name = "NAME")]
        entities: Vec<String>,
        /// Map and upsert into an in-memory store; the database is not touched.
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
        /// Exit with a non-zero status when any file failed.
        #[arg(long, action = ArgAction::SetTrue)]
        fail_on_error: bool,
    },

    /// Create the registry tables and indexes if they are missing.
    Bootstrap,

    /// Print the version.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Bootstrap => {
            let config = load_config()?;
            let _logging_guard = logging::init_logging(&config.logging)
                .context("Failed to initialize logging")?;
            run_bootstrap(&config).await?;
        }
        Commands::Import {
            csv_dir,
            delimiter,
            entities,
            dry_run,
            fail_on_error,
        } => {
            let mut config = load_config()?;
            if let Some(dir) = csv_dir {
                config.import.csv_dir = dir;
            }
            if let Some(delimiter) = delimiter {
                config.import.delimiter = delimiter;
            }
            if !entities.is_empty() {
                config.import.entities = entities;
            }
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

            let _logging_guard = logging::init_logging(&config.logging)
                .context("Failed to initialize logging")?;
            run_import(&config, dry_run, fail_on_error).await?;
        }
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    Config::load().context("Failed to load configuration")
}

async fn run_bootstrap(config: &Config) -> Result<()> {
    let pool = create_db_pool(config)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await.context("Schema bootstrap failed")?;
    tracing::info!("Schema is up to date");
    Ok(())
}

async fn run_import(config: &Config, dry_run: bool, fail_on_error: bool) -> Result<()> {
    let store: Arc<dyn ImportStore> = if dry_run {
        tracing::info!("Dry run: records are written to an in-memory store");
        Arc::new(InMemoryRegistryStore::new())
    } else {
        let pool = create_db_pool(config)
            .await
            .context("Failed to connect to database")?;
        if config.database.run_migrations {
            run_migrations(&pool).await.context("Schema bootstrap failed")?;
        }
        Arc::new(PostgresRegistryStore::new(pool))
    };

    let service = ImportService::new(store, &config.import)?;
    let summary = service
        .run(&config.import.csv_dir)
        .await
        .with_context(|| format!("Import from {} aborted", config.import.csv_dir.display()))?;

    print_summary(&summary);

    let failed = summary.failed_files();
    if fail_on_error && failed > 0 {
        anyhow::bail!("{failed} file(s) failed to import");
    }
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("Import run {}", summary.run_id);
    println!(
        "{:<22} {:<10} {:>10} {:>10} {:>10}",
        "entity", "status", "read", "upserted", "failed"
    );
    for report in &summary.reports {
        let counts = report.outcome.counts();
        let status = match &report.outcome {
            FileOutcome::Imported(_) => "imported",
            FileOutcome::Skipped(_) => "skipped",
            FileOutcome::Failed { .. } => "FAILED",
        };
        println!(
            "{:<22} {:<10} {:>10} {:>10} {:>10}",
            report.entity.name(),
            status,
            counts.rows_read,
            counts.rows_upserted,
            counts.rows_failed
        );
        if let FileOutcome::Failed { error, .. } = &report.outcome {
            println!("  {}: {}", report.path.display(), error);
        }
    }

    let totals = summary.totals();
    println!(
        "{:<22} {:<10} {:>10} {:>10} {:>10}",
        "total", "", totals.rows_read, totals.rows_upserted, totals.rows_failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use capview_ingest::EntityKind;

    #[test]
    fn parses_import_flags() {
        let cli = Cli::try_parse_from([
            "capview",
            "import",
            "--csv-dir",
            "/data",
            "--entity",
            "members",
            "--entity",
            "registers",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Import {
                csv_dir,
                entities,
                dry_run,
                fail_on_error,
                delimiter,
            } => {
                assert_eq!(csv_dir, Some(PathBuf::from("/data")));
                assert_eq!(entities, vec!["members", "registers"]);
                assert!(dry_run);
                assert!(!fail_on_error);
                assert!(delimiter.is_none());
                let parsed: Vec<EntityKind> = entities
                    .iter()
                    .map(|e| e.parse().unwrap())
                    .collect();
                assert_eq!(parsed, vec![EntityKind::Members, EntityKind::Registers]);
            }
            _ => panic!("expected import command"),
        }
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["capview"]).is_err());
    }
}
