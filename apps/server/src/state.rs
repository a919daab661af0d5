//! Shared application state

use crate::{
    config::Config,
    db::{PostgresRegistryStore, RecordStore},
    services::{CompanyService, SearchService},
    Result,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppStateOptions {
    pub run_migrations: bool,
}

impl AppStateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_migrations: config.database.run_migrations,
        }
    }
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub search_service: Arc<SearchService>,
    pub company_service: Arc<CompanyService>,
}

impl AppState {
    /// Initialize the application state against PostgreSQL
    pub async fn new(config: Config) -> Result<Self> {
        let options = AppStateOptions::from_config(&config);
        Self::new_with_options(config, options).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let db_pool = create_db_pool(&config).await?;
        if options.run_migrations {
            run_migrations(&db_pool).await?;
        }

        let store: Arc<dyn RecordStore> = Arc::new(PostgresRegistryStore::new(db_pool));
        Ok(Self::with_store(config, store))
    }

    /// Build the state over any record store (the in-memory one in tests).
    pub fn with_store(config: Config, store: Arc<dyn RecordStore>) -> Self {
        let search_service = Arc::new(SearchService::new(Arc::clone(&store), &config.search));
        let company_service = Arc::new(CompanyService::new(Arc::clone(&store)));
        Self {
            config: Arc::new(config),
            store,
            search_service,
            company_service,
        }
    }
}

/// Apply the embedded schema migrations (tables and indexes).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::Error::Internal(format!("Migration failed: {}", e)))?;
    Ok(())
}

pub async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // Max query execution time
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;

                // Max lock wait time, fail fast
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(&config.database.url)
        .await
        .map_err(crate::Error::Database)?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.database.pool_min_size,
        config.database.pool_max_size
    );

    Ok(pool)
}
