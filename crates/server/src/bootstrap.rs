use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use aquaflow_core::config::{AppConfig, ConfigError, LoadOptions};
use aquaflow_core::costing::CostingEngine;
use aquaflow_core::notify::NotificationDispatcher;
use aquaflow_core::provisioning::Sha256PasswordHasher;
use aquaflow_core::service::QuoteService;
use aquaflow_db::{
    connect, migrations, DbPool, SqlProductCatalog, SqlProvisioningUnitOfWork,
    SqlQuoteStore, SqlUserDirectory,
};

use crate::mailer::LogMailer;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<QuoteService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let mailer = Arc::new(LogMailer::new(
        config.email.admin_email.clone(),
        config.email.sender_name.clone(),
    ));
    let service = Arc::new(QuoteService::new(
        Arc::new(SqlProductCatalog::new(db_pool.clone())),
        Arc::new(SqlQuoteStore::new(db_pool.clone())),
        Arc::new(SqlUserDirectory::new(db_pool.clone())),
        Arc::new(SqlProvisioningUnitOfWork::new(db_pool.clone())),
        Arc::new(Sha256PasswordHasher),
        NotificationDispatcher::new(mailer),
        CostingEngine::new(config.pricing.clone()),
    ));

    Ok(Application { config, db_pool, service })
}

#[cfg(test)]
mod tests {
    use aquaflow_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_runs_migrations_and_wires_the_service() {
        let app = bootstrap(memory_options()).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('material', 'product', 'user_account', 'quote')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables");
        assert_eq!(table_count, 4);

        let stats = app.service.statistics().await.expect("statistics on empty book");
        assert_eq!(stats.total, 0);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_config() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://not-sqlite".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("config error").to_string();
        assert!(message.contains("database.url"));
    }
}
