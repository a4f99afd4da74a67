use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use aquaflow_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Applied to every pooled connection before first use.
const CONNECTION_PRAGMAS: [&str; 3] = [
    "PRAGMA foreign_keys = ON",
    "PRAGMA journal_mode = WAL",
    "PRAGMA busy_timeout = 5000",
];

/// Opens the configured database, sizing the pool from the `[database]`
/// config section.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    open(
        &config.url,
        config.max_connections.max(1),
        Duration::from_secs(config.timeout_secs.max(1)),
    )
    .await
}

/// Fresh single-connection in-memory database. One connection keeps every
/// query in a test on the same database instance.
pub async fn connect_memory() -> Result<DbPool, sqlx::Error> {
    open("sqlite::memory:", 1, Duration::from_secs(30)).await
}

async fn open(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                for pragma in CONNECTION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(url)
        .await
}

#[cfg(test)]
mod tests {
    use aquaflow_core::config::DatabaseConfig;

    use super::{connect, connect_memory};

    #[tokio::test]
    async fn connect_uses_the_database_section() {
        let pool = connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 2,
            timeout_secs: 5,
        })
        .await
        .expect("connect");

        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.expect("query");
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn connections_enforce_foreign_keys() {
        let pool = connect_memory().await.expect("connect");

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma");
        assert_eq!(enabled, 1);
    }
}
