//! Database connection management

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

pub type DbPool = Pool;

/// Connection parameters for the catalog database
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
}

/// Create a PostgreSQL connection pool
pub fn create_pool(params: &ConnectionParams) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.host = Some(params.host.clone());
    cfg.port = Some(params.port);
    cfg.dbname = Some(params.database.clone());
    cfg.user = Some(params.user.clone());
    cfg.password = Some(params.password.clone());

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(params.max_connections.max(1)));

    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

    log::debug!(
        "Created pool for {}@{}:{}/{} (max {} connections)",
        params.user,
        params.host,
        params.port,
        params.database,
        params.max_connections
    );

    Ok(pool)
}

/// Test database connection
pub async fn test_connection(pool: &DbPool) -> anyhow::Result<()> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT 1 as test", &[]).await?;
    let test: i32 = row.get(0);

    if test == 1 {
        Ok(())
    } else {
        anyhow::bail!("Database connection test failed")
    }
}
