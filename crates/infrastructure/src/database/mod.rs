pub mod postgres;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use broadcaster_core::config::DatabaseConfig;
use broadcaster_core::BroadcastResult;

pub use postgres::{
    PostgresBroadcastRepository, PostgresConversationRepository, PostgresRecipientRepository,
};

/// 根据配置创建PostgreSQL连接池
pub async fn create_pool(config: &DatabaseConfig) -> BroadcastResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await?;
    info!(
        max_connections = config.max_connections,
        "数据库连接池已创建"
    );
    Ok(pool)
}
