use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use broadcaster_core::models::{
    Broadcast, BroadcastStatus, MessageContent, TargetRule,
};
use broadcaster_core::traits::BroadcastRepository;
use broadcaster_core::{BroadcastError, BroadcastResult};

/// 广播仓储的PostgreSQL实现
///
/// 消息内容与目标规则以JSONB列存储，状态为小写VARCHAR。
pub struct PostgresBroadcastRepository {
    pool: PgPool,
}

impl PostgresBroadcastRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_broadcast(row: &sqlx::postgres::PgRow) -> BroadcastResult<Broadcast> {
        let message: Json<MessageContent> = row.try_get("message")?;
        let target: Json<TargetRule> = row.try_get("target")?;
        Ok(Broadcast {
            id: row.try_get("id")?,
            message: message.0,
            target: target.0,
            status: row.try_get("status")?,
            sent_count: row.try_get("sent_count")?,
            failed_count: row.try_get("failed_count")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl BroadcastRepository for PostgresBroadcastRepository {
    #[instrument(skip(self, broadcast), fields(broadcast_id = %broadcast.id))]
    async fn create(&self, broadcast: &Broadcast) -> BroadcastResult<Broadcast> {
        let row = sqlx::query(
            r#"
            INSERT INTO broadcasts (id, message, target, status, sent_count, failed_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, message, target, status, sent_count, failed_count, created_at
            "#,
        )
        .bind(broadcast.id)
        .bind(Json(&broadcast.message))
        .bind(Json(&broadcast.target))
        .bind(broadcast.status)
        .bind(broadcast.sent_count)
        .bind(broadcast.failed_count)
        .bind(broadcast.created_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(broadcast_id = %broadcast.id, "广播已创建");
        Self::row_to_broadcast(&row)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> BroadcastResult<Option<Broadcast>> {
        let row = sqlx::query(
            r#"
            SELECT id, message, target, status, sent_count, failed_count, created_at
            FROM broadcasts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    #[instrument(skip(self))]
    async fn get_pending_broadcasts(&self) -> BroadcastResult<Vec<Broadcast>> {
        let rows = sqlx::query(
            r#"
            SELECT id, message, target, status, sent_count, failed_count, created_at
            FROM broadcasts
            WHERE status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_broadcast).collect()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: Uuid,
        status: BroadcastStatus,
        sent_count: i64,
        failed_count: i64,
    ) -> BroadcastResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE broadcasts
            SET status = $2, sent_count = $3, failed_count = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(sent_count)
        .bind(failed_count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BroadcastError::BroadcastNotFound { id });
        }
        debug!(
            broadcast_id = %id,
            status = status.as_str(),
            sent_count,
            failed_count,
            "广播状态已更新"
        );
        Ok(())
    }
}
