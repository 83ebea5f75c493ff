use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use broadcaster_core::models::{BroadcastRecipient, RecipientStatus};
use broadcaster_core::traits::RecipientRepository;
use broadcaster_core::{BroadcastError, BroadcastResult};

/// 收件人仓储的PostgreSQL实现
///
/// `(broadcast_id, phone_number)` 上有唯一索引，批量插入带
/// `ON CONFLICT DO NOTHING`，重复解析不会产生重复行。
pub struct PostgresRecipientRepository {
    pool: PgPool,
}

impl PostgresRecipientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_recipient(row: &sqlx::postgres::PgRow) -> BroadcastResult<BroadcastRecipient> {
        Ok(BroadcastRecipient {
            id: row.try_get("id")?,
            broadcast_id: row.try_get("broadcast_id")?,
            phone_number: row.try_get("phone_number")?,
            channel_id: row.try_get("channel_id")?,
            status: row.try_get("status")?,
            error_message: row.try_get("error_message")?,
            sent_at: row.try_get("sent_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl RecipientRepository for PostgresRecipientRepository {
    #[instrument(skip(self, recipients), fields(count = recipients.len()))]
    async fn bulk_insert(&self, recipients: &[BroadcastRecipient]) -> BroadcastResult<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        // 单事务内逐行插入，整体要么全部生效要么全部回滚
        let mut tx = self.pool.begin().await?;
        for recipient in recipients {
            sqlx::query(
                r#"
                INSERT INTO broadcast_recipients
                    (id, broadcast_id, phone_number, channel_id, status, error_message, sent_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (broadcast_id, phone_number) DO NOTHING
                "#,
            )
            .bind(recipient.id)
            .bind(recipient.broadcast_id)
            .bind(&recipient.phone_number)
            .bind(&recipient.channel_id)
            .bind(recipient.status)
            .bind(&recipient.error_message)
            .bind(recipient.sent_at)
            .bind(recipient.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = recipients.len(), "收件人批量插入完成");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_pending(
        &self,
        broadcast_id: Uuid,
        limit: i64,
    ) -> BroadcastResult<Vec<BroadcastRecipient>> {
        let rows = sqlx::query(
            r#"
            SELECT id, broadcast_id, phone_number, channel_id, status, error_message, sent_at, created_at
            FROM broadcast_recipients
            WHERE broadcast_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(broadcast_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_recipient).collect()
    }

    #[instrument(skip(self, error_message))]
    async fn update_status(
        &self,
        id: Uuid,
        status: RecipientStatus,
        error_message: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> BroadcastResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE broadcast_recipients
            SET status = $2, error_message = $3, sent_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BroadcastError::DatabaseOperation(format!(
                "收件人 {id} 不存在，状态更新失败"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_by_status(
        &self,
        broadcast_id: Uuid,
        status: RecipientStatus,
    ) -> BroadcastResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM broadcast_recipients
            WHERE broadcast_id = $1 AND status = $2
            "#,
        )
        .bind(broadcast_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }
}
