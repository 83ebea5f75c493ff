use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use broadcaster_core::models::{ConversationContact, Label};
use broadcaster_core::traits::ConversationRepository;
use broadcaster_core::BroadcastResult;

/// 会话/联系人查询的PostgreSQL实现
///
/// 收件人解析的只读数据源：号码来自contacts表，通道ID来自
/// 与该联系人建立的会话。按会话创建时间升序返回，同号码多会话
/// 时解析器的首次出现去重会保留最早的通道。
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_contact(row: &sqlx::postgres::PgRow) -> BroadcastResult<ConversationContact> {
        Ok(ConversationContact {
            phone_number: row.try_get("phone_number")?,
            channel_id: row.try_get("channel_id")?,
        })
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    #[instrument(skip(self))]
    async fn get_all_contacts(&self) -> BroadcastResult<Vec<ConversationContact>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.phone_number, cv.channel_id
            FROM conversations cv
            JOIN contacts ct ON ct.id = cv.contact_id
            ORDER BY cv.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_contact).collect()
    }

    #[instrument(skip(self))]
    async fn get_contacts_by_label(
        &self,
        label_id: Uuid,
    ) -> BroadcastResult<Vec<ConversationContact>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.phone_number, cv.channel_id
            FROM conversations cv
            JOIN contacts ct ON ct.id = cv.contact_id
            JOIN conversation_labels cl ON cl.conversation_id = cv.id
            WHERE cl.label_id = $1
            ORDER BY cv.created_at ASC
            "#,
        )
        .bind(label_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_contact).collect()
    }

    #[instrument(skip(self))]
    async fn get_label(&self, label_id: Uuid) -> BroadcastResult<Option<Label>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, is_active
            FROM labels
            WHERE id = $1
            "#,
        )
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Label {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                is_active: row.try_get("is_active")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, numbers), fields(count = numbers.len()))]
    async fn get_contacts_by_numbers(
        &self,
        numbers: &[String],
    ) -> BroadcastResult<Vec<ConversationContact>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.phone_number, cv.channel_id
            FROM conversations cv
            JOIN contacts ct ON ct.id = cv.contact_id
            WHERE ct.phone_number = ANY($1)
            ORDER BY cv.created_at ASC
            "#,
        )
        .bind(numbers)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_contact).collect()
    }
}
