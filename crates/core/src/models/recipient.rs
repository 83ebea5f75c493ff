use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Failed => "failed",
        }
    }

    /// sent与failed为终态，调度器写入一次后不再改写
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecipientStatus::Sent | RecipientStatus::Failed)
    }
}

impl sqlx::Type<sqlx::Postgres> for RecipientStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for RecipientStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            _ => Err(format!("Invalid recipient status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for RecipientStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 广播收件人
///
/// 每个收件人是(广播, 目标号码)的唯一配对，归属于其父广播，
/// 在解析阶段批量创建为pending，由调度器恰好改写一次为终态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRecipient {
    pub id: Uuid,
    pub broadcast_id: Uuid,
    pub phone_number: String,
    /// 投递通道ID：该收件人消息必须从哪条线路发出
    pub channel_id: String,
    pub status: RecipientStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BroadcastRecipient {
    pub fn new(broadcast_id: Uuid, phone_number: String, channel_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            broadcast_id,
            phone_number,
            channel_id,
            status: RecipientStatus::Pending,
            error_message: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}

/// 会话联系人：收件人解析的数据来源
///
/// 号码来自contacts表，通道ID来自首次与该联系人建立会话的线路。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContact {
    pub phone_number: String,
    pub channel_id: String,
}

/// 会话标签
#[derive(Debug, Clone)]
pub struct Label {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}
