use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 广播消息内容
///
/// 按消息类型建模为带标签的枚举，使非法状态（例如图片消息没有媒体地址）
/// 无法被表达。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Image {
        media_url: String,
        caption: Option<String>,
    },
    Template {
        template_id: String,
    },
}

impl MessageContent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Image { .. } => "image",
            MessageContent::Template { .. } => "template",
        }
    }
}

/// 广播目标规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target_type", rename_all = "lowercase")]
pub enum TargetRule {
    /// 所有有联系人的会话
    All,
    /// 指定标签下的会话
    Label { label_id: Uuid },
    /// 显式号码列表（与已知联系人求交集）
    Numbers { numbers: Vec<String> },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastStatus::Pending => "pending",
            BroadcastStatus::Sending => "sending",
            BroadcastStatus::Sent => "sent",
            BroadcastStatus::Failed => "failed",
        }
    }

    /// 终态不再发生任何转换
    pub fn is_terminal(&self) -> bool {
        matches!(self, BroadcastStatus::Sent | BroadcastStatus::Failed)
    }
}

impl sqlx::Type<sqlx::Postgres> for BroadcastStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for BroadcastStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "pending" => Ok(BroadcastStatus::Pending),
            "sending" => Ok(BroadcastStatus::Sending),
            "sent" => Ok(BroadcastStatus::Sent),
            "failed" => Ok(BroadcastStatus::Failed),
            _ => Err(format!("Invalid broadcast status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for BroadcastStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 广播实体
///
/// `sent_count`与`failed_count`是收件人终态的派生缓存，
/// 每处理完一个批次后重新写入，只增不减。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: Uuid,
    pub message: MessageContent,
    pub target: TargetRule,
    pub status: BroadcastStatus,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Broadcast {
    pub fn new(message: MessageContent, target: TargetRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            target,
            status: BroadcastStatus::Pending,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
        }
    }

    /// 根据处理结果计算终态：全部失败为失败，至少一条成功为已发送
    pub fn final_status(total_sent: i64, total_failed: i64) -> BroadcastStatus {
        let processed = total_sent + total_failed;
        if total_failed == processed {
            BroadcastStatus::Failed
        } else {
            BroadcastStatus::Sent
        }
    }

}

/// 单个批次的处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub sent: i64,
    pub failed: i64,
}

/// 一次广播处理的累计结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub total_sent: i64,
    pub total_failed: i64,
}
