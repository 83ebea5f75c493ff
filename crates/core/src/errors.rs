use thiserror::Error;
use uuid::Uuid;

/// 广播系统错误类型定义
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("广播未找到: {id}")]
    BroadcastNotFound { id: Uuid },

    #[error("标签未找到或未激活: {id}")]
    LabelNotFound { id: Uuid },

    #[error("解析后的收件人集合为空")]
    NoRecipients,

    #[error("无效的电话号码: {0}")]
    InvalidPhoneNumber(String),

    #[error("消息发送错误: {0}")]
    Delivery(#[from] DeliveryError),
}

/// 外部投递API的错误分类
///
/// 投递客户端负责把HTTP状态码和供应商返回的错误文本归入这些类别，
/// 重试策略据此决定是否重试（仅限速错误可重试）。
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("触发速率限制: {0}")]
    RateLimited(String),

    #[error("供应商报告号码无效: {0}")]
    InvalidNumber(String),

    #[error("消息被拒绝: {0}")]
    Rejected(String),

    #[error("网络错误: {0}")]
    Network(String),
}

impl DeliveryError {
    /// 是否为限速错误（429状态码或消息文本包含rate limit）
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DeliveryError::RateLimited(_))
    }

    /// 根据HTTP状态码和错误文本对投递失败进行分类
    pub fn classify(status_code: Option<u16>, message: &str) -> Self {
        let lowered = message.to_lowercase();
        if status_code == Some(429) || lowered.contains("rate limit") {
            return DeliveryError::RateLimited(message.to_string());
        }
        if lowered.contains("invalid_number") || lowered.contains("invalid number") {
            return DeliveryError::InvalidNumber(message.to_string());
        }
        DeliveryError::Rejected(message.to_string())
    }
}
