use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DeliveryError;
use crate::models::MessageContent;

/// 投递成功的回执
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// 外部消息投递API
///
/// 一次调用发送一条消息。实现方必须把限速（429或消息文本）与
/// 号码无效等永久错误区分为不同的 `DeliveryError` 变体，
/// 重试策略依赖这种区分。
#[async_trait]
pub trait DeliveryApi: Send + Sync {
    async fn send(
        &self,
        to: &str,
        message: &MessageContent,
        channel_id: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}
