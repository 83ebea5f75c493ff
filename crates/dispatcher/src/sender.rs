//! 限速串行批次发送器
//!
//! 严格串行地发送一个批次内的每条消息，每次发送前强制等待限速
//! 间隔。每个收件人的终态在处理完成后立即写入存储，不在内存中
//! 攒批，这是崩溃后可恢复性的基础。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use broadcaster_core::config::DispatcherConfig;
use broadcaster_core::errors::DeliveryError;
use broadcaster_core::models::{BatchOutcome, Broadcast, BroadcastRecipient, RecipientStatus};
use broadcaster_core::traits::{DeliveryApi, RecipientRepository};
use broadcaster_core::{BroadcastError, BroadcastResult};

use crate::retry::RetryPolicy;

/// 将原始号码规范化为投递API接受的E.164样式地址
///
/// 剥离 `whatsapp:` 前缀，去除首尾空白，统一补上 `+` 前缀。
/// 规范化后长度不足10个字符的号码视为无效。
pub fn normalize_phone_number(raw: &str) -> BroadcastResult<String> {
    let stripped = raw.strip_prefix("whatsapp:").unwrap_or(raw).trim();
    let digits = stripped.strip_prefix('+').unwrap_or(stripped);
    let normalized = format!("+{digits}");
    if normalized.len() < 10 {
        return Err(BroadcastError::InvalidPhoneNumber(raw.to_string()));
    }
    Ok(normalized)
}

/// 批次发送器
pub struct BatchSender {
    delivery: Arc<dyn DeliveryApi>,
    recipients: Arc<dyn RecipientRepository>,
    retry: RetryPolicy,
    rate_limit_delay: Duration,
}

impl BatchSender {
    pub fn new(
        delivery: Arc<dyn DeliveryApi>,
        recipients: Arc<dyn RecipientRepository>,
        retry: RetryPolicy,
        rate_limit_delay: Duration,
    ) -> Self {
        Self {
            delivery,
            recipients,
            retry,
            rate_limit_delay,
        }
    }

    pub fn from_config(
        delivery: Arc<dyn DeliveryApi>,
        recipients: Arc<dyn RecipientRepository>,
        config: &DispatcherConfig,
    ) -> Self {
        Self::new(
            delivery,
            recipients,
            RetryPolicy::from_config(config),
            Duration::from_millis(config.rate_limit_delay_ms),
        )
    }

    /// 串行发送一个批次，返回本批次的成功/失败计数
    ///
    /// 收件人级别的投递失败被转换为该行的failed终态，绝不向外
    /// 传播；存储写入失败则立即向外传播并中止批次。
    pub async fn send_batch(
        &self,
        broadcast: &Broadcast,
        batch: &[BroadcastRecipient],
    ) -> BroadcastResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for recipient in batch {
            // 每次发送前的强制限速等待，包括批次的第一条
            tokio::time::sleep(self.rate_limit_delay).await;

            let to = match normalize_phone_number(&recipient.phone_number) {
                Ok(to) => to,
                Err(err) => {
                    warn!(
                        broadcast_id = %broadcast.id,
                        recipient_id = %recipient.id,
                        phone_number = %recipient.phone_number,
                        "号码无效，跳过投递"
                    );
                    self.recipients
                        .update_status(
                            recipient.id,
                            RecipientStatus::Failed,
                            Some(&err.to_string()),
                            None,
                        )
                        .await?;
                    outcome.failed += 1;
                    continue;
                }
            };

            let result = self
                .retry
                .execute(
                    || self.delivery.send(&to, &broadcast.message, &recipient.channel_id),
                    DeliveryError::is_rate_limited,
                )
                .await;

            match result {
                Ok(receipt) => {
                    debug!(
                        broadcast_id = %broadcast.id,
                        recipient_id = %recipient.id,
                        message_id = %receipt.message_id,
                        "消息投递成功"
                    );
                    self.recipients
                        .update_status(recipient.id, RecipientStatus::Sent, None, Some(Utc::now()))
                        .await?;
                    outcome.sent += 1;
                }
                Err(err) => {
                    warn!(
                        broadcast_id = %broadcast.id,
                        recipient_id = %recipient.id,
                        error = %err,
                        "消息投递失败"
                    );
                    self.recipients
                        .update_status(
                            recipient.id,
                            RecipientStatus::Failed,
                            Some(&err.to_string()),
                            None,
                        )
                        .await?;
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}
