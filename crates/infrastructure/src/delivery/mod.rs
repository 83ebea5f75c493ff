//! Maytapi投递API的HTTP客户端
//!
//! 单条消息投递：`POST {base}/{product_id}/{channel_id}/sendMessage`，
//! 鉴权走 `x-maytapi-key` 请求头。所有失败被归类为
//! [`DeliveryError`] 的四个变体之一，重试策略据此判断可否重试。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use broadcaster_core::config::DeliveryConfig;
use broadcaster_core::errors::DeliveryError;
use broadcaster_core::models::MessageContent;
use broadcaster_core::traits::{DeliveryApi, DeliveryReceipt};

/// sendMessage请求体
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    to_number: &'a str,
    #[serde(rename = "type")]
    message_type: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

/// sendMessage响应体
#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    success: bool,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    message: Option<String>,
}

/// Maytapi客户端
pub struct MaytapiClient {
    client: Client,
    base_url: String,
    product_id: String,
    api_token: String,
}

impl MaytapiClient {
    pub fn new(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            product_id: config.product_id.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// 把消息内容映射为供应商请求体
    ///
    /// 供应商没有原生模板消息，模板ID作为文本引用发送。
    fn build_request<'a>(to: &'a str, message: &'a MessageContent) -> SendMessageRequest<'a> {
        match message {
            MessageContent::Text { body } => SendMessageRequest {
                to_number: to,
                message_type: "text",
                message: body,
                text: None,
            },
            MessageContent::Image { media_url, caption } => SendMessageRequest {
                to_number: to,
                message_type: "media",
                message: media_url,
                text: Some(caption.as_deref().unwrap_or("")),
            },
            MessageContent::Template { template_id } => SendMessageRequest {
                to_number: to,
                message_type: "text",
                message: template_id,
                text: None,
            },
        }
    }
}

#[async_trait]
impl DeliveryApi for MaytapiClient {
    async fn send(
        &self,
        to: &str,
        message: &MessageContent,
        channel_id: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let url = format!(
            "{}/{}/{}/sendMessage",
            self.base_url, self.product_id, channel_id
        );
        let body = Self::build_request(to, message);

        let response = self
            .client
            .post(&url)
            .header("x-maytapi-key", &self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "投递API返回非成功状态码");
            return Err(DeliveryError::classify(Some(status.as_u16()), &text));
        }

        let parsed: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        if !parsed.success {
            let reason = parsed.message.unwrap_or_else(|| "未知投递错误".to_string());
            return Err(DeliveryError::classify(None, &reason));
        }

        let message_id = parsed
            .message_id
            .unwrap_or_else(|| format!("maytapi_{}", chrono::Utc::now().timestamp_millis()));
        debug!(to = %to, message_id = %message_id, "投递API调用成功");
        Ok(DeliveryReceipt { message_id })
    }
}
