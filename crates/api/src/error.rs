use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use broadcaster_core::BroadcastError;

/// HTTP层错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("广播系统错误: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Broadcast(BroadcastError::BroadcastNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "BROADCAST_NOT_FOUND",
                format!("广播 {id} 不存在"),
            ),
            ApiError::Broadcast(BroadcastError::LabelNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "LABEL_NOT_FOUND",
                format!("标签 {id} 不存在或未激活"),
            ),
            ApiError::Broadcast(BroadcastError::NoRecipients) => (
                StatusCode::BAD_REQUEST,
                "NO_RECIPIENTS",
                "目标规则未解析出任何收件人".to_string(),
            ),
            ApiError::Broadcast(BroadcastError::InvalidPhoneNumber(number)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_PHONE_NUMBER",
                format!("电话号码无效: {number}"),
            ),
            ApiError::Broadcast(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "BROADCAST_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            },
            "timestamp": chrono::Utc::now(),
        }));
        (status, body).into_response()
    }
}
