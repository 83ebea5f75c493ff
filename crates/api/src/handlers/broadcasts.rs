//! 广播处理接口
//!
//! 两个触发入口都委托给注入的 `BroadcastProcessService`，
//! 处理本身是同步完成的：响应返回时广播已落入终态。

use axum::extract::{Path, State};
use tracing::info;
use uuid::Uuid;

use broadcaster_core::models::BroadcastOutcome;

use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::AppState;

/// `POST /api/broadcasts/process` 排空所有pending广播
pub async fn process_pending(
    State(state): State<AppState>,
) -> Result<ApiResponse<()>, ApiError> {
    info!("收到批量处理请求");
    state.processor.process_pending_broadcasts().await?;
    Ok(ApiResponse::success_empty())
}

/// `POST /api/broadcasts/{id}/send` 处理单个广播直到终态
pub async fn send_broadcast(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<BroadcastOutcome>, ApiError> {
    info!(broadcast_id = %id, "收到单广播发送请求");
    let outcome = state.processor.process_broadcast(id).await?;
    Ok(ApiResponse::success(outcome))
}
