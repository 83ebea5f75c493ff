use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use broadcaster_core::traits::BroadcastProcessService;

use crate::handlers::{
    broadcasts::{process_pending, send_broadcast},
    health::health_check,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<dyn BroadcastProcessService>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/broadcasts/process", post(process_pending))
        .route("/api/broadcasts/{id}/send", post(send_broadcast))
        .with_state(state)
}
