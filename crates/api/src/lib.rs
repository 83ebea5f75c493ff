//! 广播分发系统的HTTP接口层
//!
//! 对外暴露两个触发入口与健康检查：
//! - `POST /api/broadcasts/process` 排空所有pending广播；
//! - `POST /api/broadcasts/{id}/send` 处理单个广播；
//! - `GET /health`。
//!
//! 处理逻辑通过 [`routes::AppState`] 注入的
//! `BroadcastProcessService` 完成，本层只做路由、错误到状态码的
//! 映射与统一响应包装。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};

use axum::{middleware as axum_middleware, Router};

/// 组装带中间件的完整HTTP应用
pub fn create_app(state: AppState, cors_enabled: bool) -> Router {
    let mut app = create_routes(state)
        .layer(axum_middleware::from_fn(middleware::request_logging))
        .layer(middleware::trace_layer());
    if cors_enabled {
        app = app.layer(middleware::cors_layer());
    }
    app
}
