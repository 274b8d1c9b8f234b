//! HTTP 接口
//!
//! | 路由 | 方法 | 说明 |
//! |------|------|------|
//! | /webhook | POST | WooCommerce 订单 webhook（增量对账） |
//! | /refresh | POST | 手动触发一次刷新周期（同步返回结果） |
//! | /ws | GET | 看板 WebSocket（连接即触发刷新） |
//! | /health | GET | 健康检查 |

pub mod dashboard_ws;
pub mod health;
pub mod refresh;
pub mod webhook;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 注册全部路由（无中间件、无状态）
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .route("/webhook", post(webhook::handle_webhook))
        .route("/refresh", post(refresh::handle_refresh))
        .route("/ws", get(dashboard_ws::handle_dashboard_ws))
        .route("/health", get(health::health_check))
}

/// 完整应用：路由 + 中间件 + 状态
///
/// HTTP 服务器与集成测试共用
pub fn build_app(state: ServerState) -> Router {
    build_router()
        // CORS - 看板页面可能由其他源提供
        .layer(CorsLayer::permissive())
        // Trace - 请求日志
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
