//! WooCommerce webhook handler
//!
//! POST /webhook - 订单创建/更新事件（保留原始 body 以校验签名）

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::core::ServerState;
use crate::reconcile::WebhookDelivery;
use crate::utils::AppResult;

/// 来源站点 URL
pub const HEADER_SOURCE: &str = "x-wc-webhook-source";
/// base64(HMAC-SHA256(secret, body))
pub const HEADER_SIGNATURE: &str = "x-wc-webhook-signature";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handle incoming WooCommerce webhook deliveries
///
/// 200 空响应表示已接受；拒绝时返回 400/401/404 与错误体，快照不变。
pub async fn handle_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let source = header(&headers, HEADER_SOURCE);
    let delivery = WebhookDelivery {
        source,
        signature: header(&headers, HEADER_SIGNATURE),
        body: &body,
    };

    match state.reconciler.ingest(delivery) {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) => {
            tracing::warn!(
                source = source.unwrap_or("-"),
                topic = header(&headers, "x-wc-webhook-topic").unwrap_or("-"),
                error = %e,
                "Webhook rejected"
            );
            Err(e.into())
        }
    }
}
