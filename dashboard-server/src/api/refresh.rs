//! POST /refresh - 手动刷新

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::aggregate::RefreshTrigger;
use crate::core::ServerState;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    ok: bool,
    generation: u64,
    sites: usize,
    degraded_sites: Vec<String>,
    elapsed_ms: u64,
}

/// 同步执行一次刷新周期，返回提交结果
///
/// 站点失败不会让请求失败，失败站点列在 `degraded_sites`。
pub async fn handle_refresh(State(state): State<ServerState>) -> Json<RefreshResponse> {
    let report = state.aggregator.refresh(RefreshTrigger::Manual).await;
    Json(RefreshResponse {
        ok: true,
        generation: report.generation,
        sites: report.sites,
        degraded_sites: report.degraded_sites,
        elapsed_ms: report.elapsed.as_millis() as u64,
    })
}
