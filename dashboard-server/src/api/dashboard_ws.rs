//! Dashboard WebSocket endpoint - 实时计数推送
//!
//! GET /ws
//!
//! 协议（只下行）:
//! - `site_data` / `totals`: 每次快照提交后推送（刷新周期 = 全部站点，webhook = 受影响站点）
//! - `time_update`: 定时推送参考时间
//!
//! 连接本身触发一次刷新周期；数据在该周期提交后到达。
//! 接收方落后（Lagged）时重新订阅并重发当前全量快照。

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use shared::DashboardMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::time::Duration;

use crate::aggregate::RefreshTrigger;
use crate::core::ServerState;
use crate::live::{SnapshotChange, SnapshotStore};

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// 连接编号（仅用于日志）
static NEXT_VIEWER_ID: AtomicU64 = AtomicU64::new(1);

/// GET /ws
pub async fn handle_dashboard_ws(
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let viewer_id = NEXT_VIEWER_ID.fetch_add(1, Ordering::Relaxed);
    ws.on_upgrade(move |socket| dashboard_ws_session(socket, state, viewer_id))
}

async fn dashboard_ws_session(socket: WebSocket, state: ServerState, viewer_id: u64) {
    let (mut sink, mut stream) = socket.split();

    // 先订阅再触发刷新，保证能收到本次周期的提交
    let mut changes = state.store.subscribe();
    let mut ticks = state.time_tx.subscribe();
    state.aggregator.spawn_refresh(RefreshTrigger::ViewerConnected);

    tracing::info!(
        viewer_id,
        viewers = state.store.subscriber_count(),
        "Dashboard viewer connected"
    );

    if send_message(&mut sink, &state.time_update()).await.is_err() {
        return;
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            change = changes.recv() => {
                let Some(frames) = frames_for(change, &state.store, &mut changes, viewer_id) else {
                    break;
                };
                if send_all(&mut sink, &frames).await.is_err() {
                    break;
                }
            }

            tick = ticks.recv() => {
                match tick {
                    Ok(msg) => {
                        if send_message(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    // 只关心最新时间，落后直接跳过
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!(viewer_id, "Dashboard viewer disconnected");
}

/// 一次接收结果 → 待推送帧
///
/// 落后时重新订阅并返回当前全量快照；通道关闭返回 None。
fn frames_for(
    received: Result<SnapshotChange, broadcast::error::RecvError>,
    store: &SnapshotStore,
    changes: &mut broadcast::Receiver<SnapshotChange>,
    viewer_id: u64,
) -> Option<Vec<DashboardMessage>> {
    match received {
        Ok(change) => Some(change.to_messages()),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            tracing::warn!(viewer_id, lagged = n, "Dashboard viewer lagged, resending full snapshot");
            *changes = store.subscribe();
            Some(store.current().to_messages())
        }
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

async fn send_all<S>(sink: &mut S, messages: &[DashboardMessage]) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    for msg in messages {
        send_message(sink, msg).await?;
    }
    Ok(())
}

async fn send_message<S>(sink: &mut S, msg: &DashboardMessage) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = msg.to_json().map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
