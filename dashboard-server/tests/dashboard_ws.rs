//! 看板 WebSocket 端到端：真实监听端口 + tokio-tungstenite 客户端
//!
//! 连接触发刷新周期，周期提交后按 site_data × N + totals 推送。

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use dashboard_server::api::build_app;
use dashboard_server::core::SiteConfig;
use dashboard_server::source::FetchMeta;
use dashboard_server::utils::time::FixedClock;
use dashboard_server::{Config, FetchOutcome, OrderFilter, OrderSource, ServerState};
use futures::StreamExt;
use shared::{BucketCounts, DashboardMessage, OrderStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 处理中总数 = 7（S1）/ 2（S2），其余列表为空；每次拉取先等待 `delay`
struct CountingSource {
    delay: Duration,
}

#[async_trait]
impl OrderSource for CountingSource {
    async fn fetch(&self, site: &SiteConfig, filter: &OrderFilter) -> FetchOutcome {
        tokio::time::sleep(self.delay).await;
        let total = match (filter.status, site.name.as_str()) {
            (Some(OrderStatus::Processing), "S1") => Some(7),
            (Some(OrderStatus::Processing), _) => Some(2),
            _ => None,
        };
        FetchOutcome::Fetched {
            records: Vec::new(),
            meta: FetchMeta {
                total,
                ..Default::default()
            },
        }
    }
}

fn state(delay: Duration) -> ServerState {
    let config = Config::with_sites(vec![
        SiteConfig::new("S1", "https://s1.example", "ck", "cs"),
        SiteConfig::new("S2", "https://s2.example", "ck", "cs"),
    ]);
    let noon = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let clock = Arc::new(FixedClock::at_local(config.timezone, noon).unwrap());
    ServerState::with_source(&config, Arc::new(CountingSource { delay }), clock)
}

async fn serve(state: ServerState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

/// 下一条文本帧（跳过 ping/pong），5 秒超时
async fn next_frame(viewer: &mut Viewer) -> DashboardMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), viewer.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn site_frame(frame: &DashboardMessage) -> (&str, BucketCounts) {
    match frame {
        DashboardMessage::SiteData(site) => (site.name.as_str(), site.counts),
        other => panic!("Expected site_data, got {other:?}"),
    }
}

#[tokio::test]
async fn connecting_triggers_refresh_and_streams_committed_counts() {
    let state = state(Duration::from_millis(50));
    let url = serve(state.clone()).await;
    assert_eq!(state.store.current().generation, 0);

    let (mut viewer, _) = connect_async(url.as_str()).await.unwrap();

    match next_frame(&mut viewer).await {
        DashboardMessage::TimeUpdate { now } => assert!(now.starts_with("2026-10-19T12:00:00")),
        other => panic!("Expected time_update first, got {other:?}"),
    }

    // 数据帧只在周期提交后到达，因此带的是拉取结果而不是初始的 0
    let frame = next_frame(&mut viewer).await;
    let (name, counts) = site_frame(&frame);
    assert_eq!(name, "S1");
    assert_eq!(counts.processing, 7);
    let frame = next_frame(&mut viewer).await;
    let (name, counts) = site_frame(&frame);
    assert_eq!(name, "S2");
    assert_eq!(counts.processing, 2);
    assert_eq!(
        next_frame(&mut viewer).await,
        DashboardMessage::Totals(BucketCounts {
            processing: 9,
            ..Default::default()
        })
    );

    let snap = state.store.current();
    assert_eq!(snap.generation, 1);
    assert_eq!(snap.totals.processing, 9);
}

#[tokio::test]
async fn webhook_reaches_connected_viewer_as_single_site_update() {
    let state = state(Duration::ZERO);
    let url = serve(state.clone()).await;
    let (mut viewer, _) = connect_async(url.as_str()).await.unwrap();

    // time_update + 连接触发的周期（2 × site_data + totals）
    for _ in 0..4 {
        next_frame(&mut viewer).await;
    }

    let response = build_app(state.clone())
        .oneshot(
            Request::post("/webhook")
                .header("x-wc-webhook-source", "https://s2.example")
                .body(Body::from(r#"{"id":9,"status":"processing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let frame = next_frame(&mut viewer).await;
    let (name, counts) = site_frame(&frame);
    assert_eq!(name, "S2");
    assert_eq!(counts.processing, 3);
    assert_eq!(
        next_frame(&mut viewer).await,
        DashboardMessage::Totals(BucketCounts {
            processing: 10,
            ..Default::default()
        })
    );
}

#[tokio::test]
async fn each_viewer_connection_runs_its_own_cycle() {
    let state = state(Duration::ZERO);
    let url = serve(state.clone()).await;

    for expected_generation in 1..=2u64 {
        let (mut viewer, _) = connect_async(url.as_str()).await.unwrap();
        for _ in 0..4 {
            next_frame(&mut viewer).await;
        }
        assert_eq!(state.store.current().generation, expected_generation);
        viewer.close(None).await.unwrap();
    }
}
