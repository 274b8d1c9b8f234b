use shared::DashboardMessage;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::aggregate::{Aggregator, RefreshTrigger};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::live::SnapshotStore;
use crate::reconcile::Reconciler;
use crate::source::{OrderSource, WooClient};
use crate::utils::time::{Clock, SystemClock};

/// time_update 广播容量（只关心最新一条）
const TIME_CHANNEL_CAPACITY: usize = 4;

/// 服务状态 - 持有所有组件的共享句柄
///
/// 所有字段都是浅拷贝（Arc / 共享内部状态），Clone 成本极低。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Arc<Config> | 配置项 (不可变) |
/// | store | SnapshotStore | 聚合快照 + 变更广播 |
/// | aggregator | Aggregator | 刷新周期 |
/// | reconciler | Reconciler | webhook 增量对账 |
/// | clock | Arc<dyn Clock> | 时钟（测试可注入固定时钟） |
/// | time_tx | broadcast::Sender | time_update 推送 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub store: SnapshotStore,
    pub aggregator: Aggregator,
    pub reconciler: Reconciler,
    pub clock: Arc<dyn Clock>,
    pub time_tx: broadcast::Sender<DashboardMessage>,
}

impl ServerState {
    /// 使用 WooCommerce 客户端与系统时钟初始化
    pub fn initialize(config: &Config) -> Result<Self> {
        let client = WooClient::new(config.fetch_timeout())?;
        Ok(Self::with_source(
            config,
            Arc::new(client),
            Arc::new(SystemClock),
        ))
    }

    /// 使用给定订单源与时钟构造（测试注入）
    pub fn with_source(
        config: &Config,
        source: Arc<dyn OrderSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = SnapshotStore::new(&config.sites);
        let aggregator = Aggregator::new(config, source, store.clone(), Arc::clone(&clock));
        let reconciler = Reconciler::new(config, store.clone(), Arc::clone(&clock));
        let (time_tx, _) = broadcast::channel(TIME_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config.clone()),
            store,
            aggregator,
            reconciler,
            clock,
            time_tx,
        }
    }

    /// 当前时间（业务时区，RFC 3339）
    pub fn time_update(&self) -> DashboardMessage {
        DashboardMessage::TimeUpdate {
            now: self
                .clock
                .now()
                .with_timezone(&self.config.timezone)
                .to_rfc3339(),
        }
    }

    /// 注册并启动后台任务
    ///
    /// - `startup_refresh`: 启动后立即刷新一次
    /// - `periodic_refresh`: REFRESH_INTERVAL_SECS > 0 时启用
    /// - `time_ticker`: TIME_UPDATE_INTERVAL_SECS > 0 时启用
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let aggregator = self.aggregator.clone();
        tasks.spawn("startup_refresh", TaskKind::Warmup, async move {
            aggregator.refresh(RefreshTrigger::Startup).await;
        });

        if self.config.refresh_interval_secs > 0 {
            let aggregator = self.aggregator.clone();
            let period = std::time::Duration::from_secs(self.config.refresh_interval_secs);
            let shutdown = tasks.shutdown_token();
            tasks.spawn("periodic_refresh", TaskKind::Periodic, async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                interval.tick().await; // 首次刷新由 startup_refresh 完成
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = interval.tick() => {
                            aggregator.refresh(RefreshTrigger::Timer).await;
                        }
                    }
                }
            });
        }

        if self.config.time_update_interval_secs > 0 {
            let state = self.clone();
            let period = std::time::Duration::from_secs(self.config.time_update_interval_secs);
            let shutdown = tasks.shutdown_token();
            tasks.spawn("time_ticker", TaskKind::Periodic, async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = interval.tick() => {
                            // 无看板连接时 send 返回 Err，忽略
                            let _ = state.time_tx.send(state.time_update());
                        }
                    }
                }
            });
        }

        tasks.log_summary();
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SiteConfig;
    use crate::source::{FetchOutcome, OrderFilter};
    use crate::utils::time::FixedClock;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct EmptySource;

    #[async_trait]
    impl OrderSource for EmptySource {
        async fn fetch(&self, _: &SiteConfig, _: &OrderFilter) -> FetchOutcome {
            FetchOutcome::Fetched {
                records: Vec::new(),
                meta: Default::default(),
            }
        }
    }

    fn state() -> ServerState {
        let config = Config::with_sites(vec![SiteConfig::new("S1", "https://s1.example", "ck", "cs")]);
        let noon = NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let clock = Arc::new(FixedClock::at_local(config.timezone, noon).unwrap());
        ServerState::with_source(&config, Arc::new(EmptySource), clock)
    }

    #[test]
    fn time_update_uses_business_timezone() {
        match state().time_update() {
            DashboardMessage::TimeUpdate { now } => assert_eq!(now, "2026-07-01T12:00:00+01:00"),
            other => panic!("Expected TimeUpdate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn components_share_one_store() {
        let state = state();
        state.aggregator.refresh(RefreshTrigger::Manual).await;
        assert_eq!(state.store.current().generation, 1);
        assert_eq!(state.aggregator.store().current().generation, 1);
    }

    #[tokio::test]
    async fn startup_task_commits_first_snapshot() {
        let state = state();
        let mut rx = state.store.subscribe();
        let tasks = state.start_background_tasks();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.generation, 1);

        tasks.shutdown().await;
    }
}
