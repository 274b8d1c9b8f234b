//! 刷新周期 - 并发拉取全部站点、分桶、整体提交
//!
//! ```text
//! refresh(trigger)
//!   ├─ ReferenceDay::resolve (每周期一次)
//!   ├─ join_all( 每站点 × {processing, completed, recent} )
//!   ├─ classify_site → SiteCounts (degraded 标记)
//!   └─ SnapshotStore::replace → 发布 Refreshed
//! ```
//!
//! 单站点失败只影响该站点（计数为 0 + degraded），周期照常提交。
//! 并发的多个周期各自提交完整快照，后提交者生效。

use chrono_tz::Tz;
use futures::future::join_all;
use shared::SiteCounts;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::classify::{SiteRecords, classify_site};
use crate::core::config::{Config, SiteConfig};
use crate::live::SnapshotStore;
use crate::source::{FetchOutcome, OrderFilter, OrderSource};
use crate::utils::time::{Clock, ReferenceDay};

/// 刷新触发来源（仅用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// 看板连接
    ViewerConnected,
    /// POST /refresh
    Manual,
    /// 定时任务
    Timer,
    /// 启动时首次刷新
    Startup,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::ViewerConnected => "viewer_connected",
            RefreshTrigger::Manual => "manual",
            RefreshTrigger::Timer => "timer",
            RefreshTrigger::Startup => "startup",
        }
    }
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次刷新周期的结果摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub trigger: RefreshTrigger,
    /// 本周期提交的快照代数
    pub generation: u64,
    /// 站点数
    pub sites: usize,
    /// 拉取失败的站点名
    pub degraded_sites: Vec<String>,
    pub elapsed: Duration,
}

/// 聚合器
///
/// Clone 为浅拷贝，`spawn_refresh` 借此把周期放到独立任务中运行。
#[derive(Clone)]
pub struct Aggregator {
    sites: Arc<Vec<SiteConfig>>,
    source: Arc<dyn OrderSource>,
    store: SnapshotStore,
    clock: Arc<dyn Clock>,
    tz: Tz,
    max_pages: u32,
}

impl Aggregator {
    pub fn new(
        config: &Config,
        source: Arc<dyn OrderSource>,
        store: SnapshotStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sites: Arc::new(config.sites.clone()),
            source,
            store,
            clock,
            tz: config.timezone,
            max_pages: config.fetch_max_pages.max(1),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// 执行一次完整刷新周期
    ///
    /// 总是提交（即使全部站点失败或没有站点），返回提交结果摘要。
    pub async fn refresh(&self, trigger: RefreshTrigger) -> CycleReport {
        let started = Instant::now();
        let day = ReferenceDay::resolve(self.clock.as_ref(), self.tz);
        tracing::debug!(
            trigger = %trigger,
            today = %day.today,
            sites = self.sites.len(),
            "Refresh cycle started"
        );

        let processing = OrderFilter::processing_total();
        let completed = OrderFilter::completed_since(day.today_start(), self.max_pages);
        let recent = OrderFilter::created_since(day.yesterday_start(), self.max_pages);

        let per_site = self.sites.iter().map(|site| {
            let (processing, completed, recent) = (&processing, &completed, &recent);
            async move {
                let (p, c, r) = futures::join!(
                    self.source.fetch(site, processing),
                    self.source.fetch(site, completed),
                    self.source.fetch(site, recent),
                );
                site_counts(site, p, c, r, &day)
            }
        });
        let sites: Vec<SiteCounts> = join_all(per_site).await;

        let degraded_sites: Vec<String> = sites
            .iter()
            .filter(|s| s.degraded)
            .map(|s| s.name.clone())
            .collect();
        let snapshot = self.store.replace(sites);

        let report = CycleReport {
            trigger,
            generation: snapshot.generation,
            sites: snapshot.sites.len(),
            degraded_sites,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            trigger = %trigger,
            generation = report.generation,
            sites = report.sites,
            degraded = ?report.degraded_sites,
            processing = snapshot.totals.processing,
            orders_today = snapshot.totals.orders_today,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Refresh cycle committed"
        );
        report
    }

    /// 在独立任务中运行刷新周期（不阻塞调用方）
    pub fn spawn_refresh(&self, trigger: RefreshTrigger) -> JoinHandle<CycleReport> {
        let this = self.clone();
        tokio::spawn(async move { this.refresh(trigger).await })
    }
}

fn site_counts(
    site: &SiteConfig,
    processing: FetchOutcome,
    completed: FetchOutcome,
    recent: FetchOutcome,
    day: &ReferenceDay,
) -> SiteCounts {
    let degraded = processing.is_degraded() || completed.is_degraded() || recent.is_degraded();

    let (processing, processing_meta) = processing.into_parts();
    let (completed, _) = completed.into_parts();
    let (recent, _) = recent.into_parts();

    let counts = classify_site(
        &SiteRecords {
            processing: &processing,
            processing_meta,
            completed: &completed,
            recent: &recent,
        },
        day,
    );

    SiteCounts {
        name: site.name.clone(),
        url: site.url.clone(),
        counts,
        degraded,
    }
}
