//! SnapshotStore - 聚合快照的唯一持有者与发布者
//!
//! 刷新周期（整体替换）与 webhook（增量补丁）都只能通过这里修改快照。
//!
//! ```text
//! Aggregator::refresh ──replace()──┐
//!                                  ▼
//! Reconciler::apply ──patch_site()─► SnapshotStore
//!                                    ├── current: Mutex<Arc<Snapshot>>  (单一临界区)
//!                                    └── tx: broadcast::Sender<SnapshotChange>
//!                                          │  (提交顺序 = 发布顺序)
//!                                          ▼
//!                                    Viewer WS sessions (各自 recv → 推送)
//! ```
//!
//! 临界区内只做计算 + 提交 + 入队，不做 I/O；
//! 向看板推送在各会话任务中进行，持锁期间不发生。

use parking_lot::Mutex;
use shared::util::now_millis;
use shared::{BucketCounts, DashboardMessage, SiteCounts};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::config::SiteConfig;

/// Broadcast channel 容量 - 足以缓冲连接时突发
const BROADCAST_CAPACITY: usize = 256;

/// 聚合快照（不可变副本通过 `Arc` 共享）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// 每次提交递增
    pub generation: u64,
    /// 提交时间 (Unix millis)
    pub updated_at: i64,
    /// 各站点计数（配置顺序）
    pub sites: Vec<SiteCounts>,
    /// 全局计数，总是由 `sites` 重新求和得到
    pub totals: BucketCounts,
}

impl Snapshot {
    /// 全零快照：每个已配置站点都在，计数为 0
    pub fn empty(sites: &[SiteConfig]) -> Self {
        Self {
            generation: 0,
            updated_at: now_millis(),
            sites: sites
                .iter()
                .map(|s| SiteCounts::empty(&s.name, &s.url))
                .collect(),
            totals: BucketCounts::default(),
        }
    }

    pub fn site(&self, name: &str) -> Option<&SiteCounts> {
        self.sites.iter().find(|s| s.name == name)
    }

    /// 全局计数 == 各站点之和
    pub fn totals_consistent(&self) -> bool {
        let sum: BucketCounts = self.sites.iter().map(|s| &s.counts).sum();
        self.totals == sum
    }

    fn recompute_totals(&mut self) {
        self.totals = self.sites.iter().map(|s| &s.counts).sum();
    }

    /// 全量推送帧：每站点一条 `site_data` + 一条 `totals`
    pub fn to_messages(&self) -> Vec<DashboardMessage> {
        to_messages(&self.sites, self.totals)
    }
}

/// 变更原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCause {
    /// 刷新周期整体替换
    Refreshed,
    /// 单条 webhook 事件
    Webhook { site: String },
}

/// 一次提交对应的发布内容
#[derive(Debug, Clone)]
pub struct SnapshotChange {
    pub generation: u64,
    pub cause: ChangeCause,
    /// Refreshed: 全部站点；Webhook: 受影响的站点
    pub sites: Vec<SiteCounts>,
    pub totals: BucketCounts,
}

impl SnapshotChange {
    pub fn to_messages(&self) -> Vec<DashboardMessage> {
        to_messages(&self.sites, self.totals)
    }
}

fn to_messages(sites: &[SiteCounts], totals: BucketCounts) -> Vec<DashboardMessage> {
    sites
        .iter()
        .cloned()
        .map(DashboardMessage::SiteData)
        .chain(std::iter::once(DashboardMessage::Totals(totals)))
        .collect()
}

struct StoreInner {
    current: Mutex<Arc<Snapshot>>,
    tx: broadcast::Sender<SnapshotChange>,
}

/// 快照存储 + 发布器
///
/// Clone 为浅拷贝（共享同一份状态）。
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl SnapshotStore {
    pub fn new(sites: &[SiteConfig]) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                current: Mutex::new(Arc::new(Snapshot::empty(sites))),
                tx,
            }),
        }
    }

    /// 当前快照的不可变副本
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.current.lock())
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotChange> {
        self.inner.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// 整体替换（刷新周期提交）
    ///
    /// 直接采用调用方计算的完整站点列表，不与当前状态合并；
    /// 全局计数在同一临界区内重算。
    pub fn replace(&self, sites: Vec<SiteCounts>) -> Arc<Snapshot> {
        let mut current = self.inner.current.lock();

        let mut next = Snapshot {
            generation: current.generation + 1,
            updated_at: now_millis(),
            sites,
            totals: BucketCounts::default(),
        };
        next.recompute_totals();
        let next = Arc::new(next);
        *current = Arc::clone(&next);

        // 入队在锁内完成：发布顺序与提交顺序一致（无订阅者时 send 返回 Err，安全忽略）
        let _ = self.inner.tx.send(SnapshotChange {
            generation: next.generation,
            cause: ChangeCause::Refreshed,
            sites: next.sites.clone(),
            totals: next.totals,
        });

        next
    }

    /// 增量补丁（webhook 提交）
    ///
    /// 站点不存在时不做任何修改、不发布，返回 None。
    /// `patch` 未改动计数时仍提交并发布（保持看板"最近事件"新鲜）。
    pub fn patch_site<F>(&self, site: &str, patch: F) -> Option<Arc<Snapshot>>
    where
        F: FnOnce(&mut BucketCounts),
    {
        let mut current = self.inner.current.lock();

        let index = current.sites.iter().position(|s| s.name == site)?;

        let mut next = Snapshot::clone(&current);
        patch(&mut next.sites[index].counts);
        next.generation += 1;
        next.updated_at = now_millis();
        next.recompute_totals();
        let next = Arc::new(next);
        *current = Arc::clone(&next);

        let _ = self.inner.tx.send(SnapshotChange {
            generation: next.generation,
            cause: ChangeCause::Webhook {
                site: site.to_string(),
            },
            sites: vec![next.sites[index].clone()],
            totals: next.totals,
        });

        Some(next)
    }
}
