//! 统计桶与计数

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// 统计桶 - 一个报表维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// 当前处理中的订单
    Processing,
    /// 今日完成的订单
    CompletedToday,
    /// 今日创建的订单（不含 cancelled / pending）
    OrdersToday,
    /// 昨日创建的订单（不含 cancelled / pending）
    OrdersYesterday,
}

impl Bucket {
    /// 部署内固定的全部统计桶
    pub const ALL: [Bucket; 4] = [
        Bucket::Processing,
        Bucket::CompletedToday,
        Bucket::OrdersToday,
        Bucket::OrdersYesterday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Processing => "processing",
            Bucket::CompletedToday => "completed_today",
            Bucket::OrdersToday => "orders_today",
            Bucket::OrdersYesterday => "orders_yesterday",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 每个统计桶的计数（站点级或全局）
///
/// 序列化后字段名即桶名：
///
/// ```json
/// { "processing": 3, "completed_today": 1, "orders_today": 7, "orders_yesterday": 9 }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub processing: u64,
    pub completed_today: u64,
    pub orders_today: u64,
    pub orders_yesterday: u64,
}

impl BucketCounts {
    pub fn get(&self, bucket: Bucket) -> u64 {
        match bucket {
            Bucket::Processing => self.processing,
            Bucket::CompletedToday => self.completed_today,
            Bucket::OrdersToday => self.orders_today,
            Bucket::OrdersYesterday => self.orders_yesterday,
        }
    }

    fn slot_mut(&mut self, bucket: Bucket) -> &mut u64 {
        match bucket {
            Bucket::Processing => &mut self.processing,
            Bucket::CompletedToday => &mut self.completed_today,
            Bucket::OrdersToday => &mut self.orders_today,
            Bucket::OrdersYesterday => &mut self.orders_yesterday,
        }
    }

    /// 指定桶 +1（饱和加法）
    pub fn increment(&mut self, bucket: Bucket) {
        let slot = self.slot_mut(bucket);
        *slot = slot.saturating_add(1);
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for BucketCounts {
    type Output = BucketCounts;

    fn add(mut self, rhs: BucketCounts) -> BucketCounts {
        self += rhs;
        self
    }
}

impl AddAssign for BucketCounts {
    fn add_assign(&mut self, rhs: BucketCounts) {
        for bucket in Bucket::ALL {
            let slot = self.slot_mut(bucket);
            *slot = slot.saturating_add(rhs.get(bucket));
        }
    }
}

impl Sum for BucketCounts {
    fn sum<I: Iterator<Item = BucketCounts>>(iter: I) -> Self {
        iter.fold(BucketCounts::default(), Add::add)
    }
}

impl<'a> Sum<&'a BucketCounts> for BucketCounts {
    fn sum<I: Iterator<Item = &'a BucketCounts>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// 单站点快照
///
/// `counts` 展平序列化，与看板 `site_data` 事件的载荷一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCounts {
    /// 站点名称（唯一键）
    pub name: String,
    /// 站点展示 URL
    pub url: String,
    #[serde(flatten)]
    pub counts: BucketCounts,
    /// 最近一次刷新中该站点有请求失败（计数按 0 处理）
    #[serde(default)]
    pub degraded: bool,
}

impl SiteCounts {
    /// 全零的站点条目
    pub fn empty(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            counts: BucketCounts::default(),
            degraded: false,
        }
    }
}
