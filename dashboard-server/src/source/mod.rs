//! 远端订单源
//!
//! [`OrderSource::fetch`] 永不向调用方返回错误：
//! 任何传输/状态码/解析失败都变成 [`FetchOutcome::Degraded`]，
//! 单个站点不可达不会中断其他站点的聚合。

pub mod woo;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use shared::{OrderRecord, OrderStatus};
use std::fmt;

use crate::core::config::SiteConfig;

pub use woo::{FetchError, WooClient};

/// WooCommerce 单页上限
pub const MAX_PER_PAGE: u32 = 100;

/// 拉取过滤条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    /// 订单状态
    pub status: Option<OrderStatus>,
    /// 创建时间下限（站点本地时间）
    pub created_after: Option<NaiveDateTime>,
    /// 最后修改时间下限（站点本地时间）
    pub modified_after: Option<NaiveDateTime>,
    /// 每页条数 (1..=100)
    pub per_page: u32,
    /// 最多拉取页数
    pub max_pages: u32,
}

impl OrderFilter {
    /// 处理中订单：只取 1 条，依赖总数响应头
    pub fn processing_total() -> Self {
        Self {
            status: Some(OrderStatus::Processing),
            created_after: None,
            modified_after: None,
            per_page: 1,
            max_pages: 1,
        }
    }

    /// 指定时间之后有修改的已完成订单
    ///
    /// 远端按创建时间排序；很早创建、今天才完成的订单必须靠修改时间下限
    /// 才能落在前几页之内。
    pub fn completed_since(modified_after: NaiveDateTime, max_pages: u32) -> Self {
        Self {
            status: Some(OrderStatus::Completed),
            created_after: None,
            modified_after: Some(modified_after),
            per_page: MAX_PER_PAGE,
            max_pages,
        }
    }

    /// 指定时间之后创建的全部订单
    pub fn created_since(after: NaiveDateTime, max_pages: u32) -> Self {
        Self {
            status: None,
            created_after: Some(after),
            modified_after: None,
            per_page: MAX_PER_PAGE,
            max_pages,
        }
    }

    /// 只依赖总数响应头，不需要完整记录
    pub fn counts_from_header(&self) -> bool {
        self.per_page == 1 && self.max_pages == 1
    }
}

impl fmt::Display for OrderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(status) = self.status {
            parts.push(format!("status={status}"));
        }
        if let Some(after) = self.created_after {
            parts.push(format!("after={after}"));
        }
        if let Some(after) = self.modified_after {
            parts.push(format!("modified_after={after}"));
        }
        if parts.is_empty() {
            f.write_str("all")
        } else {
            f.write_str(&parts.join(","))
        }
    }
}

/// 带外元数据（响应头）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchMeta {
    /// 匹配条件的订单总数 (X-WP-Total)
    pub total: Option<u64>,
    /// 总页数 (X-WP-TotalPages)
    pub total_pages: Option<u32>,
    /// 还有页因 `max_pages` 未拉取
    pub truncated: bool,
}

/// 单次拉取结果
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched {
        records: Vec<OrderRecord>,
        meta: FetchMeta,
    },
    /// 拉取失败，按空结果处理
    Degraded { reason: String },
}

impl FetchOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded { .. })
    }

    /// 拆分为记录与元数据；失败时两者皆空
    pub fn into_parts(self) -> (Vec<OrderRecord>, FetchMeta) {
        match self {
            FetchOutcome::Fetched { records, meta } => (records, meta),
            FetchOutcome::Degraded { .. } => (Vec::new(), FetchMeta::default()),
        }
    }
}

/// 订单源 - 按站点 + 过滤条件拉取订单
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch(&self, site: &SiteConfig, filter: &OrderFilter) -> FetchOutcome;
}
