//! 订单分桶
//!
//! 纯函数：同样的记录 + 同样的参考日 → 同样的计数。
//! 缺失或无法解析的时间戳一律不计入，不报错。

use shared::{BucketCounts, OrderRecord};

use crate::source::FetchMeta;
use crate::utils::time::ReferenceDay;

/// 处理中订单数
///
/// 优先采用响应头中的总数（请求只取 1 条），缺失时退回记录条数。
pub fn count_processing(records: &[OrderRecord], meta: &FetchMeta) -> u64 {
    meta.total.unwrap_or(records.len() as u64)
}

/// 今日完成：`date_completed` 落在今天，不看状态
pub fn count_completed_today(records: &[OrderRecord], day: &ReferenceDay) -> u64 {
    count_where(records, |r| {
        r.date_completed.as_deref().is_some_and(|d| day.is_today(d))
    })
}

/// 今日新订单（排除 cancelled / pending）
pub fn count_orders_today(records: &[OrderRecord], day: &ReferenceDay) -> u64 {
    count_where(records, |r| {
        r.status.counts_as_order() && r.date_created.as_deref().is_some_and(|d| day.is_today(d))
    })
}

/// 昨日新订单（排除 cancelled / pending）
pub fn count_orders_yesterday(records: &[OrderRecord], day: &ReferenceDay) -> u64 {
    count_where(records, |r| {
        r.status.counts_as_order()
            && r.date_created.as_deref().is_some_and(|d| day.is_yesterday(d))
    })
}

/// 单个站点一个周期的三次拉取结果
#[derive(Debug, Default)]
pub struct SiteRecords<'a> {
    pub processing: &'a [OrderRecord],
    pub processing_meta: FetchMeta,
    pub completed: &'a [OrderRecord],
    /// 昨日 00:00 起创建的订单（同时用于今日 / 昨日）
    pub recent: &'a [OrderRecord],
}

/// 组合四个桶
pub fn classify_site(input: &SiteRecords<'_>, day: &ReferenceDay) -> BucketCounts {
    BucketCounts {
        processing: count_processing(input.processing, &input.processing_meta),
        completed_today: count_completed_today(input.completed, day),
        orders_today: count_orders_today(input.recent, day),
        orders_yesterday: count_orders_yesterday(input.recent, day),
    }
}

fn count_where<P>(records: &[OrderRecord], predicate: P) -> u64
where
    P: Fn(&OrderRecord) -> bool,
{
    records.iter().filter(|r| predicate(r)).count() as u64
}
