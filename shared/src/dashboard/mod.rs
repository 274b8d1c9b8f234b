//! Dashboard protocol types
//!
//! 聚合引擎与看板前端之间的数据结构：
//!
//! - [`Bucket`] / [`BucketCounts`] - 统计桶及其计数
//! - [`SiteCounts`] - 单站点快照
//! - [`DashboardMessage`] - 推送给看板的命名事件

pub mod counts;
pub mod ws;

pub use counts::*;
pub use ws::*;
