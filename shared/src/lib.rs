//! Shared types for the order dashboard
//!
//! dashboard-server 与看板前端共用的协议类型：
//! 统计桶、站点快照、推送消息以及 WooCommerce 订单记录。

pub mod dashboard;
pub mod storefront;
pub mod util;

// Re-exports
pub use dashboard::{Bucket, BucketCounts, DashboardMessage, SiteCounts};
pub use storefront::{OrderRecord, OrderStatus};
