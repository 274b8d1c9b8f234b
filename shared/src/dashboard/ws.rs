//! Dashboard WebSocket protocol
//!
//! Server → Viewer: DashboardMessage（推送）
//!
//! 每帧为 `{"event": <name>, "data": <payload>}`，
//! 看板按事件名分发。

use serde::{Deserialize, Serialize};

use super::{BucketCounts, SiteCounts};

/// Server → Viewer 推送消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// 单站点计数
    SiteData(SiteCounts),

    /// 全局计数（各站点之和）
    Totals(BucketCounts),

    /// 聚合器的参考时间（配置时区，RFC 3339）
    TimeUpdate { now: String },
}

impl DashboardMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            DashboardMessage::SiteData(_) => "site_data",
            DashboardMessage::Totals(_) => "totals",
            DashboardMessage::TimeUpdate { .. } => "time_update",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
