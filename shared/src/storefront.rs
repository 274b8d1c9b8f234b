//! WooCommerce 订单记录
//!
//! 只保留计数需要的字段，其余字段反序列化时忽略。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 订单状态
///
/// 未知状态（插件自定义状态等）映射为 [`OrderStatus::Other`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Trash,
    CheckoutDraft,
    #[serde(other)]
    Other,
}

impl OrderStatus {
    /// REST API 查询参数中的状态名
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
            OrderStatus::Trash => "trash",
            OrderStatus::CheckoutDraft => "checkout-draft",
            OrderStatus::Other => "other",
        }
    }

    /// 是否计入"今日/昨日订单"
    ///
    /// cancelled 与 pending 不算有效订单。
    pub fn counts_as_order(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远端订单记录（只读，仅存在于一次拉取/分类过程）
///
/// 时间字段保留原始字符串，由服务端按配置时区解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: u64,
    pub status: OrderStatus,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_completed: Option<String>,
    /// 支付时间（支付状态指示）
    #[serde(default)]
    pub date_paid: Option<String>,
}
