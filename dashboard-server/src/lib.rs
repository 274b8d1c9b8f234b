//! Dashboard Server - 多店铺订单实时看板
//!
//! # 架构概述
//!
//! 从多个独立的 WooCommerce 店铺拉取订单，按统计桶聚合为
//! 站点级与全局计数，通过 WebSocket 实时推送给看板；
//! 同时接收 webhook 事件做增量对账。
//!
//! ```text
//!   WooCommerce 店铺 ──REST──► source ──► classify ──► aggregate ─┐
//!                                                                │ replace
//!   WooCommerce 店铺 ──webhook──► api::webhook ──► reconcile ────┤ patch_site
//!                                                                ▼
//!                                                      live::SnapshotStore
//!                                                                │ broadcast
//!                                                                ▼
//!                                                      api::dashboard_ws ──► 看板
//! ```
//!
//! # 模块结构
//!
//! ```text
//! dashboard-server/src/
//! ├── core/          # 配置、状态、后台任务、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── source/        # 远端订单源 (WooCommerce REST)
//! ├── classify.rs    # 订单分桶
//! ├── aggregate.rs   # 刷新周期
//! ├── reconcile.rs   # webhook 增量对账
//! ├── live/          # 快照存储与发布
//! └── utils/         # 错误、日志、时间
//! ```

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod core;
pub mod live;
pub mod reconcile;
pub mod source;
pub mod utils;

// Re-export 公共类型
pub use aggregate::{Aggregator, CycleReport, RefreshTrigger};
pub use crate::core::{Config, Server, ServerState};
pub use live::{Snapshot, SnapshotStore};
pub use reconcile::{ReconcileError, Reconciler, WebhookEvent};
pub use source::{FetchOutcome, OrderFilter, OrderSource, WooClient};
pub use utils::{AppError, AppResult};

pub use utils::logger::init_logger_with_file;
