//! 核心模块 - 服务配置、状态、后台任务与服务器启动
//!
//! # 模块结构
//!
//! - [`Config`] - 服务配置（环境变量）
//! - [`ServerState`] - 共享服务句柄
//! - [`BackgroundTasks`] - 后台任务管理
//! - [`Server`] - HTTP 服务器
//! - [`ServerError`] - 启动/运行错误

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{Config, ConfigError, SiteConfig};
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
