//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] - HTTP 边界错误类型
//! - [`time`] - 业务时区与时钟
//! - 日志等工具

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse};

/// Application-level Result type
///
/// Used in HTTP handlers and application logic
pub type AppResult<T> = Result<T, AppError>;
