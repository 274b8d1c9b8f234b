//! 统一错误处理
//!
//! HTTP 边界上的错误类型：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 响应结构
//!
//! # 错误码规范
//!
//! | 错误码 | 状态码 | 说明 |
//! |------|------|------|
//! | E0002 | 400 | 请求验证失败（缺少来源、载荷格式错误） |
//! | E0003 | 404 | 资源不存在（未知站点） |
//! | E3001 | 401 | 签名校验失败 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "E0003",
///   "message": "unknown site: https://shop.example"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    /// 验证失败 (400)
    Validation(String),

    #[error("Unauthorized: {0}")]
    /// 签名或凭证无效 (401)
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            AppError::Validation(msg) => ("E0002", msg.as_str()),
            AppError::Unauthorized(msg) => ("E3001", msg.as_str()),
            AppError::NotFound(msg) => ("E0003", msg.as_str()),
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        });

        (status, body).into_response()
    }
}
