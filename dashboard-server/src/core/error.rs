use std::io;
use thiserror::Error;

/// 服务启动/运行错误（HTTP 请求错误见 [`crate::utils::AppError`]）
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("HTTP 客户端初始化失败: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("无法监听 {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: io::Error,
    },

    #[error("HTTP 服务异常退出: {0}")]
    Serve(io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
