//! 资源管线统一错误类型
//!
//! 管线内部（数据源、解码器、加载器实现）使用 `ResourceError` 传递失败原因；
//! 管理器的对外 API 保持 `Option` 形式——路径解析失败、解码失败都是可恢复的
//! 报告性错误，诊断信息只通过日志输出。

use thiserror::Error;

/// 资源管线错误类型
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Failed to decode resource: {path}, reason: {reason}")]
    DecodeFailed { path: String, reason: String },

    #[error("Invalid resource format: {path}, expected: {expected}")]
    InvalidFormat { path: String, expected: String },

    #[error("GPU resource creation failed: {0}")]
    BackendFailed(String),

    #[error("Data source error: {0}")]
    Io(#[from] std::io::Error),
}

/// 资源管线结果类型别名
pub type ResourceResult<T> = Result<T, ResourceError>;
