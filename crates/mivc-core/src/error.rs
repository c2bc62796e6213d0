//! 错误定义模块

use thiserror::Error;

/// MIVC系统统一错误类型
#[derive(Error, Debug)]
pub enum MivcError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("版本比较错误: {0}")]
    Comparison(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("外部工具错误: {0}")]
    ExternalTool(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// MIVC系统统一结果类型
pub type Result<T> = std::result::Result<T, MivcError>;
