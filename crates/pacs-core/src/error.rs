//! 错误定义模块

use thiserror::Error;

/// PACS模拟系统统一错误类型
#[derive(Error, Debug)]
pub enum PacsError {
    /// 未提供PatientID或未选择任何检查，属于可恢复的警告
    #[error("输入为空: {0}")]
    EmptyInput(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl PacsError {
    /// 是否只需向操作员提示警告，而不是按失败处理
    pub fn is_warning(&self) -> bool {
        matches!(self, PacsError::EmptyInput(_))
    }
}

/// PACS模拟系统统一结果类型
pub type Result<T> = std::result::Result<T, PacsError>;
