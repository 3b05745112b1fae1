//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 记录文件格式错误
    #[error("malformed trace {source_name}: {message}")]
    TraceFormat {
        /// 文件名或数据来源
        source_name: String,
        /// 错误消息
        message: String,
    },

    /// 不支持的记录文件扩展名
    #[error("unsupported trace format: .{extension}")]
    UnsupportedFormat {
        /// 文件扩展名
        extension: String,
    },

    /// 捕获定时器收到顺序错误的动作
    #[error("capture timer protocol violation: {message}")]
    Protocol {
        /// 错误消息
        message: String,
    },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub(crate) fn trace_format(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TraceFormat {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
