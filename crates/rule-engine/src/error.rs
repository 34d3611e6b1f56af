//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("规则编译失败: {0}")]
    CompileError(String),

    #[error("规则执行失败: {0}")]
    ExecutionError(String),

    #[error("规则来源不存在: {0}")]
    SourceNotFound(String),

    #[error("不支持的规则来源: {0}")]
    UnsupportedSource(String),

    #[error("无效的操作符: {operator} 不支持类型 {value_type}")]
    InvalidOperator {
        operator: String,
        value_type: String,
    },

    #[error("字段不存在: {0}")]
    FieldNotFound(String),

    #[error("字段重复: {0}")]
    DuplicateField(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("读取规则文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("读取规则归档失败: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "RULE_PARSE_FAILED",
            Self::CompileError(_) => "RULE_COMPILE_FAILED",
            Self::ExecutionError(_) => "RULE_EXECUTION_FAILED",
            Self::SourceNotFound(_) => "RULE_SOURCE_NOT_FOUND",
            Self::UnsupportedSource(_) => "RULE_SOURCE_UNSUPPORTED",
            Self::InvalidOperator { .. } => "INVALID_OPERATOR",
            Self::FieldNotFound(_) => "FIELD_NOT_FOUND",
            Self::DuplicateField(_) => "DUPLICATE_FIELD",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::JsonError(_) => "JSON_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Archive(_) => "ARCHIVE_ERROR",
        }
    }

    /// 是否发生在规则加载阶段（而非逐行执行阶段）
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::ParseError(_)
                | Self::CompileError(_)
                | Self::SourceNotFound(_)
                | Self::UnsupportedSource(_)
                | Self::JsonError(_)
                | Self::Io(_)
                | Self::Archive(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
