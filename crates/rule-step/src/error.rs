//! 规则步骤错误类型
//!
//! 所有错误都是致命的：步骤停止处理，记录一个错误，正在处理的行不输出。

use crate::schema::ColumnType;
use rule_engine::{ProtocolError, RuleError};
use std::fmt;
use thiserror::Error;

/// 单个字段的类型转换失败
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    pub field: String,
    pub column_type: ColumnType,
    /// 引擎返回值的类型名
    pub value_type: &'static str,
}

impl CoercionFailure {
    /// 列类型本身不支持作为输出类型
    pub fn is_unsupported_column(&self) -> bool {
        !self.column_type.is_writable()
    }
}

impl fmt::Display for CoercionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unsupported_column() {
            write!(f, "字段 '{}' 的输出类型 {} 不受支持", self.field, self.column_type)
        } else {
            write!(
                f,
                "字段 '{}' 的值类型 {} 无法转换为 {}",
                self.field, self.value_type, self.column_type
            )
        }
    }
}

/// 行与字段集合之间的转换错误
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("行宽度不一致: 列定义 {expected} 列, 实际 {actual} 列")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("字段类型转换失败: {}", join_failures(.0))]
    Coercion(Vec<CoercionFailure>),

    #[error("构造字段集合失败: {0}")]
    Fields(#[from] RuleError),
}

impl BridgeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::WidthMismatch { .. } => "ROW_WIDTH_MISMATCH",
            Self::Coercion(failures) if failures.iter().any(CoercionFailure::is_unsupported_column) => {
                "UNSUPPORTED_OUTPUT_TYPE"
            }
            Self::Coercion(_) => "COERCION_FAILED",
            Self::Fields(e) => e.code(),
        }
    }
}

fn join_failures(failures: &[CoercionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 规则步骤错误
#[derive(Debug, Error)]
pub enum StepError {
    #[error("步骤配置错误: {0}")]
    Configuration(String),

    #[error("规则来源加载失败: {0}")]
    RuleSource(#[source] RuleError),

    #[error("行 '{label}' 评估失败: {source}")]
    Evaluation {
        label: String,
        #[source]
        source: RuleError,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("远程评估失败: {0}")]
    Remote(#[from] ProtocolError),

    #[error("输入列定义错误: {0}")]
    Schema(String),

    #[error("写出行失败: {0}")]
    Sink(String),

    #[error("评估器尚未初始化或已关闭")]
    NotInitialized,
}

impl StepError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "STEP_CONFIGURATION",
            Self::RuleSource(_) => "STEP_RULE_SOURCE",
            Self::Evaluation { .. } => "STEP_EVALUATION",
            Self::Bridge(e) => e.code(),
            Self::Remote(e) => e.code(),
            Self::Schema(_) => "STEP_SCHEMA",
            Self::Sink(_) => "STEP_SINK",
            Self::NotInitialized => "STEP_NOT_INITIALIZED",
        }
    }

    /// 是否发生在初始化阶段
    pub fn is_initialization_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::RuleSource(_))
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
