//! 规则评估步骤
//!
//! 把行流接到规则引擎上：每行转换为字段集合，在进程内引擎或远程评估服务上评估，
//! 规则动作的修改写回行，追加汇总列写到主输出，规则级结果写到详细输出。

pub mod bridge;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod local;
pub mod output;
pub mod remote;
pub mod schema;
pub mod step;

pub use config::{CheckRemark, EvaluationConfig, RemarkLevel, StepConfig, Variables};
pub use error::{BridgeError, CoercionFailure, Result, StepError};
pub use evaluator::{EvaluatorState, RowEvaluator, RowVerdict};
pub use local::LocalEvaluator;
pub use output::OutputMode;
pub use remote::{RemoteEvaluator, RemoteSession};
pub use schema::{Cell, ColumnMeta, ColumnSchema, ColumnType, Row};
pub use step::{RowSink, RowSource, RuleStep, StepReport};
