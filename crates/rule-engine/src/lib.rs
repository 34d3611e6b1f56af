//! 行规则引擎
//!
//! 对按名称寻址的动态字段集合执行 规则组 → 子组 → 规则 三层规则，支持：
//! - JSON 规则定义，从文件、目录或 zip 归档加载
//! - 规则编译（正则预编译、有效期过滤、依赖校验）
//! - 完整求值并保留每条规则的结果
//! - 规则动作修改字段并标记 `updated`
//! - 基于 TCP 的远程评估协议和服务

pub mod actions;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod fields;
pub mod loader;
pub mod models;
pub mod operators;
pub mod protocol;
pub mod server;

pub use compiler::{CompiledRuleSet, RuleCompiler};
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use fields::{FieldCollection, FieldValue, NamedField, ValueType};
pub use loader::RuleSource;
pub use models::{
    Action, ActionKind, EvaluationSummary, GroupResult, Outcome, Rule, RuleGroup, RuleResult,
    RowEvaluation, RuleSubGroup, SubgroupResult,
};
pub use operators::{LogicalOperator, Operator};
pub use protocol::{ProtocolError, RemoteSummary, Request, Response};
pub use server::RuleServer;
