//! 行评估器接口
//!
//! 本地评估（进程内引擎）和远程评估（评估服务）对步骤提供同一接口。

use crate::error::Result;
use crate::schema::ColumnSchema;
use async_trait::async_trait;
use rule_engine::{EvaluationSummary, FieldCollection, GroupResult};

/// 一行的评估结论
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowVerdict {
    pub summary: EvaluationSummary,
    /// 规则组结果，仅本地评估且开启详细输出时包含规则级结果
    pub groups: Vec<GroupResult>,
}

/// 行评估器
///
/// 调用顺序：`initialize` 一次，之后每行 `evaluate` + `row_complete`，最后 `shutdown`。
/// 同一实例上的调用严格串行。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RowEvaluator: Send {
    /// 构造引擎或建立连接
    async fn initialize(&mut self, schema: &ColumnSchema) -> Result<()>;

    /// 评估一行，规则动作对 `fields` 的修改在返回前已生效
    async fn evaluate(&mut self, label: &str, fields: &mut FieldCollection) -> Result<RowVerdict>;

    /// 一行的主输出和详细输出都已写出
    async fn row_complete(&mut self);

    /// 释放资源，多次调用只生效一次
    async fn shutdown(&mut self);

    /// 评估方式名称（用于日志和指标）
    fn mode_name(&self) -> &'static str;
}

/// 评估器生命周期状态
///
/// `Uninitialized → Ready → Terminated`，初始化失败进入 `Failed`，`Failed` 是终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorState {
    Uninitialized,
    Ready,
    Failed,
    Terminated,
}
