//! 规则引擎会话
//!
//! 一个会话持有共享的编译后规则集和本会话自己的执行结果存储。
//! 管道步骤的每个实例、服务端的每个连接各自拥有一个会话，互不共享执行状态。

use crate::compiler::CompiledRuleSet;
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::fields::FieldCollection;
use crate::loader::RuleSource;
use crate::models::RowEvaluation;
use std::sync::Arc;
use tracing::{debug, info};

/// 规则引擎会话
pub struct RuleEngine {
    rules: Arc<CompiledRuleSet>,
    executor: RuleExecutor,
    /// 执行结果存储，调用方负责在每行处理完后清理
    executions: Vec<RowEvaluation>,
}

impl RuleEngine {
    /// 引擎版本
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    pub fn new(rules: Arc<CompiledRuleSet>) -> Self {
        Self {
            rules,
            executor: RuleExecutor::new(),
            executions: Vec::new(),
        }
    }

    /// 解析规则来源并编译，构造新会话
    pub fn from_source(path: &str) -> Result<Self> {
        let source = RuleSource::resolve(path)?;
        let rules = source.compile()?;
        info!(
            source = %source,
            groups = rules.number_of_groups(),
            rules = rules.number_of_rules(),
            version = Self::VERSION,
            "规则引擎初始化完成"
        );
        Ok(Self::new(Arc::new(rules)))
    }

    /// 是否保留每条规则的执行结果（详细输出需要）
    pub fn set_retain_details(&mut self, retain: bool) {
        self.executor.set_retain_details(retain);
    }

    pub fn retain_details(&self) -> bool {
        self.executor.retains_details()
    }

    /// 对一行字段执行全部规则组
    ///
    /// 动作直接修改 `fields` 并设置 `updated` 标记。结果追加到执行存储中。
    pub fn run(&mut self, label: &str, fields: &mut FieldCollection) -> Result<&RowEvaluation> {
        let evaluation = self
            .executor
            .execute(&self.rules, label, fields)
            .map_err(|e| match e {
                RuleError::ExecutionError(msg) => {
                    RuleError::ExecutionError(format!("{}: {}", label, msg))
                }
                other => other,
            })?;

        debug!(
            label,
            groups_failed = evaluation.summary.groups_failed,
            groups_skipped = evaluation.summary.groups_skipped,
            rules_failed = evaluation.summary.rules_failed,
            actions = evaluation.summary.actions_total,
            "行评估完成"
        );

        self.executions.push(evaluation);
        Ok(&self.executions[self.executions.len() - 1])
    }

    /// 最近一次执行的结果
    pub fn last_evaluation(&self) -> Option<&RowEvaluation> {
        self.executions.last()
    }

    pub fn executions(&self) -> &[RowEvaluation] {
        &self.executions
    }

    /// 清空执行结果存储
    pub fn clear_executions(&mut self) {
        self.executions.clear();
    }

    pub fn number_of_groups(&self) -> usize {
        self.rules.number_of_groups()
    }

    pub fn number_of_rules(&self) -> usize {
        self.rules.number_of_rules()
    }

    pub fn rules(&self) -> &Arc<CompiledRuleSet> {
        &self.rules
    }
}
