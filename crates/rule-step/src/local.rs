//! 本地评估
//!
//! 每个步骤实例持有一个引擎会话，在第一行到达时从规则来源构造。

use crate::error::{Result, StepError};
use crate::evaluator::{EvaluatorState, RowEvaluator, RowVerdict};
use crate::schema::ColumnSchema;
use async_trait::async_trait;
use rule_engine::{FieldCollection, RuleEngine};
use tracing::{debug, error, info, warn};

/// 进程内规则评估器
pub struct LocalEvaluator {
    rule_source: String,
    retain_details: bool,
    preserve_results: bool,
    state: EvaluatorState,
    engine: Option<RuleEngine>,
}

impl LocalEvaluator {
    /// # Arguments
    /// * `rule_source` - 变量替换后的规则来源路径
    /// * `retain_details` - 配置了详细输出时为 true
    /// * `preserve_results` - 为 true 时不在每行结束后清理执行结果
    pub fn new(rule_source: impl Into<String>, retain_details: bool, preserve_results: bool) -> Self {
        Self {
            rule_source: rule_source.into(),
            retain_details,
            preserve_results,
            state: EvaluatorState::Uninitialized,
            engine: None,
        }
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    /// 执行结果存储中保留的行数
    pub fn retained_executions(&self) -> usize {
        self.engine.as_ref().map_or(0, |e| e.executions().len())
    }

    pub fn engine(&self) -> Option<&RuleEngine> {
        self.engine.as_ref()
    }
}

#[async_trait]
impl RowEvaluator for LocalEvaluator {
    async fn initialize(&mut self, schema: &ColumnSchema) -> Result<()> {
        match self.state {
            EvaluatorState::Uninitialized => {}
            EvaluatorState::Ready => return Ok(()),
            EvaluatorState::Failed | EvaluatorState::Terminated => {
                return Err(StepError::NotInitialized);
            }
        }

        let mut engine = match RuleEngine::from_source(&self.rule_source) {
            Ok(engine) => engine,
            Err(e) => {
                self.state = EvaluatorState::Failed;
                error!(rule_source = %self.rule_source, error = %e, "规则引擎初始化失败");
                return Err(StepError::RuleSource(e));
            }
        };
        engine.set_retain_details(self.retain_details);

        let mut missing: Vec<_> = engine
            .rules()
            .required_fields
            .iter()
            .filter(|field| !schema.contains(field))
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            warn!(fields = ?missing, "规则引用的字段不在输入列中");
        }

        info!(
            rule_source = %self.rule_source,
            groups = engine.number_of_groups(),
            retain_details = self.retain_details,
            preserve_results = self.preserve_results,
            "本地规则引擎已就绪"
        );

        self.engine = Some(engine);
        self.state = EvaluatorState::Ready;
        Ok(())
    }

    async fn evaluate(&mut self, label: &str, fields: &mut FieldCollection) -> Result<RowVerdict> {
        let engine = match (self.state, self.engine.as_mut()) {
            (EvaluatorState::Ready, Some(engine)) => engine,
            _ => return Err(StepError::NotInitialized),
        };

        let evaluation = engine.run(label, fields).map_err(|source| StepError::Evaluation {
            label: label.to_string(),
            source,
        })?;

        let groups = if self.retain_details {
            evaluation.groups.clone()
        } else {
            Vec::new()
        };

        Ok(RowVerdict {
            summary: evaluation.summary,
            groups,
        })
    }

    async fn row_complete(&mut self) {
        if self.preserve_results {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.clear_executions();
        }
    }

    async fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take() {
            debug!(retained = engine.executions().len(), "释放本地规则引擎");
        }
        if self.state != EvaluatorState::Failed {
            self.state = EvaluatorState::Terminated;
        }
    }

    fn mode_name(&self) -> &'static str {
        "local"
    }
}
