//! 规则引擎领域模型
//!
//! 规则按 规则组 → 子组 → 规则 三层组织。子组内的规则用 `rule_operator` 组合，
//! 子组之间用 `intergroup_operator` 从左到右组合。规则组评估完成后，
//! 按结果执行组上定义的动作来修改行字段。

use crate::fields::ValueType;
use crate::operators::{LogicalOperator, Operator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 规则文件内容：一个项目包含若干规则组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleProject {
    #[serde(default)]
    pub name: Option<String>,
    pub groups: Vec<RuleGroup>,
}

/// 规则组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub depends_on: Option<GroupDependency>,
    #[serde(default)]
    pub subgroups: Vec<RuleSubGroup>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl RuleGroup {
    pub fn new(id: impl Into<String>, subgroups: Vec<RuleSubGroup>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            valid_from: None,
            valid_until: None,
            depends_on: None,
            subgroups,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_dependency(mut self, group_id: impl Into<String>, run_if: Outcome) -> Self {
        self.depends_on = Some(GroupDependency {
            group_id: group_id.into(),
            run_if,
        });
        self
    }

    /// 规则组在给定时间是否处于有效期内
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.valid_from.is_none_or(|from| from <= now);
        let not_ended = self.valid_until.is_none_or(|until| now < until);
        started && not_ended
    }
}

/// 规则组依赖：只有被依赖组的结果与 `run_if` 一致时才执行本组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDependency {
    pub group_id: String,
    pub run_if: Outcome,
}

/// 评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Passed,
    Failed,
}

impl Outcome {
    pub fn from_passed(passed: bool) -> Self {
        if passed { Self::Passed } else { Self::Failed }
    }
}

/// 子组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSubGroup {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub intergroup_operator: LogicalOperator,
    #[serde(default)]
    pub rule_operator: LogicalOperator,
    pub rules: Vec<Rule>,
}

impl RuleSubGroup {
    pub fn new(id: impl Into<String>, rule_operator: LogicalOperator, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            intergroup_operator: LogicalOperator::And,
            rule_operator,
            rules,
        }
    }

    pub fn with_intergroup_operator(mut self, operator: LogicalOperator) -> Self {
        self.intergroup_operator = operator;
        self
    }
}

/// 单条规则：对一个字段做一次条件检查
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    /// 通过时的消息模板，支持 {field} {value} {expected} 占位符
    #[serde(default)]
    pub message_passed: Option<String>,
    #[serde(default)]
    pub message_failed: Option<String>,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            field: field.into(),
            operator,
            value: value.into(),
            message_passed: None,
            message_failed: None,
        }
    }
}

/// 动作：规则组评估后修改字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub field: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub source_field: Option<String>,
    #[serde(default)]
    pub value_type: Option<ValueType>,
    #[serde(default)]
    pub execute_if: Outcome,
}

impl Action {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        kind: ActionKind,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            kind,
            value: value.into(),
            source_field: None,
            value_type: None,
            execute_if: Outcome::Passed,
        }
    }

    pub fn when(mut self, outcome: Outcome) -> Self {
        self.execute_if = outcome;
        self
    }
}

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetValue,
    SetNull,
    CopyField,
    Add,
    Subtract,
    Multiply,
    Append,
}

/// 单条规则的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    /// 0 = 通过, 1 = 失败
    pub failed: u8,
    pub message: String,
}

/// 子组执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupResult {
    pub id: String,
    pub failed: u8,
    pub intergroup_operator: LogicalOperator,
    pub rule_operator: LogicalOperator,
    /// 未开启详细结果保留时为空
    pub results: Vec<RuleResult>,
}

/// 规则组执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    pub id: String,
    pub failed: u8,
    pub skipped: bool,
    pub subgroups: Vec<SubgroupResult>,
}

/// 一行数据的汇总计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub groups_total: u64,
    pub groups_failed: u64,
    pub groups_skipped: u64,
    pub rules_total: u64,
    pub rules_failed: u64,
    pub actions_total: u64,
}

impl EvaluationSummary {
    pub fn groups_passed(&self) -> u64 {
        self.groups_total.saturating_sub(self.groups_failed)
    }

    pub fn rules_passed(&self) -> u64 {
        self.rules_total.saturating_sub(self.rules_failed)
    }
}

/// 一行数据的完整评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowEvaluation {
    pub label: String,
    pub groups: Vec<GroupResult>,
    pub summary: EvaluationSummary,
}
