//! 输出列定义与输出行构造
//!
//! 主输出：输入列 + 6 个汇总计数列。
//! 详细输出：输入列 + 9 个结果列，每条 (规则组, 子组, 规则) 一行，按输出模式过滤。

use crate::error::{Result, StepError};
use crate::schema::{Cell, ColumnSchema, ColumnType, Row};
use rule_engine::{EvaluationSummary, GroupResult, RuleResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FIELD_GROUPS: &str = "ruleengine_groups";
pub const FIELD_GROUPS_FAILED: &str = "ruleengine_groups_failed";
pub const FIELD_GROUPS_SKIPPED: &str = "ruleengine_groups_skipped";
pub const FIELD_RULES: &str = "ruleengine_rules";
pub const FIELD_RULES_FAILED: &str = "ruleengine_rules_failed";
pub const FIELD_ACTIONS: &str = "ruleengine_actions";

pub const FIELD_GROUP: &str = "ruleengine_group";
pub const FIELD_GROUP_FAILED: &str = "ruleengine_group_failed";
pub const FIELD_SUBGROUP: &str = "ruleengine_subgroup";
pub const FIELD_SUBGROUP_FAILED: &str = "ruleengine_subgroup_failed";
pub const FIELD_SUBGROUP_INTERGROUP_OPERATOR: &str = "ruleengine_subgroup_intergroup_operator";
pub const FIELD_SUBGROUP_RULE_OPERATOR: &str = "ruleengine_subgroup_rule_operator";
pub const FIELD_RULE: &str = "ruleengine_rule";
pub const FIELD_RULE_FAILED: &str = "ruleengine_rule_failed";
pub const FIELD_MESSAGE: &str = "ruleengine_message";

const SUMMARY_COLUMNS: [(&str, ColumnType); 6] = [
    (FIELD_GROUPS, ColumnType::Integer),
    (FIELD_GROUPS_FAILED, ColumnType::Integer),
    (FIELD_GROUPS_SKIPPED, ColumnType::Integer),
    (FIELD_RULES, ColumnType::Integer),
    (FIELD_RULES_FAILED, ColumnType::Integer),
    (FIELD_ACTIONS, ColumnType::Integer),
];

const DETAIL_COLUMNS: [(&str, ColumnType); 9] = [
    (FIELD_GROUP, ColumnType::String),
    (FIELD_GROUP_FAILED, ColumnType::Integer),
    (FIELD_SUBGROUP, ColumnType::String),
    (FIELD_SUBGROUP_FAILED, ColumnType::Integer),
    (FIELD_SUBGROUP_INTERGROUP_OPERATOR, ColumnType::String),
    (FIELD_SUBGROUP_RULE_OPERATOR, ColumnType::String),
    (FIELD_RULE, ColumnType::String),
    (FIELD_RULE_FAILED, ColumnType::Integer),
    (FIELD_MESSAGE, ColumnType::String),
];

pub const SUMMARY_COLUMN_COUNT: usize = SUMMARY_COLUMNS.len();
pub const DETAIL_COLUMN_COUNT: usize = DETAIL_COLUMNS.len();

/// 详细输出模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OutputMode {
    /// 所有规则组、所有规则
    #[default]
    AllGroupsAllRules,
    /// 失败的规则组、失败的规则
    FailedGroupsFailedRules,
    /// 失败的规则组、所有规则
    FailedGroupsAllRules,
    /// 通过的规则组、失败的规则
    PassedGroupsFailedRules,
    /// 通过的规则组、所有规则
    PassedGroupsAllRules,
}

impl OutputMode {
    pub fn includes_group(&self, group: &GroupResult) -> bool {
        match self {
            Self::AllGroupsAllRules => true,
            Self::FailedGroupsFailedRules | Self::FailedGroupsAllRules => group.failed == 1,
            Self::PassedGroupsFailedRules | Self::PassedGroupsAllRules => group.failed == 0,
        }
    }

    pub fn includes_rule(&self, rule: &RuleResult) -> bool {
        match self {
            Self::FailedGroupsFailedRules | Self::PassedGroupsFailedRules => rule.failed == 1,
            _ => true,
        }
    }
}

impl TryFrom<u8> for OutputMode {
    type Error = StepError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::AllGroupsAllRules),
            1 => Ok(Self::FailedGroupsFailedRules),
            2 => Ok(Self::FailedGroupsAllRules),
            3 => Ok(Self::PassedGroupsFailedRules),
            4 => Ok(Self::PassedGroupsAllRules),
            other => Err(StepError::Configuration(format!(
                "无效的输出模式: {}，可选值为 0-4",
                other
            ))),
        }
    }
}

impl From<OutputMode> for u8 {
    fn from(mode: OutputMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AllGroupsAllRules => "all groups, all rules",
            Self::FailedGroupsFailedRules => "failed groups, failed rules",
            Self::FailedGroupsAllRules => "failed groups, all rules",
            Self::PassedGroupsFailedRules => "passed groups, failed rules",
            Self::PassedGroupsAllRules => "passed groups, all rules",
        };
        write!(f, "{}", s)
    }
}

/// 主输出列定义
pub fn summary_schema(input: &ColumnSchema) -> Result<ColumnSchema> {
    input.extend(SUMMARY_COLUMNS)
}

/// 详细输出列定义
pub fn detail_schema(input: &ColumnSchema) -> Result<ColumnSchema> {
    input.extend(DETAIL_COLUMNS)
}

/// 在行尾追加汇总计数
pub fn append_summary(mut row: Row, summary: &EvaluationSummary) -> Row {
    row.reserve(SUMMARY_COLUMN_COUNT);
    row.extend(
        [
            summary.groups_total,
            summary.groups_failed,
            summary.groups_skipped,
            summary.rules_total,
            summary.rules_failed,
            summary.actions_total,
        ]
        .map(count_cell),
    );
    row
}

/// 构造详细输出行，没有匹配的规则组时返回空列表
pub fn detail_rows(row: &[Cell], groups: &[GroupResult], mode: OutputMode) -> Vec<Row> {
    let mut rows = Vec::new();

    for group in groups.iter().filter(|g| mode.includes_group(g)) {
        for subgroup in &group.subgroups {
            for result in subgroup.results.iter().filter(|r| mode.includes_rule(r)) {
                let mut detail = Vec::with_capacity(row.len() + DETAIL_COLUMN_COUNT);
                detail.extend_from_slice(row);
                detail.extend([
                    Cell::String(group.id.clone()),
                    Cell::Integer(i64::from(group.failed)),
                    Cell::String(subgroup.id.clone()),
                    Cell::Integer(i64::from(subgroup.failed)),
                    Cell::String(subgroup.intergroup_operator.to_string()),
                    Cell::String(subgroup.rule_operator.to_string()),
                    Cell::String(result.rule_id.clone()),
                    Cell::Integer(i64::from(result.failed)),
                    Cell::String(result.message.clone()),
                ]);
                rows.push(detail);
            }
        }
    }

    rows
}

fn count_cell(count: u64) -> Cell {
    Cell::Integer(i64::try_from(count).unwrap_or(i64::MAX))
}
