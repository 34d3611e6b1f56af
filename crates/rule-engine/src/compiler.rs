//! 规则编译器
//!
//! 校验规则组定义并编译成内存中的执行结构：正则预编译、字段索引预提取、
//! 过滤不在有效期内的规则组。

use crate::error::{Result, RuleError};
use crate::models::{Action, ActionKind, GroupDependency, Rule, RuleGroup, RuleSubGroup};
use crate::operators::{LogicalOperator, Operator};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    /// regex 操作符的预编译正则
    pub pattern: Option<Regex>,
}

/// 编译后的子组
#[derive(Debug, Clone)]
pub struct CompiledSubGroup {
    pub id: String,
    pub intergroup_operator: LogicalOperator,
    pub rule_operator: LogicalOperator,
    pub rules: Vec<CompiledRule>,
}

/// 编译后的规则组
#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub id: String,
    pub depends_on: Option<GroupDependency>,
    pub subgroups: Vec<CompiledSubGroup>,
    pub actions: Vec<Action>,
}

impl CompiledGroup {
    pub fn rule_count(&self) -> usize {
        self.subgroups.iter().map(|sg| sg.rules.len()).sum()
    }
}

/// 编译后的规则集合，多个引擎会话可以共享
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    pub groups: Vec<CompiledGroup>,
    /// 规则和动作中引用的所有字段（用于提前发现与输入列不匹配的规则）
    pub required_fields: HashSet<String>,
    /// 编译版本号
    pub compile_version: u64,
}

impl CompiledRuleSet {
    pub fn number_of_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn number_of_rules(&self) -> usize {
        self.groups.iter().map(CompiledGroup::rule_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// 规则编译器
pub struct RuleCompiler {
    compile_version: u64,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self { compile_version: 0 }
    }

    /// 从 JSON 字符串编译单个规则组
    pub fn compile_group_json(&mut self, json: &str) -> Result<CompiledRuleSet> {
        let group: RuleGroup = serde_json::from_str(json)?;
        self.compile(vec![group], Utc::now())
    }

    /// 编译规则组列表，丢弃在 `now` 时刻不在有效期内的规则组
    pub fn compile(&mut self, groups: Vec<RuleGroup>, now: DateTime<Utc>) -> Result<CompiledRuleSet> {
        self.validate_groups(&groups)?;

        let declared = groups.len();
        let mut required_fields = HashSet::new();
        let mut compiled = Vec::with_capacity(declared);

        for group in groups {
            if !group.is_active_at(now) {
                debug!(group_id = %group.id, "规则组不在有效期内，已跳过");
                continue;
            }
            self.collect_fields(&group, &mut required_fields);
            compiled.push(self.compile_group(group)?);
        }

        self.compile_version += 1;
        info!(
            declared,
            active = compiled.len(),
            version = self.compile_version,
            "规则编译完成"
        );

        Ok(CompiledRuleSet {
            groups: compiled,
            required_fields,
            compile_version: self.compile_version,
        })
    }

    /// 验证规则组之间的约束：ID 唯一、依赖指向已声明的前序规则组
    fn validate_groups(&self, groups: &[RuleGroup]) -> Result<()> {
        let mut seen = HashSet::new();

        for group in groups {
            if group.id.is_empty() {
                return Err(RuleError::ParseError("规则组 ID 不能为空".to_string()));
            }

            if let Some(dep) = &group.depends_on {
                if !seen.contains(dep.group_id.as_str()) {
                    return Err(RuleError::CompileError(format!(
                        "规则组 '{}' 依赖的规则组 '{}' 不存在或未在其之前定义",
                        group.id, dep.group_id
                    )));
                }
            }

            if !seen.insert(group.id.as_str()) {
                return Err(RuleError::CompileError(format!("规则组 ID 重复: {}", group.id)));
            }

            self.validate_group(group)?;
        }

        Ok(())
    }

    /// 验证单个规则组
    fn validate_group(&self, group: &RuleGroup) -> Result<()> {
        if group.subgroups.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则组 '{}' 至少需要一个子组",
                group.id
            )));
        }

        for subgroup in &group.subgroups {
            self.validate_subgroup(subgroup, &group.id)?;
        }

        for action in &group.actions {
            self.validate_action(action, &group.id)?;
        }

        Ok(())
    }

    fn validate_subgroup(&self, subgroup: &RuleSubGroup, group_id: &str) -> Result<()> {
        let path = format!("{}.{}", group_id, subgroup.id);

        if subgroup.id.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则组 '{}' 中存在空的子组 ID",
                group_id
            )));
        }

        if subgroup.rules.is_empty() {
            return Err(RuleError::ParseError(format!("子组 '{}' 不能为空", path)));
        }

        for rule in &subgroup.rules {
            self.validate_rule(rule, &path)?;
        }

        Ok(())
    }

    /// 验证规则
    fn validate_rule(&self, rule: &Rule, path: &str) -> Result<()> {
        if rule.id.is_empty() {
            return Err(RuleError::ParseError(format!("子组 '{}' 中存在空的规则 ID", path)));
        }

        if rule.field.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则 '{}.{}' 的字段不能为空",
                path, rule.id
            )));
        }

        self.validate_operator_value(rule, path)
    }

    /// 验证操作符和值的兼容性
    fn validate_operator_value(&self, rule: &Rule, path: &str) -> Result<()> {
        let rule_path = format!("{}.{}", path, rule.id);

        match rule.operator {
            Operator::Between => match &rule.value {
                Value::Array(arr) if arr.len() == 2 => {}
                Value::Array(arr) => {
                    return Err(RuleError::ParseError(format!(
                        "规则 '{}' 的 between 操作符需要 [min, max] 数组，当前有 {} 个元素",
                        rule_path,
                        arr.len()
                    )));
                }
                _ => {
                    return Err(RuleError::ParseError(format!(
                        "规则 '{}' 的 between 操作符需要 [min, max] 数组",
                        rule_path
                    )));
                }
            },
            Operator::In | Operator::NotIn => {
                if !rule.value.is_array() {
                    return Err(RuleError::ParseError(format!(
                        "规则 '{}' 的 {} 操作符需要数组值",
                        rule_path, rule.operator
                    )));
                }
            }
            Operator::Regex => {
                let pattern = rule.value.as_str().ok_or_else(|| {
                    RuleError::ParseError(format!(
                        "规则 '{}' 的 regex 操作符需要字符串值",
                        rule_path
                    ))
                })?;
                Regex::new(pattern).map_err(|e| {
                    RuleError::ParseError(format!("规则 '{}' 的正则表达式无效: {}", rule_path, e))
                })?;
            }
            _ => {}
        }

        Ok(())
    }

    /// 验证动作
    fn validate_action(&self, action: &Action, group_id: &str) -> Result<()> {
        if action.field.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则组 '{}' 的动作 '{}' 未指定目标字段",
                group_id, action.id
            )));
        }

        if action.kind == ActionKind::CopyField && action.source_field.is_none() {
            return Err(RuleError::ParseError(format!(
                "规则组 '{}' 的动作 '{}' 需要 source_field",
                group_id, action.id
            )));
        }

        Ok(())
    }

    fn compile_group(&self, group: RuleGroup) -> Result<CompiledGroup> {
        let subgroups = group
            .subgroups
            .into_iter()
            .map(|sg| {
                let rules = sg
                    .rules
                    .into_iter()
                    .map(Self::compile_rule)
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledSubGroup {
                    id: sg.id,
                    intergroup_operator: sg.intergroup_operator,
                    rule_operator: sg.rule_operator,
                    rules,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledGroup {
            id: group.id,
            depends_on: group.depends_on,
            subgroups,
            actions: group.actions,
        })
    }

    fn compile_rule(rule: Rule) -> Result<CompiledRule> {
        let pattern = match (rule.operator, rule.value.as_str()) {
            (Operator::Regex, Some(source)) => Some(
                Regex::new(source)
                    .map_err(|e| RuleError::ParseError(format!("无效的正则表达式: {}", e)))?,
            ),
            _ => None,
        };

        Ok(CompiledRule { rule, pattern })
    }

    /// 收集规则组引用的字段
    fn collect_fields(&self, group: &RuleGroup, fields: &mut HashSet<String>) {
        for subgroup in &group.subgroups {
            for rule in &subgroup.rules {
                fields.insert(rule.field.clone());
            }
        }

        for action in &group.actions {
            fields.insert(action.field.clone());
            if let Some(source) = &action.source_field {
                fields.insert(source.clone());
            }
        }
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}
