//! 规则执行器
//!
//! 对一行字段执行全部规则组。与短路求值不同，这里每条规则都会被评估，
//! 因为详细输出需要每条规则的结果。

use crate::actions::ActionApplier;
use crate::compiler::{CompiledGroup, CompiledRule, CompiledRuleSet, CompiledSubGroup};
use crate::error::Result;
use crate::evaluator::ConditionEvaluator;
use crate::fields::FieldCollection;
use crate::models::{
    EvaluationSummary, GroupResult, Outcome, RowEvaluation, RuleResult, SubgroupResult,
};
use std::collections::HashMap;
use tracing::trace;

/// 规则执行器
pub struct RuleExecutor {
    /// 是否保留每条规则的执行结果
    retain_details: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self {
            retain_details: false,
        }
    }

    /// 保留每条规则的执行结果
    pub fn with_details(mut self) -> Self {
        self.retain_details = true;
        self
    }

    pub fn set_retain_details(&mut self, retain: bool) {
        self.retain_details = retain;
    }

    pub fn retains_details(&self) -> bool {
        self.retain_details
    }

    /// 执行规则集，动作会直接修改 `fields`
    pub fn execute(
        &self,
        rules: &CompiledRuleSet,
        label: &str,
        fields: &mut FieldCollection,
    ) -> Result<RowEvaluation> {
        let mut summary = EvaluationSummary {
            groups_total: rules.groups.len() as u64,
            ..Default::default()
        };
        let mut outcomes: HashMap<&str, Outcome> = HashMap::with_capacity(rules.groups.len());
        let mut groups = Vec::with_capacity(rules.groups.len());

        for group in &rules.groups {
            if !Self::dependency_satisfied(group, &outcomes) {
                trace!(label, group_id = %group.id, "规则组依赖条件不满足，跳过");
                summary.groups_skipped += 1;
                groups.push(GroupResult {
                    id: group.id.clone(),
                    failed: 0,
                    skipped: true,
                    subgroups: Vec::new(),
                });
                continue;
            }

            let result = self.evaluate_group(group, fields, &mut summary)?;
            let outcome = Outcome::from_passed(result.failed == 0);
            if outcome == Outcome::Failed {
                summary.groups_failed += 1;
            }

            for action in group.actions.iter().filter(|a| a.execute_if == outcome) {
                ActionApplier::apply(action, fields)?;
                summary.actions_total += 1;
                trace!(label, group_id = %group.id, action_id = %action.id, field = %action.field, "动作已执行");
            }

            outcomes.insert(group.id.as_str(), outcome);
            groups.push(result);
        }

        Ok(RowEvaluation {
            label: label.to_string(),
            groups,
            summary,
        })
    }

    /// 被依赖组未执行（跳过或已失效）时视为不满足
    fn dependency_satisfied(group: &CompiledGroup, outcomes: &HashMap<&str, Outcome>) -> bool {
        match &group.depends_on {
            None => true,
            Some(dep) => outcomes.get(dep.group_id.as_str()) == Some(&dep.run_if),
        }
    }

    /// 评估规则组：子组结果按各自的 intergroup_operator 从左到右组合
    fn evaluate_group(
        &self,
        group: &CompiledGroup,
        fields: &FieldCollection,
        summary: &mut EvaluationSummary,
    ) -> Result<GroupResult> {
        let mut passed: Option<bool> = None;
        let mut subgroups = Vec::with_capacity(group.subgroups.len());

        for subgroup in &group.subgroups {
            let result = self.evaluate_subgroup(subgroup, fields, summary)?;
            let sub_passed = result.failed == 0;
            passed = Some(match passed {
                None => sub_passed,
                Some(acc) => subgroup.intergroup_operator.combine(acc, sub_passed),
            });
            subgroups.push(result);
        }

        Ok(GroupResult {
            id: group.id.clone(),
            failed: u8::from(!passed.unwrap_or(true)),
            skipped: false,
            subgroups,
        })
    }

    /// 评估子组
    fn evaluate_subgroup(
        &self,
        subgroup: &CompiledSubGroup,
        fields: &FieldCollection,
        summary: &mut EvaluationSummary,
    ) -> Result<SubgroupResult> {
        let mut passed: Option<bool> = None;
        let mut results = Vec::new();

        for rule in &subgroup.rules {
            let (rule_passed, message) = Self::evaluate_rule(rule, fields)?;
            summary.rules_total += 1;
            if !rule_passed {
                summary.rules_failed += 1;
            }

            trace!(
                subgroup_id = %subgroup.id,
                rule_id = %rule.rule.id,
                passed = rule_passed,
                "{}",
                message
            );

            passed = Some(match passed {
                None => rule_passed,
                Some(acc) => subgroup.rule_operator.combine(acc, rule_passed),
            });

            if self.retain_details {
                results.push(RuleResult {
                    rule_id: rule.rule.id.clone(),
                    failed: u8::from(!rule_passed),
                    message,
                });
            }
        }

        Ok(SubgroupResult {
            id: subgroup.id.clone(),
            failed: u8::from(!passed.unwrap_or(true)),
            intergroup_operator: subgroup.intergroup_operator,
            rule_operator: subgroup.rule_operator,
            results,
        })
    }

    /// 评估单条规则，返回是否通过和结果消息
    fn evaluate_rule(rule: &CompiledRule, fields: &FieldCollection) -> Result<(bool, String)> {
        let definition = &rule.rule;
        let field_value = fields.get(&definition.field);

        let passed = ConditionEvaluator::evaluate(
            field_value,
            definition.operator,
            &definition.value,
            rule.pattern.as_ref(),
        )?;

        let actual = field_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<missing>".to_string());

        let template = if passed {
            definition.message_passed.as_deref()
        } else {
            definition.message_failed.as_deref()
        };

        let message = match template {
            Some(template) => template
                .replace("{field}", &definition.field)
                .replace("{value}", &actual)
                .replace("{expected}", &definition.value.to_string()),
            None => format!(
                "{} [{}] {} {} => {}",
                definition.field,
                actual,
                definition.operator,
                definition.value,
                if passed { "passed" } else { "failed" }
            ),
        };

        Ok((passed, message))
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}
