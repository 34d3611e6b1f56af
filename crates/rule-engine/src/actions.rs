//! 规则动作
//!
//! 规则组评估完成后执行的字段修改。所有写入都经过 `FieldCollection::set`，
//! 因此被修改的字段会带上 `updated` 标记。

use crate::error::{Result, RuleError};
use crate::fields::{FieldCollection, FieldValue};
use crate::models::{Action, ActionKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// 动作执行器
pub struct ActionApplier;

impl ActionApplier {
    /// 对字段集合执行一个动作
    pub fn apply(action: &Action, fields: &mut FieldCollection) -> Result<()> {
        let current = fields
            .get(&action.field)
            .cloned()
            .ok_or_else(|| RuleError::FieldNotFound(action.field.clone()))?;

        let value = match action.kind {
            ActionKind::SetValue => FieldValue::from_json(&action.value, action.value_type)?,
            ActionKind::SetNull => FieldValue::Null,
            ActionKind::CopyField => {
                let source = action.source_field.as_deref().unwrap_or_default();
                fields
                    .get(source)
                    .cloned()
                    .ok_or_else(|| RuleError::FieldNotFound(source.to_string()))?
            }
            ActionKind::Add | ActionKind::Subtract | ActionKind::Multiply => {
                let operand = FieldValue::from_json(&action.value, action.value_type)?;
                Self::arithmetic(action, &current, &operand)?
            }
            ActionKind::Append => {
                let suffix = FieldValue::from_json(&action.value, action.value_type)?;
                match current {
                    FieldValue::Null => FieldValue::String(suffix.to_string()),
                    FieldValue::String(s) => FieldValue::String(format!("{}{}", s, suffix)),
                    other => {
                        return Err(RuleError::TypeMismatch {
                            expected: "string".to_string(),
                            actual: other.type_name().to_string(),
                        });
                    }
                }
            }
        };

        fields.set(&action.field, value)
    }

    /// 数值运算：两个整数保持整数，出现小数类型时提升为 decimal，否则为 double
    fn arithmetic(action: &Action, left: &FieldValue, right: &FieldValue) -> Result<FieldValue> {
        let overflow = || {
            RuleError::ExecutionError(format!(
                "动作 '{}' 在字段 '{}' 上发生数值溢出",
                action.id, action.field
            ))
        };

        match (left, right) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => {
                let result = match action.kind {
                    ActionKind::Add => a.checked_add(*b),
                    ActionKind::Subtract => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                result.map(FieldValue::Integer).ok_or_else(overflow)
            }
            (FieldValue::Decimal(_), _) | (_, FieldValue::Decimal(_)) => {
                let a = Self::to_decimal(left)?;
                let b = Self::to_decimal(right)?;
                let result = match action.kind {
                    ActionKind::Add => a.checked_add(b),
                    ActionKind::Subtract => a.checked_sub(b),
                    _ => a.checked_mul(b),
                };
                result.map(FieldValue::Decimal).ok_or_else(overflow)
            }
            _ => {
                let a = Self::to_number(left)?;
                let b = Self::to_number(right)?;
                let result = match action.kind {
                    ActionKind::Add => a + b,
                    ActionKind::Subtract => a - b,
                    _ => a * b,
                };
                Ok(FieldValue::Double(result))
            }
        }
    }

    fn to_number(value: &FieldValue) -> Result<f64> {
        match value {
            FieldValue::Integer(i) => Ok(*i as f64),
            FieldValue::Double(d) => Ok(*d),
            other => Err(RuleError::TypeMismatch {
                expected: "number".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn to_decimal(value: &FieldValue) -> Result<Decimal> {
        let mismatch = || RuleError::TypeMismatch {
            expected: "number".to_string(),
            actual: value.type_name().to_string(),
        };

        match value {
            FieldValue::Decimal(d) => Ok(*d),
            FieldValue::Integer(i) => Ok(Decimal::from(*i)),
            FieldValue::Double(d) => Decimal::from_f64(*d).ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }
}
