//! 条件评估器
//!
//! 实现各种操作符的评估逻辑。字段值是行中的 `FieldValue`，期望值来自规则定义的 JSON 常量。

use crate::error::{Result, RuleError};
use crate::fields::{FieldValue, json_type_name, parse_datetime};
use crate::operators::Operator;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 行中的字段值，字段不存在时为 None
    /// * `operator` - 操作符
    /// * `expected_value` - 规则中定义的期望值
    /// * `pattern` - 编译期预先构建的正则，仅 regex 操作符使用
    pub fn evaluate(
        field_value: Option<&FieldValue>,
        operator: Operator,
        expected_value: &Value,
        pattern: Option<&Regex>,
    ) -> Result<bool> {
        match operator {
            Operator::IsEmpty => return Ok(Self::is_empty(field_value)),
            Operator::IsNotEmpty => return Ok(!Self::is_empty(field_value)),
            _ => {}
        }

        // 字段不存在或为空值时，其余操作都不成立
        let field_value = match field_value {
            Some(v) if !v.is_null() => v,
            _ => return Ok(false),
        };

        match operator {
            Operator::Eq => Self::eq(field_value, expected_value),
            Operator::Neq => Self::eq(field_value, expected_value).map(|r| !r),
            Operator::Gt => Self::compare(field_value, expected_value, |a, b| a > b),
            Operator::Gte => Self::compare(field_value, expected_value, |a, b| a >= b),
            Operator::Lt => Self::compare(field_value, expected_value, |a, b| a < b),
            Operator::Lte => Self::compare(field_value, expected_value, |a, b| a <= b),
            Operator::Between => Self::between(field_value, expected_value),
            Operator::In => Self::in_list(field_value, expected_value),
            Operator::NotIn => Self::in_list(field_value, expected_value).map(|r| !r),
            Operator::Contains => Self::string_op(field_value, expected_value, |s, e| s.contains(e)),
            Operator::StartsWith => {
                Self::string_op(field_value, expected_value, |s, e| s.starts_with(e))
            }
            Operator::EndsWith => Self::string_op(field_value, expected_value, |s, e| s.ends_with(e)),
            Operator::Regex => Self::regex_match(field_value, expected_value, pattern),
            Operator::Before => Self::time_compare(field_value, expected_value, |a, b| a < b),
            Operator::After => Self::time_compare(field_value, expected_value, |a, b| a > b),
            Operator::IsEmpty | Operator::IsNotEmpty => unreachable!(),
        }
    }

    /// 判断值是否为空
    fn is_empty(value: Option<&FieldValue>) -> bool {
        match value {
            None | Some(FieldValue::Null) => true,
            Some(FieldValue::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// 相等比较
    fn eq(field: &FieldValue, expected: &Value) -> Result<bool> {
        // 数值统一转为浮点数比较，避免 100 与 100.0 不相等
        if let (Some(f1), Some(f2)) = (Self::field_number(field), Self::json_number(expected)) {
            return Ok((f1 - f2).abs() < f64::EPSILON);
        }

        Ok(match (field, expected) {
            (FieldValue::Boolean(a), Value::Bool(b)) => a == b,
            (FieldValue::String(a), Value::String(b)) => a == b,
            (FieldValue::Date(a), Value::String(b)) => parse_datetime(b).is_some_and(|b| *a == b),
            _ => false,
        })
    }

    /// 数值比较
    fn compare<F>(field: &FieldValue, expected: &Value, cmp: F) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        let field_num = field.as_f64().ok_or_else(|| RuleError::TypeMismatch {
            expected: "number".to_string(),
            actual: field.type_name().to_string(),
        })?;

        let expected_num = Self::json_number(expected).ok_or_else(|| RuleError::TypeMismatch {
            expected: "number".to_string(),
            actual: json_type_name(expected).to_string(),
        })?;

        Ok(cmp(field_num, expected_num))
    }

    /// 范围比较 (between)，expected 应为 [min, max] 数组
    fn between(field: &FieldValue, expected: &Value) -> Result<bool> {
        let arr = expected.as_array().ok_or_else(|| RuleError::TypeMismatch {
            expected: "array [min, max]".to_string(),
            actual: json_type_name(expected).to_string(),
        })?;

        if arr.len() != 2 {
            return Err(RuleError::ParseError(
                "between 操作符需要 [min, max] 数组".to_string(),
            ));
        }

        Ok(Self::compare(field, &arr[0], |a, b| a >= b)?
            && Self::compare(field, &arr[1], |a, b| a <= b)?)
    }

    /// 列表包含检查 (in)
    fn in_list(field: &FieldValue, expected: &Value) -> Result<bool> {
        let arr = expected.as_array().ok_or_else(|| RuleError::TypeMismatch {
            expected: "array".to_string(),
            actual: json_type_name(expected).to_string(),
        })?;

        for item in arr {
            if Self::eq(field, item)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// 字符串操作（包含、前缀、后缀）
    fn string_op<F>(field: &FieldValue, expected: &Value, op: F) -> Result<bool>
    where
        F: Fn(&str, &str) -> bool,
    {
        let s = field.as_str().ok_or_else(|| RuleError::TypeMismatch {
            expected: "string".to_string(),
            actual: field.type_name().to_string(),
        })?;

        let other = expected.as_str().ok_or_else(|| RuleError::TypeMismatch {
            expected: "string".to_string(),
            actual: json_type_name(expected).to_string(),
        })?;

        Ok(op(s, other))
    }

    /// 正则表达式匹配
    fn regex_match(field: &FieldValue, expected: &Value, pattern: Option<&Regex>) -> Result<bool> {
        let s = field.as_str().ok_or_else(|| RuleError::TypeMismatch {
            expected: "string".to_string(),
            actual: field.type_name().to_string(),
        })?;

        match pattern {
            Some(regex) => Ok(regex.is_match(s)),
            None => {
                let source = expected.as_str().ok_or_else(|| RuleError::TypeMismatch {
                    expected: "string (regex pattern)".to_string(),
                    actual: json_type_name(expected).to_string(),
                })?;
                let regex = Regex::new(source).map_err(|e| {
                    RuleError::ParseError(format!("无效的正则表达式 '{}': {}", source, e))
                })?;
                Ok(regex.is_match(s))
            }
        }
    }

    /// 时间比较
    fn time_compare<F>(field: &FieldValue, expected: &Value, cmp: F) -> Result<bool>
    where
        F: Fn(DateTime<Utc>, DateTime<Utc>) -> bool,
    {
        let field_time = field.as_date().ok_or_else(|| RuleError::TypeMismatch {
            expected: "date".to_string(),
            actual: field.type_name().to_string(),
        })?;

        let expected_time = expected
            .as_str()
            .and_then(parse_datetime)
            .ok_or_else(|| RuleError::ParseError(format!("无法解析日期时间: '{}'", expected)))?;

        Ok(cmp(field_time, expected_time))
    }

    /// 数值型字段的浮点视图（字符串字段不参与相等的数值比较）
    fn field_number(value: &FieldValue) -> Option<f64> {
        match value {
            FieldValue::String(_) => None,
            other => other.as_f64(),
        }
    }

    /// 尝试将 JSON 常量转换为 f64
    fn json_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
