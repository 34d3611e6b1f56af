//! 行字段模型
//!
//! 规则引擎只认识按名称寻址的动态字段。`FieldCollection` 在构造后长度和字段名固定，
//! 只有字段值和 `updated` 标记会被规则动作修改。

use crate::error::{Result, RuleError};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 动态字段值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Boolean(bool),
    String(String),
    Integer(i64),
    Double(#[serde(with = "double_repr")] f64),
    Decimal(Decimal),
    Date(DateTime<Utc>),
}

/// 浮点数的序列化形式
///
/// JSON 没有 NaN 和无穷大，有限值写成数字，非有限值写成 `"NaN"`、`"inf"`、`"-inf"`。
mod double_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("无效的浮点数: {}", other))),
            },
        }
    }
}

/// 规则定义中常量值的类型提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    String,
    Integer,
    Double,
    Decimal,
    Date,
}

impl FieldValue {
    /// 类型名称（用于错误信息和日志）
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 数值视图，字符串会尝试解析
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::Decimal(d) => d.to_f64(),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// 日期视图，字符串按 RFC3339 或 `YYYY-MM-DD` 解析
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            Self::String(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// 按类型提示把 JSON 常量转换为字段值
    pub fn from_json(value: &Value, hint: Option<ValueType>) -> Result<Self> {
        let mismatch = |expected: &str| RuleError::TypeMismatch {
            expected: expected.to_string(),
            actual: json_type_name(value).to_string(),
        };

        match hint {
            None => match value {
                Value::Null => Ok(Self::Null),
                Value::Bool(b) => Ok(Self::Boolean(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Self::Integer(i)),
                    None => n.as_f64().map(Self::Double).ok_or_else(|| mismatch("number")),
                },
                Value::String(s) => Ok(Self::String(s.clone())),
                Value::Array(_) | Value::Object(_) => Err(mismatch("scalar")),
            },
            Some(_) if value.is_null() => Ok(Self::Null),
            Some(ValueType::Boolean) => value.as_bool().map(Self::Boolean).ok_or_else(|| mismatch("boolean")),
            Some(ValueType::String) => match value {
                Value::String(s) => Ok(Self::String(s.clone())),
                Value::Bool(_) | Value::Number(_) => Ok(Self::String(value.to_string())),
                _ => Err(mismatch("string")),
            },
            Some(ValueType::Integer) => match value {
                Value::Number(n) => n.as_i64().map(Self::Integer).ok_or_else(|| mismatch("integer")),
                Value::String(s) => s.trim().parse().map(Self::Integer).map_err(|_| mismatch("integer")),
                _ => Err(mismatch("integer")),
            },
            Some(ValueType::Double) => match value {
                Value::Number(n) => n.as_f64().map(Self::Double).ok_or_else(|| mismatch("double")),
                Value::String(s) => s.trim().parse().map(Self::Double).map_err(|_| mismatch("double")),
                _ => Err(mismatch("double")),
            },
            Some(ValueType::Decimal) => match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Self::Decimal(Decimal::from(i))),
                    None => n
                        .as_f64()
                        .and_then(Decimal::from_f64)
                        .map(Self::Decimal)
                        .ok_or_else(|| mismatch("decimal")),
                },
                Value::String(s) => Decimal::from_str(s.trim())
                    .map(Self::Decimal)
                    .map_err(|_| mismatch("decimal")),
                _ => Err(mismatch("decimal")),
            },
            Some(ValueType::Date) => value
                .as_str()
                .and_then(parse_datetime)
                .map(Self::Date)
                .ok_or_else(|| mismatch("date string")),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

/// 解析日期时间
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 带更新标记的命名字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedField {
    pub name: String,
    pub value: FieldValue,
    #[serde(default)]
    pub updated: bool,
}

impl NamedField {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            updated: false,
        }
    }
}

/// 一行数据的字段集合
///
/// 每行新建一次，行输出后丢弃。`updated` 只会从 false 变为 true。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCollection {
    fields: IndexMap<String, NamedField>,
    updated_count: usize,
}

impl FieldCollection {
    /// 从 (名称, 值) 序列构造，字段名必须唯一
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        Self::from_named(
            fields
                .into_iter()
                .map(|(name, value)| NamedField::new(name, value)),
        )
    }

    /// 从命名字段构造，保留已有的 `updated` 标记
    pub fn from_named<I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = NamedField>,
    {
        let iter = fields.into_iter();
        let mut map = IndexMap::with_capacity(iter.size_hint().0);
        let mut updated_count = 0;

        for field in iter {
            if field.updated {
                updated_count += 1;
            }
            if map.contains_key(&field.name) {
                return Err(RuleError::DuplicateField(field.name));
            }
            map.insert(field.name.clone(), field);
        }

        Ok(Self {
            fields: map,
            updated_count,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按名称获取字段值
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|f| &f.value)
    }

    /// 按名称获取字段
    pub fn field(&self, name: &str) -> Option<&NamedField> {
        self.fields.get(name)
    }

    /// 按位置获取字段
    pub fn field_at(&self, index: usize) -> Option<&NamedField> {
        self.fields.get_index(index).map(|(_, f)| f)
    }

    /// 字段位置
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedField> {
        self.fields.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// 写入字段值并标记为已更新
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| RuleError::FieldNotFound(name.to_string()))?;
        self.set_at(index, value)
    }

    /// 按位置写入字段值并标记为已更新
    pub fn set_at(&mut self, index: usize, value: FieldValue) -> Result<()> {
        let (_, field) = self
            .fields
            .get_index_mut(index)
            .ok_or_else(|| RuleError::FieldNotFound(format!("#{}", index)))?;

        field.value = value;
        if !field.updated {
            field.updated = true;
            self.updated_count += 1;
        }

        Ok(())
    }

    /// 是否有任意字段被规则动作修改
    pub fn any_updated(&self) -> bool {
        self.updated_count > 0
    }

    pub fn updated_count(&self) -> usize {
        self.updated_count
    }

    /// 复制为命名字段列表（用于远程传输）
    pub fn to_named(&self) -> Vec<NamedField> {
        self.fields.values().cloned().collect()
    }

    pub fn into_named(self) -> Vec<NamedField> {
        self.fields.into_values().collect()
    }
}
