//! 列定义与单元格
//!
//! 行是按位置排列的强类型单元格，列定义在步骤实例内构造一次后不再变化。

use crate::error::{Result, StepError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 列的语义类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    String,
    Integer,
    /// 二进制浮点数
    Number,
    /// 任意精度小数
    BigNumber,
    Date,
    Timestamp,
    Binary,
}

impl ColumnType {
    /// 引擎修改后的值能否写回该类型的列
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Timestamp | Self::Binary)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Number => "Number",
            Self::BigNumber => "BigNumber",
            Self::Date => "Date",
            Self::Timestamp => "Timestamp",
            Self::Binary => "Binary",
        };
        write!(f, "{}", s)
    }
}

/// 单元格值
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Boolean(bool),
    String(String),
    Integer(i64),
    Number(f64),
    BigNumber(Decimal),
    Date(DateTime<Utc>),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Self::BigNumber(value)
    }
}

/// 一行数据
pub type Row = Vec<Cell>;

/// 列元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
}

/// 有序列定义，列名唯一
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<ColumnMeta>,
    index: HashMap<String, usize>,
}

impl ColumnSchema {
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        let mut schema = Self::default();
        for (name, column_type) in columns {
            schema.push(name.into(), column_type)?;
        }
        Ok(schema)
    }

    fn push(&mut self, name: String, column_type: ColumnType) -> Result<()> {
        if name.is_empty() {
            return Err(StepError::Schema("列名不能为空".to_string()));
        }
        if self.index.contains_key(&name) {
            return Err(StepError::Schema(format!("列名重复: {}", name)));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push(ColumnMeta { name, column_type });
        Ok(())
    }

    /// 在当前列之后追加列，返回新的列定义
    pub fn extend<'a, I>(&self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, ColumnType)>,
    {
        let mut schema = self.clone();
        for (name, column_type) in extra {
            schema.push(name.to_string(), column_type)?;
        }
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnMeta> {
        self.columns.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
