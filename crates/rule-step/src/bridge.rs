//! 行与字段集合之间的转换
//!
//! 输入方向：按位置把单元格包装成引擎的动态字段，Timestamp 归并为 Date，
//! Binary 对引擎不透明，以 Null 交给引擎。
//!
//! 输出方向：只有 `updated` 的字段需要转换回列的声明类型。没有任何字段被修改时
//! 直接返回原始行。所有字段的转换失败汇总成一个错误。

use crate::error::{BridgeError, CoercionFailure};
use crate::schema::{Cell, ColumnSchema, ColumnType, Row};
use rule_engine::{FieldCollection, FieldValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::trace;

/// 把一行单元格转换为字段集合
pub fn to_field_collection(schema: &ColumnSchema, row: &[Cell]) -> Result<FieldCollection, BridgeError> {
    check_width(schema, row.len())?;

    let fields = schema
        .columns()
        .iter()
        .zip(row)
        .map(|(column, cell)| (column.name.as_str(), to_field_value(cell)));

    Ok(FieldCollection::new(fields)?)
}

/// 把被修改的字段写回行
pub fn from_field_collection(
    schema: &ColumnSchema,
    mut row: Row,
    fields: &FieldCollection,
) -> Result<Row, BridgeError> {
    if !fields.any_updated() {
        return Ok(row);
    }

    check_width(schema, row.len())?;
    check_width(schema, fields.len())?;

    let mut failures = Vec::new();
    for (index, (column, field)) in schema.columns().iter().zip(fields.iter()).enumerate() {
        if !field.updated {
            continue;
        }

        match coerce(column.column_type, &field.value) {
            Ok(cell) => {
                trace!(field = %field.name, value = %field.value, "字段已被规则修改");
                row[index] = cell;
            }
            Err(value_type) => failures.push(CoercionFailure {
                field: field.name.clone(),
                column_type: column.column_type,
                value_type,
            }),
        }
    }

    if failures.is_empty() {
        Ok(row)
    } else {
        Err(BridgeError::Coercion(failures))
    }
}

fn check_width(schema: &ColumnSchema, actual: usize) -> Result<(), BridgeError> {
    if schema.len() != actual {
        return Err(BridgeError::WidthMismatch {
            expected: schema.len(),
            actual,
        });
    }
    Ok(())
}

/// 单元格到引擎字段值
pub fn to_field_value(cell: &Cell) -> FieldValue {
    match cell {
        Cell::Null | Cell::Binary(_) => FieldValue::Null,
        Cell::Boolean(b) => FieldValue::Boolean(*b),
        Cell::String(s) => FieldValue::String(s.clone()),
        Cell::Integer(i) => FieldValue::Integer(*i),
        Cell::Number(n) => FieldValue::Double(*n),
        Cell::BigNumber(d) => FieldValue::Decimal(*d),
        Cell::Date(d) | Cell::Timestamp(d) => FieldValue::Date(*d),
    }
}

/// 把引擎字段值转换为列的声明类型，失败时返回值的类型名
pub fn coerce(column_type: ColumnType, value: &FieldValue) -> Result<Cell, &'static str> {
    let mismatch = || value.type_name();

    if !column_type.is_writable() {
        return Err(mismatch());
    }
    if value.is_null() {
        return Ok(Cell::Null);
    }

    match column_type {
        ColumnType::Boolean => match value {
            FieldValue::Boolean(b) => Ok(Cell::Boolean(*b)),
            _ => Err(mismatch()),
        },
        ColumnType::String => match value {
            FieldValue::String(s) => Ok(Cell::String(s.clone())),
            other => Ok(Cell::String(other.to_string())),
        },
        ColumnType::Integer => match value {
            FieldValue::Integer(i) => Ok(Cell::Integer(*i)),
            FieldValue::Double(d) => integral_f64(*d).map(Cell::Integer).ok_or_else(mismatch),
            FieldValue::Decimal(d) if d.fract().is_zero() => {
                d.to_i64().map(Cell::Integer).ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        },
        ColumnType::Number => match value {
            FieldValue::Integer(i) => Ok(Cell::Number(*i as f64)),
            FieldValue::Double(d) => Ok(Cell::Number(*d)),
            FieldValue::Decimal(d) => d.to_f64().map(Cell::Number).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        // 整数走精确构造，浮点数走 f64 构造，避免先转成浮点再转回来
        ColumnType::BigNumber => match value {
            FieldValue::Integer(i) => Ok(Cell::BigNumber(Decimal::from(*i))),
            FieldValue::Double(d) => Decimal::from_f64(*d).map(Cell::BigNumber).ok_or_else(mismatch),
            FieldValue::Decimal(d) => Ok(Cell::BigNumber(*d)),
            _ => Err(mismatch()),
        },
        ColumnType::Date => match value {
            FieldValue::Date(d) => Ok(Cell::Date(*d)),
            _ => Err(mismatch()),
        },
        ColumnType::Timestamp | ColumnType::Binary => Err(mismatch()),
    }
}

/// 没有小数部分且在 i64 范围内的浮点数
fn integral_f64(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}
