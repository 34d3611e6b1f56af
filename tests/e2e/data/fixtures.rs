//! 测试数据固定装置
//!
//! 提供规则定义、输入列定义和输入行。

use chrono::{TimeZone, Utc};
use rule_step::{Cell, ColumnSchema, ColumnType, Row};

/// amount > 100 时把 flag 置为 true
pub const FLAG_RULES: &str = r#"
{
    "id": "amount_check",
    "subgroups": [{
        "id": "threshold",
        "rules": [{"id": "amount_gt_100", "field": "amount", "operator": "gt", "value": 100}]
    }],
    "actions": [{"id": "set_flag", "field": "flag", "type": "set_value", "value": true}]
}
"#;

/// 订单校验规则项目：3 个规则组，其中一个依赖前一个的结果
pub const ORDER_RULES: &str = r#"
{
    "name": "orders",
    "groups": [
        {
            "id": "amount_check",
            "subgroups": [{
                "id": "range",
                "rules": [
                    {"id": "amount_positive", "field": "amount", "operator": "gt", "value": 0},
                    {"id": "amount_gt_100", "field": "amount", "operator": "gt", "value": 100,
                     "message_failed": "{field} is {value}, expected more than {expected}"}
                ]
            }],
            "actions": [
                {"id": "score", "field": "score", "type": "set_value", "value": 42},
                {"id": "bonus", "field": "bonus", "type": "set_value", "value": "12.345", "value_type": "decimal"}
            ]
        },
        {
            "id": "customer_check",
            "subgroups": [
                {
                    "id": "vip",
                    "rules": [{"id": "vip_prefix", "field": "customer", "operator": "starts_with", "value": "VIP-"}]
                },
                {
                    "id": "partner",
                    "intergroup_operator": "OR",
                    "rules": [{"id": "partner_prefix", "field": "customer", "operator": "starts_with", "value": "P-"}]
                }
            ]
        },
        {
            "id": "flag_customer",
            "depends_on": {"group_id": "customer_check", "run_if": "passed"},
            "subgroups": [{
                "id": "has_id",
                "rules": [{"id": "id_present", "field": "id", "operator": "is_not_empty"}]
            }],
            "actions": [{"id": "set_flag", "field": "flag", "type": "set_value", "value": true}]
        }
    ]
}
"#;

/// 把结果写到 Timestamp 列，输出时必须报错
pub const UNSUPPORTED_OUTPUT_RULES: &str = r#"
{
    "id": "stamp",
    "subgroups": [{
        "id": "s",
        "rules": [{"id": "always", "field": "id", "operator": "is_not_empty"}]
    }],
    "actions": [{"id": "stamp", "field": "checked_at", "type": "set_value",
                 "value": "2024-01-01T00:00:00Z", "value_type": "date"}]
}
"#;

/// 比较字段类型不匹配的规则，评估时报错
pub const BROKEN_RULES: &str = r#"
{
    "id": "broken",
    "subgroups": [{
        "id": "s",
        "rules": [{"id": "amount_before", "field": "amount", "operator": "before", "value": "2024-01-01T00:00:00Z"}]
    }]
}
"#;

/// (id, amount, flag)
pub fn flag_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("id", ColumnType::Integer),
        ("amount", ColumnType::Number),
        ("flag", ColumnType::Boolean),
    ])
    .unwrap()
}

pub fn flag_row(id: i64, amount: f64) -> Row {
    vec![Cell::Integer(id), Cell::Number(amount), Cell::Null]
}

/// (id, amount, customer, flag, score, bonus)
pub fn order_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("id", ColumnType::Integer),
        ("amount", ColumnType::Number),
        ("customer", ColumnType::String),
        ("flag", ColumnType::Boolean),
        ("score", ColumnType::Number),
        ("bonus", ColumnType::BigNumber),
    ])
    .unwrap()
}

pub fn order_row(id: i64, amount: f64, customer: &str) -> Row {
    vec![
        Cell::Integer(id),
        Cell::Number(amount),
        Cell::String(customer.to_string()),
        Cell::Null,
        Cell::Null,
        Cell::Null,
    ]
}

/// (id, checked_at)
pub fn stamp_schema() -> ColumnSchema {
    ColumnSchema::new([("id", ColumnType::Integer), ("checked_at", ColumnType::Timestamp)]).unwrap()
}

pub fn stamp_row(id: i64) -> Row {
    vec![
        Cell::Integer(id),
        Cell::Timestamp(Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()),
    ]
}
