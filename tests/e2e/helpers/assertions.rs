//! 自定义断言宏和辅助函数

use rule_step::output::SUMMARY_COLUMN_COUNT;
use rule_step::{Cell, Row};

/// 读取主输出行末尾的 6 个汇总计数
///
/// 顺序：groups, groups_failed, groups_skipped, rules, rules_failed, actions
pub fn summary_counts(row: &Row) -> [i64; SUMMARY_COLUMN_COUNT] {
    assert!(
        row.len() >= SUMMARY_COLUMN_COUNT,
        "输出行只有 {} 列，不足以包含汇总列",
        row.len()
    );
    let start = row.len() - SUMMARY_COLUMN_COUNT;
    let mut counts = [0; SUMMARY_COLUMN_COUNT];
    for (i, cell) in row[start..].iter().enumerate() {
        counts[i] = cell
            .as_integer()
            .unwrap_or_else(|| panic!("汇总列 {} 不是整数: {:?}", start + i, cell));
    }
    counts
}

/// 断言输出行的汇总计数
#[macro_export]
macro_rules! assert_summary {
    ($row:expr, [$($count:expr),+ $(,)?]) => {
        assert_eq!(
            $crate::helpers::summary_counts(&$row),
            [$($count),+],
            "汇总计数不符: {:?}",
            $row
        );
    };
}

/// 断言所有输出行列数一致
#[macro_export]
macro_rules! assert_uniform_width {
    ($rows:expr, $width:expr) => {
        for (i, row) in $rows.iter().enumerate() {
            assert_eq!(row.len(), $width, "第 {} 行列数应为 {}，实际为 {}", i + 1, $width, row.len());
        }
    };
}

/// 详细输出行中的 (规则组, 规则, 失败标记)
pub fn detail_triples(rows: &[Row], input_width: usize) -> Vec<(String, String, i64)> {
    rows.iter()
        .map(|row| {
            let text = |offset: usize| match &row[input_width + offset] {
                Cell::String(s) => s.clone(),
                other => panic!("详细输出列 {} 不是字符串: {:?}", input_width + offset, other),
            };
            let failed = row[input_width + 7].as_integer().unwrap_or(-1);
            (text(0), text(6), failed)
        })
        .collect()
}
