//! 本地评估测试套件
//!
//! 测试规则来源解析、字段修改写回和主输出汇总列。

use crate::data::*;
use crate::helpers::*;
use crate::setup::TestEnvironment;
use crate::{assert_summary, assert_uniform_width};
use rule_step::output::SUMMARY_COLUMN_COUNT;
use rule_step::{Cell, StepConfig, Variables};
use rust_decimal::Decimal;
use std::str::FromStr;

#[cfg(test)]
mod source_tests {
    use super::*;

    #[tokio::test]
    async fn test_flag_set_when_amount_exceeds_threshold() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("flag.json", FLAG_RULES).unwrap();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0)],
        )
        .await;

        assert!(run.error.is_none(), "{:?}", run.error);
        let row = &run.main_rows()[0];
        assert_eq!(row[..3], [Cell::Integer(1), Cell::Number(150.0), Cell::Boolean(true)]);
        assert_summary!(row, [1, 0, 0, 1, 0, 1]);
    }

    #[tokio::test]
    async fn test_single_file_source() {
        let env = TestEnvironment::setup().unwrap();
        let file = env.add_file("flag.json", FLAG_RULES).unwrap();

        let run = run_step(
            StepConfig::local(file.display().to_string(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0), flag_row(2, 10.0)],
        )
        .await;

        assert!(run.error.is_none());
        assert_eq!(run.main_rows()[0][2], Cell::Boolean(true));
        assert_eq!(run.main_rows()[1][2], Cell::Null);
    }

    #[tokio::test]
    async fn test_archive_source() {
        let env = TestEnvironment::setup().unwrap();
        let archive = env
            .add_archive(
                "rules.zip",
                &[("flag.json", FLAG_RULES), ("notes.txt", "not a rule file")],
            )
            .unwrap();

        let run = run_step(
            StepConfig::local(archive.display().to_string(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0)],
        )
        .await;

        assert!(run.error.is_none(), "{:?}", run.error);
        assert_eq!(run.main_rows()[0][2], Cell::Boolean(true));
        assert_summary!(run.main_rows()[0], [1, 0, 0, 1, 0, 1]);
    }

    #[tokio::test]
    async fn test_rule_source_variable_substitution() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("flag.json", FLAG_RULES).unwrap();
        let variables = Variables::new().with("RULES_HOME", env.rule_dir_str());

        let run = run_step_with(
            StepConfig::local("${RULES_HOME}", "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0)],
            &variables,
        )
        .await;

        assert!(run.error.is_none(), "{:?}", run.error);
        assert_eq!(run.main_rows()[0][2], Cell::Boolean(true));
    }

    #[tokio::test]
    async fn test_directory_without_rule_files_passes_rows_through() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("README.txt", "no rules here").unwrap();
        let rows = vec![flag_row(1, 150.0), flag_row(2, 5.0), flag_row(3, 0.0)];

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            flag_schema(),
            rows.clone(),
        )
        .await;

        assert!(run.error.is_none(), "{:?}", run.error);
        assert_eq!(run.report.rows_written, 3);
        for (input, output) in rows.iter().zip(run.main_rows()) {
            assert_eq!(&output[..3], &input[..]);
            assert_summary!(output, [0, 0, 0, 0, 0, 0]);
        }
    }
}

#[cfg(test)]
mod bridge_tests {
    use super::*;

    #[tokio::test]
    async fn test_rows_without_actions_are_unchanged() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("flag.json", FLAG_RULES).unwrap();
        let rows: Vec<_> = (1..=20).map(|i| flag_row(i, i as f64)).collect();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            flag_schema(),
            rows.clone(),
        )
        .await;

        assert!(run.error.is_none());
        assert_uniform_width!(run.main_rows(), 3 + SUMMARY_COLUMN_COUNT);
        for (input, output) in rows.iter().zip(run.main_rows()) {
            assert_eq!(&output[..3], &input[..]);
            assert_summary!(output, [1, 1, 0, 1, 1, 0]);
        }
    }

    #[tokio::test]
    async fn test_action_values_coerced_to_column_types() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("orders.json", ORDER_RULES).unwrap();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            order_schema(),
            vec![order_row(1, 150.0, "VIP-1"), order_row(2, 50.0, "X-2")],
        )
        .await;

        assert!(run.error.is_none(), "{:?}", run.error);
        let passed = &run.main_rows()[0];
        assert_eq!(passed[3], Cell::Boolean(true));
        // 整数 42 写入浮点列
        assert_eq!(passed[4], Cell::Number(42.0));
        assert_eq!(passed[5], Cell::BigNumber(Decimal::from_str("12.345").unwrap()));
        assert_summary!(passed, [3, 0, 0, 5, 1, 3]);

        // customer_check 失败，flag_customer 被跳过
        let failed = &run.main_rows()[1];
        assert_eq!(failed[..6], order_row(2, 50.0, "X-2")[..]);
        assert_summary!(failed, [3, 2, 1, 4, 3, 0]);
    }

    #[tokio::test]
    async fn test_summary_counters_are_consistent() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("orders.json", ORDER_RULES).unwrap();
        let customers = ["VIP-1", "P-7", "X-2", ""];
        let rows: Vec<_> = (0..40)
            .map(|i| order_row(i, (i * 7) as f64, customers[i as usize % customers.len()]))
            .collect();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            order_schema(),
            rows,
        )
        .await;

        assert!(run.error.is_none());
        assert_eq!(run.report.rows_written, 40);
        for row in run.main_rows() {
            let [groups, groups_failed, groups_skipped, rules, rules_failed, _] = summary_counts(row);
            assert!(groups_failed + groups_skipped <= groups);
            assert!(rules_failed <= rules);
        }
    }
}
