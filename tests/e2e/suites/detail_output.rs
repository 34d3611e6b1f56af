//! 详细输出测试套件
//!
//! 测试五种输出模式下的详细输出行数和内容。

use crate::assert_uniform_width;
use crate::data::*;
use crate::helpers::*;
use crate::setup::TestEnvironment;
use rule_step::output::{DETAIL_COLUMN_COUNT, OutputMode};
use rule_step::{Cell, StepConfig};

const INPUT_WIDTH: usize = 6;

async fn run_orders(mode: OutputMode) -> StepRun {
    let env = TestEnvironment::setup().unwrap();
    env.add_file("orders.json", ORDER_RULES).unwrap();

    // 第 1 行三个规则组都通过，第 2 行两个失败一个跳过
    run_step(
        StepConfig::local(env.rule_dir_str(), "valid").with_detail_target("details", mode),
        order_schema(),
        vec![order_row(1, 150.0, "VIP-1"), order_row(2, 50.0, "X-2")],
    )
    .await
}

fn triples(run: &StepRun) -> Vec<(String, String, i64)> {
    detail_triples(run.detail_rows(), INPUT_WIDTH)
}

fn owned(expected: &[(&str, &str, i64)]) -> Vec<(String, String, i64)> {
    expected
        .iter()
        .map(|(g, r, f)| (g.to_string(), r.to_string(), *f))
        .collect()
}

#[cfg(test)]
mod mode_tests {
    use super::*;

    #[tokio::test]
    async fn test_all_groups_all_rules() {
        let run = run_orders(OutputMode::AllGroupsAllRules).await;

        assert!(run.error.is_none(), "{:?}", run.error);
        assert_eq!(run.report.detail_rows_written, 9);
        assert_uniform_width!(run.detail_rows(), INPUT_WIDTH + DETAIL_COLUMN_COUNT);
        assert_eq!(
            triples(&run),
            owned(&[
                ("amount_check", "amount_positive", 0),
                ("amount_check", "amount_gt_100", 0),
                ("customer_check", "vip_prefix", 0),
                ("customer_check", "partner_prefix", 1),
                ("flag_customer", "id_present", 0),
                ("amount_check", "amount_positive", 0),
                ("amount_check", "amount_gt_100", 1),
                ("customer_check", "vip_prefix", 1),
                ("customer_check", "partner_prefix", 1),
            ])
        );
    }

    #[tokio::test]
    async fn test_failed_groups_failed_rules() {
        let run = run_orders(OutputMode::FailedGroupsFailedRules).await;

        assert!(run.error.is_none());
        assert_eq!(
            triples(&run),
            owned(&[
                ("amount_check", "amount_gt_100", 1),
                ("customer_check", "vip_prefix", 1),
                ("customer_check", "partner_prefix", 1),
            ])
        );
        // 只包含第 2 行
        assert!(run.detail_rows().iter().all(|row| row[0] == Cell::Integer(2)));
        assert_eq!(run.main_rows().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_groups_all_rules() {
        let run = run_orders(OutputMode::FailedGroupsAllRules).await;

        assert!(run.error.is_none());
        assert_eq!(run.report.detail_rows_written, 4);
        assert!(run.detail_rows().iter().all(|row| row[INPUT_WIDTH + 1] == Cell::Integer(1)));
    }

    #[tokio::test]
    async fn test_passed_groups_failed_rules() {
        let run = run_orders(OutputMode::PassedGroupsFailedRules).await;

        assert!(run.error.is_none());
        assert_eq!(triples(&run), owned(&[("customer_check", "partner_prefix", 1)]));
    }

    #[tokio::test]
    async fn test_passed_groups_all_rules() {
        let run = run_orders(OutputMode::PassedGroupsAllRules).await;

        assert!(run.error.is_none());
        assert_eq!(run.report.detail_rows_written, 5);
        assert!(run.detail_rows().iter().all(|row| row[0] == Cell::Integer(1)));
    }
}

#[cfg(test)]
mod content_tests {
    use super::*;

    #[tokio::test]
    async fn test_detail_rows_carry_updated_input() {
        let run = run_orders(OutputMode::AllGroupsAllRules).await;

        let first = &run.detail_rows()[0];
        assert_eq!(first[3], Cell::Boolean(true));
        assert_eq!(first[4], Cell::Number(42.0));
        assert_eq!(first[INPUT_WIDTH + 2], Cell::String("range".to_string()));
        assert_eq!(first[INPUT_WIDTH + 5], Cell::String("AND".to_string()));

        let partner = &run.detail_rows()[3];
        assert_eq!(partner[INPUT_WIDTH + 4], Cell::String("OR".to_string()));
    }

    #[tokio::test]
    async fn test_failure_message_template() {
        let run = run_orders(OutputMode::FailedGroupsFailedRules).await;

        match &run.detail_rows()[0][INPUT_WIDTH + 8] {
            Cell::String(message) => {
                assert!(message.starts_with("amount is "), "{}", message);
                assert!(message.ends_with("expected more than 100"), "{}", message);
            }
            other => panic!("消息列不是字符串: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detail_target_same_as_main_is_disabled() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("orders.json", ORDER_RULES).unwrap();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid")
                .with_detail_target("valid", OutputMode::AllGroupsAllRules),
            order_schema(),
            vec![order_row(1, 150.0, "VIP-1")],
        )
        .await;

        assert!(run.error.is_none());
        assert!(run.detail_rows().is_empty());
        assert_eq!(run.report.detail_rows_written, 0);
    }
}
