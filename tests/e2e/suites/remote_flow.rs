//! 远程评估测试套件
//!
//! 测试评估服务会话：一行一次请求，结束时一次结束标记，字段修改通过响应回传。

use crate::data::*;
use crate::helpers::*;
use crate::setup::{RecordingServer, TestEnvironment};
use crate::assert_summary;
use rule_step::output::OutputMode;
use rule_step::{Cell, StepConfig, Variables};
use tokio::net::TcpListener;

#[cfg(test)]
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_remote_flag_set_when_amount_exceeds_threshold() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("flag.json", FLAG_RULES).unwrap();
        let server = env.start_server().await.unwrap();

        let run = run_step(
            StepConfig::remote("127.0.0.1", server.port_string(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0), flag_row(2, 99.0)],
        )
        .await;

        assert!(run.error.is_none(), "{:?}", run.error);
        let row = &run.main_rows()[0];
        assert_eq!(row[..3], [Cell::Integer(1), Cell::Number(150.0), Cell::Boolean(true)]);
        assert_summary!(row, [1, 0, 0, 1, 0, 1]);
        assert_eq!(run.main_rows()[1][2], Cell::Null);
        assert_summary!(run.main_rows()[1], [1, 1, 0, 1, 1, 0]);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_matches_local() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("orders.json", ORDER_RULES).unwrap();
        let server = env.start_server().await.unwrap();
        let rows = vec![
            order_row(1, 150.0, "VIP-1"),
            order_row(2, 50.0, "X-2"),
            order_row(3, 500.0, "P-3"),
            order_row(4, -1.0, ""),
        ];

        let local = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            order_schema(),
            rows.clone(),
        )
        .await;
        let remote = run_step(
            StepConfig::remote("127.0.0.1", server.port_string(), "valid"),
            order_schema(),
            rows,
        )
        .await;

        assert!(local.error.is_none() && remote.error.is_none());
        assert_eq!(local.main_rows(), remote.main_rows());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_one_exchange_per_row_then_exit() {
        let server = RecordingServer::start().await.unwrap();
        let rows: Vec<_> = (1..=5).map(|i| flag_row(i, 1.0)).collect();

        let run = run_step(
            StepConfig::remote("127.0.0.1", server.port_string(), "valid"),
            flag_schema(),
            rows,
        )
        .await;
        let record = server.finish().await.unwrap();

        assert!(run.error.is_none(), "{:?}", run.error);
        assert_eq!(
            record.labels,
            (1..=5).map(|i| format!("row number: {}", i)).collect::<Vec<_>>()
        );
        assert_eq!(record.exits, 1);
        assert_eq!(record.frames_after_exit, 0);
        assert!(record.closed_by_client);

        // 通过计数被反转为失败计数
        for row in run.main_rows() {
            assert_summary!(row, [2, 1, 0, 5, 2, 0]);
        }
    }

    #[tokio::test]
    async fn test_no_rows_never_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let run = run_step(
            StepConfig::remote("127.0.0.1", port.to_string(), "valid"),
            flag_schema(),
            Vec::new(),
        )
        .await;

        assert!(run.error.is_none());
        assert_eq!(run.report.rows_read, 0);
        assert!(run.main.closed);
    }

    #[tokio::test]
    async fn test_server_address_from_variables() {
        let server = RecordingServer::start().await.unwrap();
        let variables = Variables::new()
            .with("RULE_HOST", "127.0.0.1")
            .with("RULE_PORT", server.port_string());

        let run = run_step_with(
            StepConfig::remote("${RULE_HOST}", "%%RULE_PORT%%", "valid"),
            flag_schema(),
            vec![flag_row(1, 1.0)],
            &variables,
        )
        .await;
        let record = server.finish().await.unwrap();

        assert!(run.error.is_none(), "{:?}", run.error);
        assert_eq!(record.labels.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_has_no_rule_details() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("flag.json", FLAG_RULES).unwrap();
        let server = env.start_server().await.unwrap();

        let run = run_step(
            StepConfig::remote("127.0.0.1", server.port_string(), "valid")
                .with_detail_target("details", OutputMode::AllGroupsAllRules),
            flag_schema(),
            vec![flag_row(1, 150.0)],
        )
        .await;

        assert!(run.error.is_none());
        assert_eq!(run.main_rows().len(), 1);
        assert!(run.detail_rows().is_empty());
        assert!(run.detail.closed);

        server.stop().await.unwrap();
    }
}
