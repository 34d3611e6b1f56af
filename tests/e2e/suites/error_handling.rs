//! 错误处理测试套件
//!
//! 所有错误都终止整个行流：记录一个错误，正在处理的行不输出，输出通道被关闭。

use crate::data::*;
use crate::helpers::*;
use crate::setup::TestEnvironment;
use rule_engine::ProtocolError;
use rule_step::{BridgeError, StepConfig, StepError};
use tokio::net::TcpListener;

const BAD_INTEGER_RULES: &str = r#"
{
    "id": "overwrite_id",
    "subgroups": [{
        "id": "s",
        "rules": [{"id": "big", "field": "amount", "operator": "gt", "value": 100}]
    }],
    "actions": [{"id": "id_text", "field": "id", "type": "set_value", "value": "not a number"}]
}
"#;

#[cfg(test)]
mod local_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_rule_source_fails_before_any_row() {
        let env = TestEnvironment::setup().unwrap();
        let missing = env.rule_dir().join("nowhere");

        let run = run_step(
            StepConfig::local(missing.display().to_string(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0), flag_row(2, 1.0)],
        )
        .await;

        let err = run.error.as_ref().expect("应该失败");
        assert!(err.is_initialization_error());
        assert_eq!(err.code(), "STEP_RULE_SOURCE");
        assert!(run.main_rows().is_empty());
        assert_eq!(run.report.errors, 1);
        assert!(run.main.closed && run.detail.closed);
    }

    #[tokio::test]
    async fn test_unparseable_rule_file() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("broken.json", "{ not json").unwrap();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0)],
        )
        .await;

        assert!(matches!(run.error, Some(StepError::RuleSource(_))));
        assert!(run.main_rows().is_empty());
    }

    #[tokio::test]
    async fn test_evaluation_error_stops_stream() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("broken.json", BROKEN_RULES).unwrap();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0), flag_row(2, 1.0), flag_row(3, 7.0)],
        )
        .await;

        match run.error {
            Some(StepError::Evaluation { ref label, .. }) => assert_eq!(label, "row number: 1"),
            ref other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(run.report.rows_read, 1);
        assert_eq!(run.report.rows_written, 0);
        assert_eq!(run.report.errors, 1);
    }

    #[tokio::test]
    async fn test_unsupported_output_type() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("stamp.json", UNSUPPORTED_OUTPUT_RULES).unwrap();

        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            stamp_schema(),
            vec![stamp_row(1)],
        )
        .await;

        let err = run.error.as_ref().expect("应该失败");
        assert_eq!(err.code(), "UNSUPPORTED_OUTPUT_TYPE");
        assert!(err.to_string().contains("checked_at"));
        assert!(run.main_rows().is_empty());
    }

    #[tokio::test]
    async fn test_value_not_representable_as_integer() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("bad.json", BAD_INTEGER_RULES).unwrap();

        // 第 1 行不触发动作，第 2 行触发后转换失败
        let run = run_step(
            StepConfig::local(env.rule_dir_str(), "valid"),
            flag_schema(),
            vec![flag_row(1, 10.0), flag_row(2, 150.0), flag_row(3, 10.0)],
        )
        .await;

        match run.error {
            Some(StepError::Bridge(BridgeError::Coercion(ref failures))) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].field, "id");
                assert_eq!(failures[0].value_type, "string");
            }
            ref other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(run.main_rows().len(), 1);
        assert_eq!(run.report.rows_read, 2);
    }
}

#[cfg(test)]
mod remote_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let run = run_step(
            StepConfig::remote("127.0.0.1", port.to_string(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0)],
        )
        .await;

        assert!(matches!(run.error, Some(StepError::Remote(ProtocolError::Io(_)))));
        assert_eq!(run.report.errors, 1);
        assert!(run.main_rows().is_empty());
    }

    #[tokio::test]
    async fn test_server_side_evaluation_error() {
        let env = TestEnvironment::setup().unwrap();
        env.add_file("broken.json", BROKEN_RULES).unwrap();
        let server = env.start_server().await.unwrap();

        let run = run_step(
            StepConfig::remote("127.0.0.1", server.port_string(), "valid"),
            flag_schema(),
            vec![flag_row(1, 150.0), flag_row(2, 1.0)],
        )
        .await;

        match run.error {
            Some(StepError::Remote(ProtocolError::Server(ref message))) => {
                assert!(message.contains("row number: 1"), "{}", message);
            }
            ref other => panic!("unexpected error: {:?}", other),
        }
        assert!(run.main_rows().is_empty());

        server.stop().await.unwrap();
    }
}
