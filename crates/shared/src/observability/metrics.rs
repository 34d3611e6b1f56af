//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 未安装导出器时，记录函数是无操作的。

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// 安装 Prometheus 导出器，在指定端口暴露 `/metrics`
pub fn init(service_name: &str, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    register_common_metrics(service_name);
    info!("Metrics exporter listening on {}", addr);

    Ok(())
}

/// 注册指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("rule_server_requests_total", "Total number of evaluation requests");
    metrics::describe_histogram!(
        "rule_server_request_duration_seconds",
        "Evaluation request duration in seconds"
    );
    metrics::describe_gauge!("rule_server_active_sessions", "Currently open client sessions");
    metrics::describe_counter!("rule_step_rows_total", "Rows processed by rule steps");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录一次远程评估请求
#[inline]
pub fn record_server_request(status: &str, duration_secs: f64) {
    metrics::counter!(
        "rule_server_requests_total",
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "rule_server_request_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration_secs);
}

/// 更新活动会话数
#[inline]
pub fn set_active_sessions(count: usize) {
    metrics::gauge!("rule_server_active_sessions").set(count as f64);
}

/// 记录步骤处理的行
#[inline]
pub fn record_step_row(mode: &str, outcome: &str) {
    metrics::counter!(
        "rule_step_rows_total",
        "mode" => mode.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
