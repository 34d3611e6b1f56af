//! 规则评估服务
//!
//! 启动时从配置的规则来源加载规则，通过 TCP 为管道步骤提供远程评估。

use anyhow::{Context, Result};
use rowrule_shared::config::AppConfig;
use rowrule_shared::observability;
use rule_engine::{RuleServer, RuleSource};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 统一加载配置：从 config/{service_name}.toml 加载，包含可观测性配置
    let config = AppConfig::load("rule-server").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config.observability.clone().with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    info!("Starting rule-server...");

    let source = RuleSource::resolve(&config.rules.path)
        .with_context(|| format!("无法解析规则来源 '{}'", config.rules.path))?;
    let rules = source.compile().context("规则加载失败")?;
    if rules.is_empty() {
        warn!("Rule set is empty, every row will pass with zero counters");
    }
    info!(
        groups = rules.number_of_groups(),
        rules = rules.number_of_rules(),
        "Rules loaded from {}",
        source
    );

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听地址 {}", addr))?;

    RuleServer::new(Arc::new(rules))
        .serve_with_shutdown(listener, shutdown_signal())
        .await?;

    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
