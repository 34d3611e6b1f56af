//! 远程评估服务
//!
//! 每个连接拥有独立的引擎会话，共享同一份只读的编译后规则集。
//! 会话关闭详细结果保留，每次请求后清空执行结果存储。

use crate::compiler::CompiledRuleSet;
use crate::engine::RuleEngine;
use crate::fields::{FieldCollection, NamedField};
use crate::protocol::{ProtocolError, RemoteSummary, Request, Response, read_frame, write_frame};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rowrule_shared::observability::metrics;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 连接会话信息
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub opened_at: DateTime<Utc>,
    pub requests: u64,
}

/// 远程评估服务
#[derive(Clone)]
pub struct RuleServer {
    rules: Arc<CompiledRuleSet>,
    sessions: Arc<DashMap<Uuid, SessionInfo>>,
}

impl RuleServer {
    pub fn new(rules: Arc<CompiledRuleSet>) -> Self {
        Self {
            rules,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// 当前打开的会话数
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// 接受连接直到 `shutdown` 完成
    ///
    /// 关闭信号只停止接受新连接，已建立的会话会继续处理到客户端退出。
    #[instrument(skip(self, listener, shutdown))]
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            addr = %listener.local_addr()?,
            groups = self.rules.number_of_groups(),
            "规则评估服务已启动"
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let server = self.clone();
                            tokio::spawn(async move {
                                server.handle_connection(stream, peer).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "接受连接失败");
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!(active_sessions = self.active_sessions(), "停止接受新连接");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            SessionInfo {
                peer,
                opened_at: Utc::now(),
                requests: 0,
            },
        );
        metrics::set_active_sessions(self.sessions.len());
        info!(session_id = %id, %peer, "客户端已连接");

        match self.run_session(id, stream).await {
            Ok(requests) => info!(session_id = %id, requests, "客户端会话结束"),
            Err(e) => warn!(session_id = %id, error = %e, code = e.code(), "客户端会话异常结束"),
        }

        self.sessions.remove(&id);
        metrics::set_active_sessions(self.sessions.len());
    }

    /// 处理一个连接上的请求，返回处理的评估请求数
    async fn run_session(&self, id: Uuid, stream: TcpStream) -> Result<u64, ProtocolError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut engine = RuleEngine::new(Arc::clone(&self.rules));
        let mut requests = 0u64;

        loop {
            let request: Option<Request> = read_frame(&mut reader).await?;
            match request {
                None => {
                    debug!(session_id = %id, "客户端未发送结束标记即关闭连接");
                    break;
                }
                Some(Request::Exit) => {
                    write_frame(&mut write_half, &Response::Goodbye).await?;
                    debug!(session_id = %id, "收到结束标记");
                    break;
                }
                Some(Request::Evaluate { label, fields }) => {
                    let start = Instant::now();
                    let response = Self::evaluate(&mut engine, &label, fields);
                    let status = match &response {
                        Response::Error { .. } => "error",
                        _ => "ok",
                    };

                    write_frame(&mut write_half, &response).await?;
                    metrics::record_server_request(status, start.elapsed().as_secs_f64());

                    requests += 1;
                    if let Some(mut session) = self.sessions.get_mut(&id) {
                        session.requests = requests;
                    }
                }
            }
        }

        if let Err(e) = write_half.shutdown().await {
            debug!(session_id = %id, error = %e, "关闭写端失败");
        }

        Ok(requests)
    }

    /// 评估一行，评估失败时返回 error 响应，连接保持可用
    fn evaluate(engine: &mut RuleEngine, label: &str, fields: Vec<NamedField>) -> Response {
        let mut fields = match FieldCollection::from_named(fields) {
            Ok(fields) => fields,
            Err(e) => {
                return Response::Error {
                    message: e.to_string(),
                };
            }
        };

        let result = engine
            .run(label, &mut fields)
            .map(|evaluation| RemoteSummary::from(&evaluation.summary));
        engine.clear_executions();

        match result {
            Ok(summary) => Response::Result {
                summary,
                fields: fields.into_named(),
            },
            Err(e) => {
                warn!(label, error = %e, "行评估失败");
                Response::Error {
                    message: format!("{}: {}", label, e),
                }
            }
        }
    }
}
