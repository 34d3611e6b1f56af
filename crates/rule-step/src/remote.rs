//! 远程评估
//!
//! 每个步骤实例在第一行到达时建立一条连接，整个行流复用这条连接，
//! 每行一问一答。输入结束后发送结束标记，等待 goodbye，关闭写端和套接字。
//! 连接在正常结束和出错两条路径上都只释放一次。

use crate::error::{Result, StepError};
use crate::evaluator::{EvaluatorState, RowEvaluator, RowVerdict};
use crate::schema::ColumnSchema;
use async_trait::async_trait;
use rule_engine::protocol::{ProtocolError, Request, Response, read_frame, reconcile_fields, write_frame};
use rule_engine::{EvaluationSummary, FieldCollection};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, error, info, trace, warn};

/// 与评估服务之间的一条会话
pub struct RemoteSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: String,
    exchanges: u64,
}

impl RemoteSession {
    pub async fn connect(host: &str, port: u16) -> std::result::Result<Self, ProtocolError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| format!("{}:{}", host, port));
        let (read_half, write_half) = stream.into_split();

        info!(%peer, "已连接规则评估服务");
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            exchanges: 0,
        })
    }

    /// 发送一行并等待结果，服务端的字段修改写回 `fields`
    pub async fn exchange(
        &mut self,
        label: &str,
        fields: &mut FieldCollection,
    ) -> std::result::Result<EvaluationSummary, ProtocolError> {
        let request = Request::Evaluate {
            label: label.to_string(),
            fields: fields.to_named(),
        };
        write_frame(&mut self.writer, &request).await?;

        let response: Response = read_frame(&mut self.reader)
            .await?
            .ok_or(ProtocolError::ConnectionClosed)?;
        self.exchanges += 1;

        match response {
            Response::Result {
                summary,
                fields: remote,
            } => {
                let applied = reconcile_fields(fields, &remote)?;
                trace!(label, applied, "远程评估结果已写回");
                Ok(summary.into())
            }
            Response::Error { message } => Err(ProtocolError::Server(message)),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "result",
                actual: other.kind().to_string(),
            }),
        }
    }

    /// 发送结束标记，等待 goodbye，然后关闭写端和连接
    pub async fn close(mut self) -> std::result::Result<u64, ProtocolError> {
        write_frame(&mut self.writer, &Request::Exit).await?;

        match read_frame::<_, Response>(&mut self.reader).await? {
            Some(Response::Goodbye) => {}
            Some(other) => {
                return Err(ProtocolError::UnexpectedResponse {
                    expected: "goodbye",
                    actual: other.kind().to_string(),
                });
            }
            None => return Err(ProtocolError::ConnectionClosed),
        }

        self.writer.shutdown().await?;
        debug!(peer = %self.peer, exchanges = self.exchanges, "远程会话已关闭");
        Ok(self.exchanges)
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }
}

/// 远程规则评估器
pub struct RemoteEvaluator {
    host: String,
    port: u16,
    state: EvaluatorState,
    session: Option<RemoteSession>,
    exchanges: u64,
}

impl RemoteEvaluator {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: EvaluatorState::Uninitialized,
            session: None,
            exchanges: 0,
        }
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    /// 已完成的行请求数
    pub fn exchanges(&self) -> u64 {
        self.session.as_ref().map_or(self.exchanges, RemoteSession::exchanges)
    }
}

#[async_trait]
impl RowEvaluator for RemoteEvaluator {
    async fn initialize(&mut self, _schema: &ColumnSchema) -> Result<()> {
        match self.state {
            EvaluatorState::Uninitialized => {}
            EvaluatorState::Ready => return Ok(()),
            EvaluatorState::Failed | EvaluatorState::Terminated => {
                return Err(StepError::NotInitialized);
            }
        }

        match RemoteSession::connect(&self.host, self.port).await {
            Ok(session) => {
                self.session = Some(session);
                self.state = EvaluatorState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = EvaluatorState::Failed;
                error!(host = %self.host, port = self.port, error = %e, "无法连接规则评估服务");
                Err(StepError::Remote(e))
            }
        }
    }

    async fn evaluate(&mut self, label: &str, fields: &mut FieldCollection) -> Result<RowVerdict> {
        let session = self.session.as_mut().ok_or(StepError::NotInitialized)?;
        let summary = session.exchange(label, fields).await?;

        Ok(RowVerdict {
            summary,
            groups: Vec::new(),
        })
    }

    async fn row_complete(&mut self) {}

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            self.exchanges = session.exchanges();
            match session.close().await {
                Ok(exchanges) => info!(exchanges, "远程评估会话结束"),
                // 输入已经处理完，关闭失败只记录
                Err(e) => warn!(error = %e, code = e.code(), "关闭远程评估会话失败"),
            }
        }
        if self.state != EvaluatorState::Failed {
            self.state = EvaluatorState::Terminated;
        }
    }

    fn mode_name(&self) -> &'static str {
        "remote"
    }
}
