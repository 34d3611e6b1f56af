//! 测试用评估服务
//!
//! - `ServerHandle`：真实的规则评估服务，监听随机端口
//! - `RecordingServer`：只接受一条连接，原样返回字段并记录收到的帧

use anyhow::Result;
use rule_engine::protocol::{read_frame, write_frame};
use rule_engine::{CompiledRuleSet, RemoteSummary, Request, Response, RuleServer};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct ServerHandle {
    pub port: u16,
    pub server: RuleServer,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub async fn start(rules: CompiledRuleSet) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let server = RuleServer::new(Arc::new(rules));
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(server.clone().serve_with_shutdown(listener, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            port,
            server,
            stop: Some(tx),
            task,
        })
    }

    pub fn port_string(&self) -> String {
        self.port.to_string()
    }

    /// 停止接受新连接并等待监听循环退出
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await??;
        Ok(())
    }
}

/// 记录型服务端看到的一次会话
#[derive(Debug, Default, Clone)]
pub struct SessionRecord {
    /// 收到的行请求标签，按顺序
    pub labels: Vec<String>,
    pub exits: usize,
    /// 结束标记之后又收到的帧数
    pub frames_after_exit: usize,
    /// 客户端是否关闭了连接
    pub closed_by_client: bool,
}

pub struct RecordingServer {
    pub port: u16,
    task: JoinHandle<Result<SessionRecord>>,
}

impl RecordingServer {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let (read_half, mut writer) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut record = SessionRecord::default();

            loop {
                match read_frame::<_, Request>(&mut reader).await? {
                    Some(_) if record.exits > 0 => record.frames_after_exit += 1,
                    Some(Request::Evaluate { label, fields }) => {
                        record.labels.push(label);
                        let summary = RemoteSummary {
                            total_groups: 2,
                            groups_passed: 1,
                            groups_skipped: 0,
                            total_rules: 5,
                            rules_passed: 3,
                            total_actions: 0,
                        };
                        write_frame(&mut writer, &Response::Result { summary, fields }).await?;
                    }
                    Some(Request::Exit) => {
                        record.exits += 1;
                        write_frame(&mut writer, &Response::Goodbye).await?;
                    }
                    None => {
                        record.closed_by_client = true;
                        break;
                    }
                }
            }

            Ok(record)
        });

        Ok(Self { port, task })
    }

    pub fn port_string(&self) -> String {
        self.port.to_string()
    }

    /// 等待会话结束并返回记录
    pub async fn finish(self) -> Result<SessionRecord> {
        self.task.await?
    }
}
