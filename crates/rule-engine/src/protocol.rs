//! 远程评估协议
//!
//! TCP 连接上的换行分隔 JSON 帧，一问一答，不允许流水线。
//!
//! - 请求：`evaluate`（一行字段）或 `exit` 结束标记
//! - 响应：`result`（汇总计数 + 评估后的完整字段集合）、`error` 或 `goodbye`
//!
//! 字段修改通过响应中的完整字段集合回传，客户端按位置对齐后写回本地集合。

use crate::fields::{FieldCollection, NamedField};
use crate::models::EvaluationSummary;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// 客户端请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Evaluate {
        label: String,
        fields: Vec<NamedField>,
    },
    Exit,
}

/// 服务端响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Result {
        summary: RemoteSummary,
        fields: Vec<NamedField>,
    },
    Error {
        message: String,
    },
    Goodbye,
}

/// 远程汇总计数，使用 "通过" 计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteSummary {
    pub total_groups: u64,
    pub groups_passed: u64,
    pub groups_skipped: u64,
    pub total_rules: u64,
    pub rules_passed: u64,
    pub total_actions: u64,
}

impl From<&EvaluationSummary> for RemoteSummary {
    fn from(summary: &EvaluationSummary) -> Self {
        Self {
            total_groups: summary.groups_total,
            groups_passed: summary.groups_passed(),
            groups_skipped: summary.groups_skipped,
            total_rules: summary.rules_total,
            rules_passed: summary.rules_passed(),
            total_actions: summary.actions_total,
        }
    }
}

impl From<RemoteSummary> for EvaluationSummary {
    /// 反转通过计数：failed = total - passed
    fn from(remote: RemoteSummary) -> Self {
        Self {
            groups_total: remote.total_groups,
            groups_failed: remote.total_groups.saturating_sub(remote.groups_passed),
            groups_skipped: remote.groups_skipped,
            rules_total: remote.total_rules,
            rules_failed: remote.total_rules.saturating_sub(remote.rules_passed),
            actions_total: remote.total_actions,
        }
    }
}

/// 协议错误
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("连接 I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("帧编码失败: {0}")]
    Encode(serde_json::Error),

    #[error("帧解码失败: {0}")]
    Decode(serde_json::Error),

    #[error("连接已被对端关闭")]
    ConnectionClosed,

    #[error("意外的响应: 期望 {expected}, 实际 {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },

    #[error("返回的字段集合与本地不一致: {0}")]
    FieldMismatch(String),

    #[error("服务端评估失败: {0}")]
    Server(String),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "PROTOCOL_IO",
            Self::Encode(_) => "PROTOCOL_ENCODE",
            Self::Decode(_) => "PROTOCOL_DECODE",
            Self::ConnectionClosed => "PROTOCOL_CONNECTION_CLOSED",
            Self::UnexpectedResponse { .. } => "PROTOCOL_UNEXPECTED_RESPONSE",
            Self::FieldMismatch(_) => "PROTOCOL_FIELD_MISMATCH",
            Self::Server(_) => "PROTOCOL_SERVER_ERROR",
        }
    }
}

impl Response {
    /// 响应类型名称（用于错误信息）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::Goodbye => "goodbye",
        }
    }
}

/// 写出一帧并刷新
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut payload = serde_json::to_vec(message).map_err(ProtocolError::Encode)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// 读取一帧，对端关闭时返回 None
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(ProtocolError::Decode)
}

/// 将服务端返回的字段集合写回本地集合
///
/// 两边必须长度相同、字段名顺序一致。只写回 `updated` 为 true 的字段，
/// 返回写回的字段数。
pub fn reconcile_fields(
    local: &mut FieldCollection,
    remote: &[NamedField],
) -> Result<usize, ProtocolError> {
    if local.len() != remote.len() {
        return Err(ProtocolError::FieldMismatch(format!(
            "本地 {} 个字段，远程 {} 个字段",
            local.len(),
            remote.len()
        )));
    }

    for (index, remote_field) in remote.iter().enumerate() {
        let local_name = local.field_at(index).map(|f| f.name.as_str()).unwrap_or_default();
        if local_name != remote_field.name {
            return Err(ProtocolError::FieldMismatch(format!(
                "位置 {} 的字段名不一致: 本地 '{}'，远程 '{}'",
                index, local_name, remote_field.name
            )));
        }
    }

    let mut applied = 0;
    for (index, field) in remote.iter().enumerate() {
        if field.updated {
            local
                .set_at(index, field.value.clone())
                .map_err(|e| ProtocolError::FieldMismatch(e.to_string()))?;
            applied += 1;
        }
    }

    Ok(applied)
}
