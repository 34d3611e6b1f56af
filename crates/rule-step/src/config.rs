//! 步骤配置
//!
//! 规则来源路径、服务地址和端口在使用前做变量替换，支持 `${NAME}` 和 `%%NAME%%` 两种写法。

use crate::error::{Result, StepError};
use crate::evaluator::RowEvaluator;
use crate::local::LocalEvaluator;
use crate::output::OutputMode;
use crate::remote::RemoteEvaluator;
use crate::schema::ColumnSchema;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}|%%([^%]+)%%").expect("invalid variable regex")
});

/// 变量表
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以进程环境变量初始化
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// 替换字符串中的变量引用，未定义的变量原样保留
    pub fn substitute(&self, input: &str) -> String {
        VARIABLE_PATTERN
            .replace_all(input, |caps: &Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                match self.values.get(name) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// 本地评估配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStepConfig {
    /// 规则文件、规则目录或 zip 归档
    pub rule_source: String,
}

/// 远程评估配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStepConfig {
    pub server_host: String,
    /// 字符串形式，变量替换后再解析为端口号
    pub server_port: String,
}

/// 评估方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationConfig {
    Local(LocalStepConfig),
    Remote(RemoteStepConfig),
}

/// 步骤配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub output_mode: OutputMode,
    /// 主输出目标
    pub main_target: String,
    /// 详细输出目标，为空或与主输出相同时不输出详细结果
    #[serde(default)]
    pub detail_target: Option<String>,
    /// 保留所有行的执行结果
    #[serde(default)]
    pub preserve_results: bool,
}

/// 配置检查结果级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RemarkLevel {
    Ok,
    Warning,
    Error,
}

/// 配置检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRemark {
    pub level: RemarkLevel,
    pub message: String,
}

impl CheckRemark {
    fn new(level: RemarkLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl StepConfig {
    pub fn local(rule_source: impl Into<String>, main_target: impl Into<String>) -> Self {
        Self {
            evaluation: EvaluationConfig::Local(LocalStepConfig {
                rule_source: rule_source.into(),
            }),
            output_mode: OutputMode::default(),
            main_target: main_target.into(),
            detail_target: None,
            preserve_results: false,
        }
    }

    pub fn remote(
        server_host: impl Into<String>,
        server_port: impl Into<String>,
        main_target: impl Into<String>,
    ) -> Self {
        Self {
            evaluation: EvaluationConfig::Remote(RemoteStepConfig {
                server_host: server_host.into(),
                server_port: server_port.into(),
            }),
            output_mode: OutputMode::default(),
            main_target: main_target.into(),
            detail_target: None,
            preserve_results: false,
        }
    }

    pub fn with_detail_target(mut self, target: impl Into<String>, mode: OutputMode) -> Self {
        self.detail_target = Some(target.into());
        self.output_mode = mode;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StepError::Configuration(e.to_string()))
    }

    /// 是否输出详细结果
    pub fn detail_enabled(&self) -> bool {
        match self.detail_target.as_deref().map(str::trim) {
            Some(target) => !target.is_empty() && target != self.main_target.trim(),
            None => false,
        }
    }

    /// 按配置构造评估器，路径和地址在这里做变量替换
    pub fn build_evaluator(&self, variables: &Variables) -> Result<Box<dyn RowEvaluator>> {
        match &self.evaluation {
            EvaluationConfig::Local(local) => {
                let source = variables.substitute(&local.rule_source);
                if source.trim().is_empty() {
                    return Err(StepError::Configuration("未配置规则来源".to_string()));
                }
                Ok(Box::new(LocalEvaluator::new(
                    source,
                    self.detail_enabled(),
                    self.preserve_results,
                )))
            }
            EvaluationConfig::Remote(remote) => {
                let host = variables.substitute(&remote.server_host);
                if host.trim().is_empty() {
                    return Err(StepError::Configuration("未配置评估服务地址".to_string()));
                }
                let port = parse_port(&variables.substitute(&remote.server_port))?;
                Ok(Box::new(RemoteEvaluator::new(host.trim(), port)))
            }
        }
    }

    /// 检查配置，返回检查结果列表
    pub fn check(&self, input: &ColumnSchema, variables: &Variables) -> Vec<CheckRemark> {
        let mut remarks = Vec::new();

        if input.is_empty() {
            remarks.push(CheckRemark::new(RemarkLevel::Warning, "没有从上游步骤接收到任何字段"));
        } else {
            remarks.push(CheckRemark::new(
                RemarkLevel::Ok,
                format!("已连接上游步骤，接收 {} 个字段", input.len()),
            ));
        }

        if self.main_target.trim().is_empty() {
            remarks.push(CheckRemark::new(RemarkLevel::Error, "未定义主输出目标"));
        } else {
            remarks.push(CheckRemark::new(RemarkLevel::Ok, "主输出目标已定义"));
        }

        if self.detail_enabled() {
            remarks.push(CheckRemark::new(RemarkLevel::Ok, "详细输出目标已定义"));
        } else {
            remarks.push(CheckRemark::new(RemarkLevel::Warning, "未定义详细输出目标"));
        }

        match &self.evaluation {
            EvaluationConfig::Local(local) => {
                if variables.substitute(&local.rule_source).trim().is_empty() {
                    remarks.push(CheckRemark::new(RemarkLevel::Error, "未配置规则来源"));
                }
            }
            EvaluationConfig::Remote(remote) => {
                if variables.substitute(&remote.server_host).trim().is_empty() {
                    remarks.push(CheckRemark::new(RemarkLevel::Error, "未配置评估服务地址"));
                }
                if let Err(e) = parse_port(&variables.substitute(&remote.server_port)) {
                    remarks.push(CheckRemark::new(RemarkLevel::Error, e.to_string()));
                }
            }
        }

        remarks
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| StepError::Configuration(format!("无效的评估服务端口: '{}'", value)))
}
