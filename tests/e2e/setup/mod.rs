//! 测试环境设置模块
//!
//! 提供规则目录、评估服务和记录型服务端的启动与清理。

mod environment;
mod services;

pub use environment::TestEnvironment;
pub use services::{RecordingServer, ServerHandle, SessionRecord};
