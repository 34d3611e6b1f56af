//! 规则步骤端到端测试
//!
//! 测试覆盖完整的行处理流程，包括：
//! - 本地评估（规则文件、目录、zip 归档）
//! - 远程评估（评估服务会话、字段修改回传）
//! - 详细输出与输出模式
//! - 错误终止

pub mod data;
pub mod helpers;
pub mod setup;

pub use setup::TestEnvironment;
