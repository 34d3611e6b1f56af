//! 测试辅助模块

pub mod assertions;

pub use assertions::*;
pub use runner::*;
