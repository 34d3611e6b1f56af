//! 测试环境
//!
//! 每个测试一个临时规则目录，规则文件按文件名排序加载。

use super::services::ServerHandle;
use anyhow::Result;
use rule_engine::RuleSource;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnvironment {
    dir: TempDir,
}

impl TestEnvironment {
    pub fn setup() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// 规则目录
    pub fn rule_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn rule_dir_str(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// 在规则目录中写入一个文件，返回其路径
    pub fn add_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// 在规则目录之外写一个 zip 归档
    pub fn add_archive(&self, name: &str, entries: &[(&str, &str)]) -> Result<PathBuf> {
        let archive_dir = self.dir.path().join("archives");
        fs::create_dir_all(&archive_dir)?;
        let path = archive_dir.join(name);

        let file = fs::File::create(&path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (entry, content) in entries {
            writer.start_file(*entry, options)?;
            writer.write_all(content.as_bytes())?;
        }
        writer.finish()?;
        Ok(path)
    }

    /// 用规则目录中的规则启动一个评估服务
    pub async fn start_server(&self) -> Result<ServerHandle> {
        let rules = RuleSource::resolve(&self.rule_dir_str())?.compile()?;
        ServerHandle::start(rules).await
    }
}
