//! 规则来源加载
//!
//! 规则来源路径有三种形态：单个规则文件、规则文件目录（非递归）、包含规则文件的 zip 归档。

use crate::compiler::{CompiledRuleSet, RuleCompiler};
use crate::error::{Result, RuleError};
use crate::models::{RuleGroup, RuleProject};
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// 规则定义文件扩展名
pub const RULE_FILE_EXTENSION: &str = "json";
/// 规则归档扩展名
pub const ARCHIVE_EXTENSION: &str = "zip";

/// 解析后的规则来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    File(PathBuf),
    Directory(PathBuf),
    Archive(PathBuf),
}

impl RuleSource {
    /// 将路径解析为规则来源，支持 `file:` URL
    #[instrument]
    pub fn resolve(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(RuleError::SourceNotFound("未配置规则来源路径".to_string()));
        }

        let path = Self::to_path(location)?;
        if !path.exists() {
            return Err(RuleError::SourceNotFound(path.display().to_string()));
        }

        let source = if path.is_file() && has_extension(&path, ARCHIVE_EXTENSION) {
            Self::Archive(path)
        } else if path.is_dir() {
            Self::Directory(path)
        } else if path.is_file() {
            Self::File(path)
        } else {
            return Err(RuleError::UnsupportedSource(path.display().to_string()));
        };

        info!(source = %source, "规则来源已解析");
        Ok(source)
    }

    fn to_path(location: &str) -> Result<PathBuf> {
        if !location.starts_with("file:") {
            return Ok(PathBuf::from(location));
        }

        let url = Url::parse(location)
            .map_err(|e| RuleError::UnsupportedSource(format!("{}: {}", location, e)))?;
        url.to_file_path()
            .map_err(|_| RuleError::UnsupportedSource(location.to_string()))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) | Self::Archive(p) => p,
        }
    }

    /// 读取来源中的全部规则组，按文件名顺序
    #[instrument(skip(self), fields(source = %self))]
    pub fn load_groups(&self) -> Result<Vec<RuleGroup>> {
        let documents = match self {
            Self::File(path) => vec![(path.display().to_string(), fs::read_to_string(path)?)],
            Self::Directory(path) => Self::read_directory(path)?,
            Self::Archive(path) => Self::read_archive(path)?,
        };

        let mut groups = Vec::new();
        for (name, content) in documents {
            let parsed = parse_document(&content)
                .map_err(|e| RuleError::ParseError(format!("{}: {}", name, e)))?;
            debug!(file = %name, groups = parsed.len(), "规则文件已读取");
            groups.extend(parsed);
        }

        Ok(groups)
    }

    /// 读取并编译规则
    pub fn compile(&self) -> Result<CompiledRuleSet> {
        let groups = self.load_groups()?;
        let compiled = RuleCompiler::new().compile(groups, Utc::now())?;

        if compiled.is_empty() {
            warn!(source = %self, "规则来源中没有有效的规则组");
        }

        Ok(compiled)
    }

    fn read_directory(path: &Path) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_file() && has_extension(&entry_path, RULE_FILE_EXTENSION) {
                files.push(entry_path);
            }
        }
        files.sort();

        files
            .into_iter()
            .map(|file| Ok((file.display().to_string(), fs::read_to_string(&file)?)))
            .collect()
    }

    fn read_archive(path: &Path) -> Result<Vec<(String, String)>> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        let mut documents = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if !entry.is_file() || !has_extension(Path::new(entry.name()), RULE_FILE_EXTENSION) {
                continue;
            }
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            documents.push((entry.name().to_string(), content));
        }
        documents.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(documents)
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "file:{}", p.display()),
            Self::Directory(p) => write!(f, "directory:{}", p.display()),
            Self::Archive(p) => write!(f, "archive:{}", p.display()),
        }
    }
}

/// 规则文件可以是项目对象、规则组数组或单个规则组
fn parse_document(content: &str) -> Result<Vec<RuleGroup>> {
    let value: Value = serde_json::from_str(content)?;

    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else if value.get("groups").is_some() {
        let project: RuleProject = serde_json::from_value(value)?;
        Ok(project.groups)
    } else if value.is_object() {
        Ok(vec![serde_json::from_value(value)?])
    } else {
        Err(RuleError::ParseError(format!(
            "规则文件顶层必须是对象或数组，实际为 {}",
            crate::fields::json_type_name(&value)
        )))
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
