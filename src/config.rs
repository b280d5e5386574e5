//! 应用配置
//! 默认值 < 配置文件（JSON）< 命令行参数

use crate::utils::{get_app_data_dir, get_database_path};
use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub banks_dir: PathBuf,
    pub database_path: PathBuf,
    /// 新开一轮时默认抽取的题目数
    pub default_count: usize,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    /// 不落盘，数据只保存在内存中
    pub in_memory: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = get_app_data_dir();
        Self {
            database_path: get_database_path(&data_dir),
            data_dir,
            banks_dir: PathBuf::from("data"),
            default_count: 10,
            log_level: LevelFilter::Info,
            log_file: None,
            in_memory: false,
        }
    }
}

/// 配置文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    banks_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    default_count: Option<usize>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::default().merge_json(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    fn merge_json(mut self, content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)?;

        if let Some(dir) = file.data_dir {
            // 数据目录变了而数据库路径没单独指定时，数据库跟着走
            if file.database_path.is_none() {
                self.database_path = get_database_path(&dir);
            }
            self.data_dir = dir;
        }
        if let Some(dir) = file.banks_dir {
            self.banks_dir = dir;
        }
        if let Some(path) = file.database_path {
            self.database_path = path;
        }
        if let Some(count) = file.default_count {
            self.default_count = count;
        }
        if let Some(level) = file.log_level {
            self.log_level = parse_level(&level)?;
        }
        if file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        Ok(self)
    }
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .with_context(|| format!("无效的日志级别: {}", level))
}
