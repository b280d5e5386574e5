use crate::config::{parse_level, AppConfig};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "本地刷题工具：随机抽题、学习模式、进度续做与错题本")]
pub struct Cli {
    /// JSON 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 数据目录（默认 ~/.local/share/quiz-study）
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// 题库目录，每个含 meta.json 的子目录是一个题库
    #[arg(short, long)]
    pub banks: Option<PathBuf>,

    /// SQLite 数据库文件
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// 每轮抽取的题目数
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: Option<u32>,

    /// 日志级别：off, error, warn, info, debug, trace
    #[arg(long)]
    pub log_level: Option<String>,

    /// 同时写入的日志文件
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// 只在内存中保存进度和错题，退出后丢弃
    #[arg(long)]
    pub memory: bool,
}

impl Cli {
    pub fn get() -> Cli {
        Cli::parse()
    }

    /// 默认值 < 配置文件 < 命令行
    pub fn into_config(self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(dir) = self.data_dir {
            if self.db.is_none() {
                config.database_path = crate::utils::get_database_path(&dir);
            }
            config.data_dir = dir;
        }
        if let Some(dir) = self.banks {
            config.banks_dir = dir;
        }
        if let Some(db) = self.db {
            config.database_path = db;
        }
        if let Some(count) = self.count {
            config.default_count = count as usize;
        }
        if let Some(level) = self.log_level {
            config.log_level = parse_level(&level)?;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        config.in_memory |= self.memory;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from(["quiz-study", "--data-dir", "/tmp/qs", "-n", "5", "--log-level", "warn", "--memory"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/qs/quiz-study.db"));
        assert_eq!(config.default_count, 5);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert!(config.in_memory);
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(Cli::try_parse_from(["quiz-study", "--count", "0"]).is_err());
    }
}
