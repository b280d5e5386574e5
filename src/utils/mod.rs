use anyhow::{Context, Result};
use chrono::Utc;
use log::LevelFilter;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "quiz-study";

/// 应用数据目录：$XDG_DATA_HOME/quiz-study，或 $HOME/.local/share/quiz-study
pub fn get_app_data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join(APP_DIR_NAME);
    }
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => {
            let mut path = PathBuf::from(home);
            path.push(".local/share");
            path.push(APP_DIR_NAME);
            path
        }
        None => PathBuf::from(".").join(APP_DIR_NAME),
    }
}

pub fn get_database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("quiz-study.db")
}

/// 当前时间（Unix 毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// "x 天前" / "x 小时前" / "x 分钟前" / "刚刚"
pub fn format_time_ago(timestamp: i64, now: i64) -> String {
    let diff = (now - timestamp).max(0);
    let minutes = diff / 60_000;
    let hours = diff / 3_600_000;
    let days = diff / 86_400_000;

    if days > 0 {
        format!("{} 天前", days)
    } else if hours > 0 {
        format!("{} 小时前", hours)
    } else if minutes > 0 {
        format!("{} 分钟前", minutes)
    } else {
        "刚刚".to_string()
    }
}

/// 用时显示：mm:ss，超过一小时为 h:mm:ss
pub fn format_elapsed(millis: i64) -> String {
    let secs = millis.max(0) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// 配置日志输出：stderr，另可追加到日志文件
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建日志目录失败: {}", parent.display()))?;
        }
        dispatch = dispatch.chain(
            fern::log_file(path).with_context(|| format!("打开日志文件失败: {}", path.display()))?,
        );
    }

    dispatch.apply().context("日志系统已初始化")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ago_buckets() {
        let now = 10 * 86_400_000;
        assert_eq!(format_time_ago(now - 5_000, now), "刚刚");
        assert_eq!(format_time_ago(now - 3 * 60_000, now), "3 分钟前");
        assert_eq!(format_time_ago(now - 2 * 3_600_000, now), "2 小时前");
        assert_eq!(format_time_ago(now - 86_400_000, now), "1 天前");
        assert_eq!(format_time_ago(now + 1000, now), "刚刚");
    }

    #[test]
    fn elapsed_formats() {
        assert_eq!(format_elapsed(65_000), "01:05");
        assert_eq!(format_elapsed(3_661_000), "1:01:01");
        assert_eq!(format_elapsed(-5), "00:00");
    }
}
