// 运行配置结构：工具清单 + 全局设置 + 日志配置
use super::tool::ToolSpec;
use crate::core::http::HttpTimeouts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 配置文件顶层结构（tools.toml）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub settings: Settings,
    /// 按依赖顺序排列的工具列表
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// 全局设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// 某个工具失败后是否继续处理后续工具
    #[serde(default)]
    pub continue_on_error: bool,
    /// 需要追加配置块的 Shell 配置文件（相对 HOME）
    #[serde(default = "default_profile_files")]
    pub profile_files: Vec<String>,
    /// 显式代理；为空时使用环境变量中的代理
    #[serde(default)]
    pub proxy: Option<String>,
    /// 网络重试前的等待时间
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// 包管理器/安装脚本的超时时间
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_profile_files() -> Vec<String> {
    vec![".bashrc".to_string()]
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_metadata_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_command_timeout_secs() -> u64 {
    1800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            profile_files: default_profile_files(),
            proxy: None,
            retry_backoff_ms: default_retry_backoff_ms(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            metadata: Duration::from_secs(self.metadata_timeout_secs),
            download: Duration::from_secs(self.download_timeout_secs),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// 日志文件路径；指向目录时自动生成带时间戳的文件名
    pub file_path: Option<PathBuf>,
}
