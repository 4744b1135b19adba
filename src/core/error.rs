//! 统一错误类型定义
//!
//! 使用 `thiserror` 定义配置流程的全部错误，`ErrorKind` 是其可序列化的分类，
//! 写入 `StepOutcome` 作为审计记录与退出码的依据。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 错误分类（写入运行报告）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigError,
    ResolutionError,
    ProbeError,
    DownloadError,
    PackageManagerError,
    PermissionError,
    ProfileWriteError,
    TimeoutError,
    VerificationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::ResolutionError => "ResolutionError",
            ErrorKind::ProbeError => "ProbeError",
            ErrorKind::DownloadError => "DownloadError",
            ErrorKind::PackageManagerError => "PackageManagerError",
            ErrorKind::PermissionError => "PermissionError",
            ErrorKind::ProfileWriteError => "ProfileWriteError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::VerificationError => "VerificationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配置流程的统一错误类型
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// 配置或参数错误（任何变更之前）
    #[error("配置错误: {0}")]
    Config(String),

    /// 远程版本查询失败（可重试）
    #[error("版本解析失败: {0}")]
    Resolution(String),

    /// 检测命令异常（区别于"未安装"）
    #[error("状态检测失败: {0}")]
    Probe(String),

    /// 下载失败
    #[error("下载失败: {url}: {reason}")]
    Download { url: String, reason: String },

    /// 包管理器或安装脚本执行失败
    #[error("包管理器执行失败: {0}")]
    PackageManager(String),

    /// 需要提权但不可用
    #[error("权限不足: {0}")]
    Permission(String),

    /// Shell 配置文件写入失败
    #[error("写入配置文件失败: {path}: {source}")]
    ProfileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 网络或子进程超时
    #[error("操作超时（{seconds} 秒）: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// 安装后状态与预期不符
    #[error("安装后校验失败: {0}")]
    Verification(String),
}

/// 便于各服务使用的结果别名
pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution(message.into())
    }

    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe(message.into())
    }

    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn package_manager(message: impl Into<String>) -> Self {
        Self::PackageManager(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    pub fn profile_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ProfileWrite {
            path: path.into(),
            source,
        }
    }

    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Resolution(_) => ErrorKind::ResolutionError,
            Self::Probe(_) => ErrorKind::ProbeError,
            Self::Download { .. } => ErrorKind::DownloadError,
            Self::PackageManager(_) => ErrorKind::PackageManagerError,
            Self::Permission(_) => ErrorKind::PermissionError,
            Self::ProfileWrite { .. } => ErrorKind::ProfileWriteError,
            Self::Timeout { .. } => ErrorKind::TimeoutError,
            Self::Verification(_) => ErrorKind::VerificationError,
        }
    }

    /// 网络类错误允许在解析器/下载器内部重试一次
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Resolution(_) | Self::Download { .. } | Self::Timeout { .. }
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
