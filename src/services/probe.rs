// 状态检测
//
// 通过只读检测命令判断工具是否已安装以及安装的版本。
// "未安装" 是正常结果；只有检测命令本身异常（权限不足、无法启动、被信号终止）才是错误。

use crate::core::error::{ProvisionError, ProvisionResult};
use crate::models::{ProbeResult, ToolSpec};
use crate::utils::command::CommandExecutor;
use crate::utils::version::extract_version;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

/// sh 约定：命令找到但无法执行
const EXIT_NOT_EXECUTABLE: i32 = 126;

/// 状态检测 Trait
#[async_trait]
pub trait StateProbe: Send + Sync {
    async fn probe(&self, tool: &ToolSpec) -> ProvisionResult<ProbeResult>;
}

/// 基于检测命令的实现
pub struct CommandProbe {
    executor: CommandExecutor,
    timeout: Duration,
}

impl CommandProbe {
    pub fn new(executor: CommandExecutor) -> Self {
        Self::with_timeout(executor, Duration::from_secs(30))
    }

    pub fn with_timeout(executor: CommandExecutor, timeout: Duration) -> Self {
        Self { executor, timeout }
    }
}

/// 编译工具的版本正则
pub fn version_pattern(tool: &ToolSpec) -> ProvisionResult<Option<Regex>> {
    tool.version_regex
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                ProvisionError::config(format!("{} 的 version_regex 无效: {e}", tool.name))
            })
        })
        .transpose()
}

/// 将检测命令的执行结果转换为 ProbeResult
pub fn interpret_probe_output(
    tool: &ToolSpec,
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> ProvisionResult<ProbeResult> {
    let raw_output = if stdout.is_empty() {
        stderr.to_string()
    } else {
        stdout.to_string()
    };

    match exit_code {
        Some(0) => {
            let pattern = version_pattern(tool)?;
            // 部分工具把版本打印到 stderr
            let version = extract_version(stdout, pattern.as_ref())
                .or_else(|| extract_version(stderr, pattern.as_ref()));
            if version.is_none() {
                tracing::warn!(tool = %tool.name, output = %raw_output, "已安装但无法提取版本号");
            }
            Ok(ProbeResult::present(version, raw_output))
        }
        Some(EXIT_NOT_EXECUTABLE) => Err(ProvisionError::probe(format!(
            "{} 检测命令无法执行（权限不足）: {}",
            tool.name,
            stderr.trim()
        ))),
        Some(_) => Ok(ProbeResult::absent(raw_output)),
        None => Err(ProvisionError::probe(format!(
            "{} 检测命令异常终止: {}",
            tool.name,
            stderr.trim()
        ))),
    }
}

#[async_trait]
impl StateProbe for CommandProbe {
    async fn probe(&self, tool: &ToolSpec) -> ProvisionResult<ProbeResult> {
        // 超时后检测命令被杀死，不会残留在后台
        let result = self
            .executor
            .run_shell(&tool.check_command, self.timeout)
            .await
            .map_err(|e| match e {
                ProvisionError::Timeout { seconds, .. } => {
                    ProvisionError::probe(format!("{} 检测命令超时（{seconds} 秒）", tool.name))
                }
                other => other,
            })?;

        tracing::debug!(
            tool = %tool.name,
            command = %tool.check_command,
            exit_code = ?result.exit_code,
            stdout = %result.stdout,
            "检测结果"
        );

        interpret_probe_output(tool, result.exit_code, &result.stdout, &result.stderr)
    }
}
