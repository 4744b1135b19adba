use super::platform::PlatformInfo;
use crate::core::error::{ProvisionError, ProvisionResult};
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

/// 命令执行结果
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// 被信号终止或无法启动时为 None
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn from_output(output: Output) -> Self {
        CommandResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }

    pub fn from_error(error: io::Error) -> Self {
        CommandResult {
            success: false,
            stdout: String::new(),
            stderr: error.to_string(),
            exit_code: None,
        }
    }

    /// stdout + stderr，按行拆分（用于日志摘录）
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(String::from)
            .collect()
    }
}

/// 命令执行器
///
/// 所有命令都使用增强的 PATH 并关闭标准输入，交互式提示会立即失败而不是阻塞。
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    platform: PlatformInfo,
}

impl CommandExecutor {
    pub fn new() -> Self {
        CommandExecutor {
            platform: PlatformInfo::current(),
        }
    }

    pub fn with_platform(platform: PlatformInfo) -> Self {
        CommandExecutor { platform }
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    /// 执行 shell 命令（sh -c），带超时
    pub async fn run_shell(&self, command_str: &str, timeout: Duration) -> ProvisionResult<CommandResult> {
        self.run_program("sh", &["-c".to_string(), command_str.to_string()], &[], timeout)
            .await
    }

    /// 执行程序（不经过 shell），带超时和额外环境变量
    ///
    /// 超时后子进程被杀死并返回 `TimeoutError`；无法启动时返回失败的 `CommandResult`。
    /// 子进程放在独立的进程组中，终端的 Ctrl-C 只送达本进程，由取消令牌在工具之间生效。
    pub async fn run_program(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        timeout: Duration,
    ) -> ProvisionResult<CommandResult> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .env("PATH", self.platform.build_enhanced_path())
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(program, ?args, "执行命令");

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(CommandResult::from_output(output)),
            Ok(Err(e)) => Ok(CommandResult::from_error(e)),
            Err(_) => Err(ProvisionError::timeout(
                format!("{program} {}", args.join(" ")),
                timeout.as_secs(),
            )),
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}
