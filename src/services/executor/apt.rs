//! apt-get 包管理器调用
//!
//! 始终非交互运行（`DEBIAN_FRONTEND=noninteractive`、`-y`、stdin 关闭）。
//! 非 root 用户通过 `sudo -n` 提权；sudo 需要密码时直接报 `PermissionError`。

use crate::core::error::{ProvisionError, ProvisionResult};
use crate::utils::{CommandExecutor, CommandResult};
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;

/// 提权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    Root,
    Sudo,
}

/// 一次 apt-get 调用的完整命令行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

pub struct PackageManager {
    commands: CommandExecutor,
    timeout: Duration,
    elevation: OnceCell<Elevation>,
}

impl PackageManager {
    pub fn new(commands: CommandExecutor, timeout: Duration) -> Self {
        Self {
            commands,
            timeout,
            elevation: OnceCell::new(),
        }
    }

    /// 检测提权方式（结果缓存）
    pub async fn ensure_privileges(&self) -> ProvisionResult<Elevation> {
        self.elevation
            .get_or_try_init(|| self.detect_elevation())
            .await
            .copied()
    }

    async fn detect_elevation(&self) -> ProvisionResult<Elevation> {
        let uid = self
            .commands
            .run_program("id", &["-u".to_string()], &[], Duration::from_secs(10))
            .await?;
        if uid.success && uid.stdout.trim() == "0" {
            return Ok(Elevation::Root);
        }

        let sudo = self
            .commands
            .run_program("sudo", &["-n".to_string(), "true".to_string()], &[], Duration::from_secs(10))
            .await?;
        if sudo.success {
            tracing::debug!("使用 sudo -n 提权");
            Ok(Elevation::Sudo)
        } else {
            Err(ProvisionError::permission(format!(
                "安装系统包需要 root 权限，但 sudo 不可用或需要密码: {}",
                sudo.stderr
            )))
        }
    }

    /// `apt-get update`
    pub async fn update(&self) -> ProvisionResult<CommandResult> {
        self.apt(vec!["update".to_string()]).await
    }

    /// `apt-get install <packages>`
    pub async fn install(&self, packages: &[String], reinstall: bool) -> ProvisionResult<CommandResult> {
        let mut args = install_args(reinstall);
        args.extend(packages.iter().cloned());
        self.apt(args).await
    }

    /// `apt-get install ./file.deb`
    pub async fn install_local(&self, deb: &Path, reinstall: bool) -> ProvisionResult<CommandResult> {
        let mut args = install_args(reinstall);
        args.push(deb.to_string_lossy().to_string());
        self.apt(args).await
    }

    async fn apt(&self, args: Vec<String>) -> ProvisionResult<CommandResult> {
        let elevation = self.ensure_privileges().await?;
        let invocation = build_invocation(elevation, &args);
        tracing::info!(command = %args.join(" "), "执行 apt-get");

        let result = self
            .commands
            .run_program(&invocation.program, &invocation.args, &invocation.envs, self.timeout)
            .await?;

        if result.success {
            Ok(result)
        } else {
            Err(classify_failure(&args, &result))
        }
    }
}

fn install_args(reinstall: bool) -> Vec<String> {
    let mut args = vec!["install".to_string()];
    if reinstall {
        args.push("--reinstall".to_string());
    }
    args
}

/// 组装命令行：root 直接执行，否则经 `sudo -n env` 传递环境变量
pub fn build_invocation(elevation: Elevation, apt_args: &[String]) -> AptInvocation {
    let mut apt = vec![
        "-y".to_string(),
        "-q".to_string(),
        "-o".to_string(),
        "Dpkg::Options::=--force-confdef".to_string(),
        "-o".to_string(),
        "Dpkg::Options::=--force-confold".to_string(),
    ];
    apt.extend(apt_args.iter().cloned());

    match elevation {
        Elevation::Root => AptInvocation {
            program: "apt-get".to_string(),
            args: apt,
            envs: vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())],
        },
        Elevation::Sudo => {
            let mut args = vec![
                "-n".to_string(),
                "env".to_string(),
                "DEBIAN_FRONTEND=noninteractive".to_string(),
                "apt-get".to_string(),
            ];
            args.extend(apt);
            AptInvocation {
                program: "sudo".to_string(),
                args,
                envs: Vec::new(),
            }
        }
    }
}

/// 失败分类：锁/权限问题为 `PermissionError`，其他为 `PackageManagerError`
pub fn classify_failure(args: &[String], result: &CommandResult) -> ProvisionError {
    let stderr = result.stderr.to_lowercase();
    let permission_markers = [
        "permission denied",
        "are you root",
        "a password is required",
        "not in the sudoers",
    ];
    if permission_markers.iter().any(|m| stderr.contains(m)) {
        return ProvisionError::permission(last_line(&result.stderr));
    }

    let code = result
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    ProvisionError::package_manager(format!(
        "apt-get {} 退出码 {code}: {}",
        args.first().map(String::as_str).unwrap_or_default(),
        last_line(&result.stderr)
    ))
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    fn failed(stderr: &str, code: i32) -> CommandResult {
        CommandResult {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
        }
    }

    #[test]
    fn test_root_invocation_sets_noninteractive_env() {
        let inv = build_invocation(Elevation::Root, &["update".to_string()]);
        assert_eq!(inv.program, "apt-get");
        assert_eq!(inv.args.first().map(String::as_str), Some("-y"));
        assert_eq!(inv.args.last().map(String::as_str), Some("update"));
        assert!(inv
            .envs
            .contains(&("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())));
    }

    #[test]
    fn test_sudo_invocation_never_prompts() {
        let inv = build_invocation(
            Elevation::Sudo,
            &["install".to_string(), "dotnet-sdk-8.0".to_string()],
        );
        assert_eq!(inv.program, "sudo");
        assert_eq!(&inv.args[..4], &["-n", "env", "DEBIAN_FRONTEND=noninteractive", "apt-get"]);
        assert!(inv.args.contains(&"-y".to_string()));
        assert_eq!(inv.args.last().map(String::as_str), Some("dotnet-sdk-8.0"));
    }

    #[test]
    fn test_reinstall_flag() {
        assert_eq!(install_args(true), vec!["install", "--reinstall"]);
        assert_eq!(install_args(false), vec!["install"]);
    }

    #[test]
    fn test_lock_failure_is_permission_error() {
        let result = failed(
            "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)\nE: Unable to acquire the dpkg frontend lock, are you root?",
            100,
        );
        let err = classify_failure(&["install".to_string()], &result);
        assert_eq!(err.kind(), ErrorKind::PermissionError);
    }

    #[test]
    fn test_missing_package_is_package_manager_error() {
        let result = failed("E: Unable to locate package dotnet-sdk-99.0", 100);
        let err = classify_failure(&["install".to_string()], &result);
        assert_eq!(err.kind(), ErrorKind::PackageManagerError);
        assert!(err.to_string().contains("dotnet-sdk-99.0"));
        assert!(err.to_string().contains("100"));
    }
}
