//! 安装执行器
//!
//! 根据 `InstallerSpec` 执行计划：下载产物放在私有临时目录（无论成败都会删除），
//! 系统包经 `PackageManager` 非交互安装，最后按标记块写入 Shell 配置。

pub mod apt;
pub mod downloader;
pub mod profile;

pub use apt::{Elevation, PackageManager};
pub use downloader::FileDownloader;
pub use profile::{ProfileEdit, ProfileEditor};

use crate::core::error::{ProvisionError, ProvisionResult};
use crate::models::{InstallerSpec, Plan, PlanAction, ToolSpec};
use crate::utils::{CommandExecutor, CommandResult, TemplateVars};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// 执行输出（用于日志摘录）
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub log: Vec<String>,
    pub profile_edits: Vec<ProfileEdit>,
}

/// 执行器接口：只接收已定计划，不自行决策
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, plan: &Plan) -> ProvisionResult<ExecutionResult>;
}

/// 执行所需的共享资源（构造时注入）
pub struct ExecutionEnv {
    pub commands: CommandExecutor,
    pub downloader: FileDownloader,
    pub package_manager: PackageManager,
    pub profiles: ProfileEditor,
    pub command_timeout: Duration,
    /// 临时工作目录的父目录
    pub work_root: PathBuf,
}

impl ExecutionEnv {
    fn template_vars(&self, version: &str) -> TemplateVars {
        let platform = self.commands.platform();
        TemplateVars {
            version: version.to_string(),
            home: platform
                .home_dir
                .as_ref()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_default(),
            os_release: platform.os_release.clone().unwrap_or_default(),
            arch: platform.arch.clone(),
        }
    }
}

/// 基于工具定义的执行器
pub struct InstallerExecutor {
    spec: Arc<ToolSpec>,
    env: Arc<ExecutionEnv>,
}

impl InstallerExecutor {
    pub fn new(spec: Arc<ToolSpec>, env: Arc<ExecutionEnv>) -> Self {
        Self { spec, env }
    }

    fn ensure_supported_arch(&self, arch: &str) -> ProvisionResult<()> {
        let supported = &self.spec.architectures;
        if supported.is_empty() || supported.iter().any(|a| a == arch) {
            return Ok(());
        }
        Err(ProvisionError::package_manager(format!(
            "{} 没有 {arch} 架构的安装包（支持: {}）",
            self.spec.name,
            supported.join(", ")
        )))
    }

    async fn install_apt(
        &self,
        packages: &[String],
        repo_deb: Option<&str>,
        vars: &TemplateVars,
        reinstall: bool,
        workdir: &Path,
        log: &mut Vec<String>,
    ) -> ProvisionResult<()> {
        let pm = &self.env.package_manager;

        if let Some(template) = repo_deb {
            if template.contains("{os_release}") && vars.os_release.is_empty() {
                return Err(ProvisionError::package_manager(
                    "无法从 /etc/os-release 读取系统版本，不能确定软件源地址",
                ));
            }
            let url = vars.render(template);
            let deb = workdir.join(downloader::file_name_from_url(&url, "repo.deb"));
            self.env.downloader.download(&url, &deb).await?;
            log.extend(pm.install_local(&deb, false).await?.lines());
            log.extend(pm.update().await?.lines());
        }

        let packages: Vec<String> = packages.iter().map(|p| vars.render(p)).collect();
        log.extend(pm.install(&packages, reinstall).await?.lines());
        Ok(())
    }

    async fn install_deb(
        &self,
        url: &str,
        sha256: Option<&str>,
        vars: &TemplateVars,
        reinstall: bool,
        workdir: &Path,
        log: &mut Vec<String>,
    ) -> ProvisionResult<()> {
        let pm = &self.env.package_manager;
        let url = vars.render(url);
        let deb = workdir.join(downloader::file_name_from_url(&url, "package.deb"));
        self.env.downloader.download(&url, &deb).await?;
        if let Some(expected) = sha256 {
            crate::utils::verify_checksum(&deb, expected, &url)?;
        }

        log.extend(pm.install_local(&deb, reinstall).await?.lines());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn install_script(
        &self,
        url: &str,
        args: &[String],
        env: &std::collections::BTreeMap<String, String>,
        post_commands: &[String],
        vars: &TemplateVars,
        workdir: &Path,
        log: &mut Vec<String>,
    ) -> ProvisionResult<()> {
        let url = vars.render(url);
        let script = workdir.join("install.sh");
        self.env.downloader.download(&url, &script).await?;

        let mut script_args = vec![script.to_string_lossy().to_string()];
        script_args.extend(args.iter().map(|a| vars.render(a)));
        let envs: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.clone(), vars.render(v)))
            .collect();

        tracing::info!(tool = %self.spec.name, %url, "执行安装脚本");
        let result = self
            .env
            .commands
            .run_program("bash", &script_args, &envs, self.env.command_timeout)
            .await?;
        log.extend(result.lines());
        ensure_success("安装脚本", &result)?;

        for command in post_commands {
            let command = vars.render(command);
            tracing::info!(tool = %self.spec.name, %command, "执行后续命令");
            let result = self
                .env
                .commands
                .run_shell(&command, self.env.command_timeout)
                .await?;
            log.extend(result.lines());
            ensure_success(&command, &result)?;
        }
        Ok(())
    }
}

fn ensure_success(what: &str, result: &CommandResult) -> ProvisionResult<()> {
    if result.success {
        return Ok(());
    }
    let code = result
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let detail = result
        .stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default();
    Err(ProvisionError::package_manager(format!(
        "{what} 退出码 {code}: {detail}"
    )))
}

#[async_trait]
impl Executor for InstallerExecutor {
    async fn execute(&self, plan: &Plan) -> ProvisionResult<ExecutionResult> {
        if !plan.action.is_mutating() {
            return Ok(ExecutionResult::default());
        }

        let vars = self.env.template_vars(&plan.target_version);
        let reinstall = plan.action == PlanAction::Reinstall;
        let mut log = Vec::new();

        // 下载之前确认架构与权限
        self.ensure_supported_arch(&vars.arch)?;
        if self.spec.installer.needs_privileges() {
            self.env.package_manager.ensure_privileges().await?;
        }

        // TempDir drop 时删除目录及其中的下载产物
        let workdir = tempfile::Builder::new()
            .prefix("devsetup-")
            .tempdir_in(&self.env.work_root)
            .map_err(|e| {
                ProvisionError::download(
                    self.env.work_root.display().to_string(),
                    format!("无法创建临时目录: {e}"),
                )
            })?;

        tracing::info!(
            tool = %self.spec.name,
            action = %plan.action,
            version = %plan.target_version,
            installer = self.spec.installer.kind(),
            "开始执行"
        );

        let installed = match &self.spec.installer {
            InstallerSpec::Apt { packages, repo_deb } => {
                self.install_apt(packages, repo_deb.as_deref(), &vars, reinstall, workdir.path(), &mut log)
                    .await
            }
            InstallerSpec::Deb { url, sha256 } => {
                self.install_deb(url, sha256.as_deref(), &vars, reinstall, workdir.path(), &mut log)
                    .await
            }
            InstallerSpec::Script {
                url,
                args,
                env,
                post_commands,
            } => {
                self.install_script(url, args, env, post_commands, &vars, workdir.path(), &mut log)
                    .await
            }
        };
        cleanup(workdir);
        installed?;

        let profile_edits = if self.spec.profile_lines.is_empty() {
            Vec::new()
        } else {
            self.env
                .profiles
                .ensure_block(&self.spec.name, &self.spec.profile_lines)?
        };

        Ok(ExecutionResult { log, profile_edits })
    }
}

fn cleanup(workdir: TempDir) {
    let path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        tracing::warn!(path = %path.display(), error = %e, "清理临时目录失败");
    }
}
