//! 工具注册表
//!
//! 根据设置构建共享资源（HTTP 客户端、执行环境），并为每个工具组装
//! 解析器与执行器，生成 `Sequencer` 的输入。

use super::config::ChannelOverrides;
use super::executor::{
    ExecutionEnv, Executor, FileDownloader, InstallerExecutor, PackageManager, ProfileEditor,
};
use super::probe::{CommandProbe, StateProbe};
use super::resolver::{
    DotnetReleaseResolver, FixedResolver, GithubReleaseResolver, JsonPointerResolver,
    NodeDistResolver, RetryingResolver, VersionResolver,
};
use super::sequencer::ProvisionTarget;
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::http::{build_http_client, HttpTimeouts};
use crate::models::{ResolverSpec, Settings, ToolSpec};
use crate::utils::CommandExecutor;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub struct ToolRegistry {
    metadata_client: Client,
    timeouts: HttpTimeouts,
    retry_backoff: Duration,
    commands: CommandExecutor,
    env: Arc<ExecutionEnv>,
}

impl ToolRegistry {
    /// 按设置创建注册表（代理无效时返回 `ConfigError`）
    pub fn new(settings: &Settings) -> ProvisionResult<Self> {
        let timeouts = settings.http_timeouts();
        let proxy = settings.proxy.as_deref();
        let metadata_client = build_http_client(proxy, timeouts.metadata)?;
        let download_client = build_http_client(proxy, timeouts.download)?;
        let commands = CommandExecutor::new();
        let profiles = ProfileEditor::for_home(settings.profile_files.clone())?;

        let env = ExecutionEnv {
            commands: commands.clone(),
            downloader: FileDownloader::new(download_client, timeouts.download, settings.retry_backoff()),
            package_manager: PackageManager::new(commands.clone(), settings.command_timeout()),
            profiles,
            command_timeout: settings.command_timeout(),
            work_root: std::env::temp_dir(),
        };

        tracing::debug!(
            proxy = proxy.unwrap_or("(环境变量)"),
            metadata_timeout = timeouts.metadata.as_secs(),
            download_timeout = timeouts.download.as_secs(),
            "注册表初始化完成"
        );

        Ok(Self {
            metadata_client,
            timeouts,
            retry_backoff: settings.retry_backoff(),
            commands,
            env: Arc::new(env),
        })
    }

    /// 检测器（只读）
    pub fn probe(&self) -> Arc<dyn StateProbe> {
        Arc::new(CommandProbe::new(self.commands.clone()))
    }

    /// 为工具创建带重试的解析器（每个工具独立实例）
    pub fn resolver_for(&self, spec: &ResolverSpec) -> Arc<dyn VersionResolver> {
        let client = self.metadata_client.clone();
        let timeout = self.timeouts.metadata;
        let inner: Arc<dyn VersionResolver> = match spec {
            ResolverSpec::GithubRelease { repo, tag_prefix } => Arc::new(GithubReleaseResolver::new(
                client,
                timeout,
                repo,
                tag_prefix.as_deref(),
            )),
            ResolverSpec::NodeDist { index_url } => {
                Arc::new(NodeDistResolver::new(client, timeout, index_url))
            }
            ResolverSpec::DotnetReleaseIndex { index_url } => {
                Arc::new(DotnetReleaseResolver::new(client, timeout, index_url))
            }
            ResolverSpec::JsonPointer {
                urls,
                pointer,
                strip_prefix,
            } => Arc::new(JsonPointerResolver::new(
                client,
                timeout,
                urls.clone(),
                pointer,
                strip_prefix.as_deref(),
            )),
            ResolverSpec::Fixed { version } => Arc::new(FixedResolver::new(version)),
        };
        Arc::new(RetryingResolver::new(inner, self.retry_backoff))
    }

    pub fn executor_for(&self, spec: Arc<ToolSpec>) -> Arc<dyn Executor> {
        Arc::new(InstallerExecutor::new(spec, self.env.clone()))
    }

    /// 组装编排输入；所有工具的通道都必须能确定，否则不处理任何工具
    pub fn targets(
        &self,
        tools: &[ToolSpec],
        overrides: &ChannelOverrides,
    ) -> ProvisionResult<Vec<ProvisionTarget>> {
        let unknown = overrides.unknown_tools(tools);
        if !unknown.is_empty() {
            return Err(ProvisionError::config(format!(
                "--channel 引用了未选中的工具: {}",
                unknown.join(", ")
            )));
        }
        if let Some(global) = overrides.global() {
            if !tools.iter().any(|t| t.channels.iter().any(|c| c == global)) {
                return Err(ProvisionError::config(format!(
                    "没有工具支持通道 \"{global}\""
                )));
            }
        }

        tools
            .iter()
            .map(|tool| {
                let channel = overrides.channel_for(tool)?;
                let spec = Arc::new(tool.clone());
                Ok(ProvisionTarget {
                    resolver: self.resolver_for(&spec.resolver),
                    executor: self.executor_for(spec.clone()),
                    spec,
                    channel,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use serial_test::serial;

    fn strs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    #[serial]
    fn test_targets_follow_tool_order_and_channels() {
        let registry = ToolRegistry::new(&Settings::default()).unwrap();
        let overrides = ChannelOverrides::parse(&strs(&["latest", "dotnet-sdk=lts"])).unwrap();

        let targets = registry.targets(&ToolSpec::builtin(), &overrides).unwrap();
        let summary: Vec<(&str, &str)> = targets
            .iter()
            .map(|t| (t.spec.name.as_str(), t.channel.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("dotnet-sdk", "lts"),
                ("powershell", "latest"),
                ("nodejs", "latest"),
                ("uv", "latest"),
                ("oh-my-posh", "latest"),
            ]
        );
        assert_eq!(targets[2].resolver.kind(), "node-dist");
    }

    #[test]
    #[serial]
    fn test_override_for_unselected_tool_is_config_error() {
        let registry = ToolRegistry::new(&Settings::default()).unwrap();
        let overrides = ChannelOverrides::parse(&strs(&["nodejs=lts"])).unwrap();

        let err = match registry.targets(&[ToolSpec::uv()], &overrides) {
            Ok(_) => panic!("应当失败"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    #[serial]
    fn test_global_channel_nobody_offers() {
        let registry = ToolRegistry::new(&Settings::default()).unwrap();
        let overrides = ChannelOverrides::parse(&strs(&["lts"])).unwrap();

        assert!(registry.targets(&[ToolSpec::uv()], &overrides).is_err());
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let settings = Settings {
            proxy: Some("http://[::1".to_string()),
            ..Default::default()
        };
        let err = match ToolRegistry::new(&settings) {
            Ok(_) => panic!("应当失败"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
