//! 配置加载与校验
//!
//! 查找顺序：`--config`（或 `DEVSETUP_CONFIG`）→ `~/.devsetup/tools.toml` → 内置工具清单。
//! 所有校验失败都是 `ConfigError`，发生在任何变更之前。

use super::probe::version_pattern;
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::models::{InstallerSpec, ProvisionConfig, ResolverSpec, ToolSpec};
use crate::utils::TemplateVars;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DEVSETUP_CONFIG";

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Builtin => f.write_str("内置工具清单"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProvisionConfig,
    pub source: ConfigSource,
}

/// devsetup 配置目录 (~/.devsetup)
pub fn config_dir() -> ProvisionResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProvisionError::config("无法获取用户主目录（HOME 未设置）"))?;
    Ok(home.join(".devsetup"))
}

/// 默认配置文件路径
pub fn default_config_path() -> ProvisionResult<PathBuf> {
    Ok(config_dir()?.join("tools.toml"))
}

/// 加载配置；显式指定的文件必须存在
pub fn load_config(explicit: Option<&Path>) -> ProvisionResult<LoadedConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(ProvisionError::config(format!(
                    "配置文件不存在: {}",
                    path.display()
                )));
            }
            Some(path.to_path_buf())
        }
        None => {
            let default = default_config_path()?;
            default.is_file().then_some(default)
        }
    };

    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "读取配置文件");
            let content = fs::read_to_string(&path).map_err(|e| {
                ProvisionError::config(format!("读取配置文件失败 {}: {e}", path.display()))
            })?;
            let config = parse_config(&content)
                .map_err(|e| ProvisionError::config(format!("{}: {e}", path.display())))?;
            Ok(LoadedConfig {
                config,
                source: ConfigSource::File(path),
            })
        }
        None => {
            tracing::debug!("未找到配置文件，使用内置工具清单");
            let config = ProvisionConfig {
                settings: Default::default(),
                tools: ToolSpec::builtin(),
            };
            validate(&config)?;
            Ok(LoadedConfig {
                config,
                source: ConfigSource::Builtin,
            })
        }
    }
}

/// 解析 TOML 配置；未声明工具时使用内置清单
pub fn parse_config(content: &str) -> ProvisionResult<ProvisionConfig> {
    let mut config: ProvisionConfig =
        toml::from_str(content).map_err(|e| ProvisionError::config(format!("TOML 解析失败: {e}")))?;

    if config.tools.is_empty() {
        config.tools = ToolSpec::builtin();
    }
    for tool in &mut config.tools {
        if tool.channels.is_empty() {
            tool.channels = tool.resolver.supported_channels();
        }
    }

    validate(&config)?;
    Ok(config)
}

/// 校验工具清单
pub fn validate(config: &ProvisionConfig) -> ProvisionResult<()> {
    let mut seen = HashSet::new();
    for tool in &config.tools {
        if !seen.insert(tool.name.as_str()) {
            return Err(ProvisionError::config(format!("工具名重复: {}", tool.name)));
        }
        validate_tool(tool)?;
    }
    Ok(())
}

fn validate_tool(tool: &ToolSpec) -> ProvisionResult<()> {
    let name = &tool.name;
    let invalid = |msg: String| ProvisionError::config(format!("工具 {name}: {msg}"));

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(invalid("名称只能包含字母、数字、'-'、'_'、'.'".to_string()));
    }
    if tool.check_command.trim().is_empty() {
        return Err(invalid("检测命令为空".to_string()));
    }
    version_pattern(tool)?;

    let supported = tool.resolver.supported_channels();
    if let Some(unknown) = tool.channels.iter().find(|c| !supported.contains(c)) {
        return Err(invalid(format!(
            "解析器不支持通道 \"{unknown}\"（可用: {}）",
            supported.join(", ")
        )));
    }
    if let Some(channel) = &tool.channel {
        if !tool.channels.contains(channel) {
            return Err(invalid(format!(
                "通道 \"{channel}\" 不在可选通道中（可用: {}）",
                tool.channels.join(", ")
            )));
        }
    }

    match &tool.resolver {
        ResolverSpec::GithubRelease { repo, .. } => {
            let parts: Vec<&str> = repo.split('/').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                return Err(invalid(format!("GitHub 仓库格式应为 owner/name: {repo}")));
            }
        }
        ResolverSpec::JsonPointer { pointer, .. } => {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(invalid(format!("JSON Pointer 必须以 '/' 开头: {pointer}")));
            }
        }
        ResolverSpec::Fixed { version } if version.trim().is_empty() => {
            return Err(invalid("固定版本为空".to_string()));
        }
        _ => {}
    }
    for url in tool.resolver.urls() {
        validate_url(url).map_err(invalid)?;
    }

    let sample = TemplateVars {
        version: "1.0.0".to_string(),
        home: "/home/user".to_string(),
        os_release: "24.04".to_string(),
        arch: "amd64".to_string(),
    };
    match &tool.installer {
        InstallerSpec::Apt { packages, repo_deb } => {
            if packages.is_empty() {
                return Err(invalid("apt 安装方式未指定软件包".to_string()));
            }
            if let Some(url) = repo_deb {
                validate_url(&sample.render(url)).map_err(invalid)?;
            }
        }
        InstallerSpec::Deb { url, .. } | InstallerSpec::Script { url, .. } => {
            validate_url(&sample.render(url)).map_err(invalid)?;
        }
    }
    Ok(())
}

fn validate_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("无效的 URL {raw}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("不支持的 URL 协议 {other}: {raw}")),
    }
}

/// 命令行指定的通道：`lts`（全局）或 `nodejs=lts`（单个工具）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOverrides {
    global: Option<String>,
    per_tool: BTreeMap<String, String>,
}

impl ChannelOverrides {
    pub fn parse(values: &[String]) -> ProvisionResult<Self> {
        let mut overrides = Self::default();
        for value in values {
            match value.split_once('=') {
                Some((tool, channel)) => {
                    let (tool, channel) = (tool.trim(), channel.trim());
                    if tool.is_empty() || channel.is_empty() {
                        return Err(ProvisionError::config(format!(
                            "无效的 --channel 参数: {value}（应为 CHANNEL 或 TOOL=CHANNEL）"
                        )));
                    }
                    overrides
                        .per_tool
                        .insert(tool.to_string(), channel.to_string());
                }
                None => {
                    let channel = value.trim();
                    if channel.is_empty() {
                        return Err(ProvisionError::config("--channel 参数为空"));
                    }
                    if let Some(previous) = &overrides.global {
                        if previous != channel {
                            return Err(ProvisionError::config(format!(
                                "--channel 指定了多个全局通道: {previous}, {channel}"
                            )));
                        }
                    }
                    overrides.global = Some(channel.to_string());
                }
            }
        }
        Ok(overrides)
    }

    pub fn global(&self) -> Option<&str> {
        self.global.as_deref()
    }

    /// 引用了不存在工具的覆盖项
    pub fn unknown_tools<'a>(&'a self, tools: &[ToolSpec]) -> Vec<&'a str> {
        self.per_tool
            .keys()
            .filter(|name| !tools.iter().any(|t| &t.name == *name))
            .map(String::as_str)
            .collect()
    }

    /// 按优先级确定工具的通道：TOOL=CHANNEL → 全局（工具支持时）→ 配置 → 唯一通道
    pub fn channel_for(&self, tool: &ToolSpec) -> ProvisionResult<String> {
        if let Some(channel) = self.per_tool.get(&tool.name) {
            if !tool.channels.contains(channel) {
                return Err(ProvisionError::config(format!(
                    "工具 {} 不支持通道 \"{channel}\"（可用: {}）",
                    tool.name,
                    tool.channels.join(", ")
                )));
            }
            return Ok(channel.clone());
        }
        if let Some(channel) = self.global.as_ref().filter(|c| tool.channels.contains(c)) {
            return Ok(channel.clone());
        }
        if let Some(channel) = &tool.channel {
            return Ok(channel.clone());
        }
        if let [only] = tool.channels.as_slice() {
            return Ok(only.clone());
        }
        Err(ProvisionError::config(format!(
            "工具 {} 需要指定通道（可用: {}），使用 --channel 或配置文件中的 channel",
            tool.name,
            tool.channels.join(", ")
        )))
    }
}

/// 按配置顺序选出要处理的工具；未指定时全部处理
pub fn select_tools(tools: &[ToolSpec], requested: &[String]) -> ProvisionResult<Vec<ToolSpec>> {
    if let Some(unknown) = requested
        .iter()
        .find(|name| !tools.iter().any(|t| &t.name == *name))
    {
        let known: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        return Err(ProvisionError::config(format!(
            "未知工具: {unknown}（可用: {}）",
            known.join(", ")
        )));
    }

    Ok(tools
        .iter()
        .filter(|t| requested.is_empty() || requested.contains(&t.name))
        .cloned()
        .collect())
}
