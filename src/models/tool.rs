use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 工具定义（启动时从配置构建，运行期间不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// 失败时是否导致整体运行失败
    #[serde(default = "default_required")]
    pub required: bool,
    /// 可选的版本通道（如 "latest"、"lts"），为空时取解析器支持的全部通道
    #[serde(default)]
    pub channels: Vec<String>,
    /// 选定的版本通道
    #[serde(default)]
    pub channel: Option<String>,
    /// 检测命令（只读），同时用于提取版本号
    pub check_command: String,
    /// 版本号提取正则（第一个捕获组），为空时使用默认规则
    #[serde(default)]
    pub version_regex: Option<String>,
    pub resolver: ResolverSpec,
    pub installer: InstallerSpec,
    /// 安装产物支持的 CPU 架构（dpkg 名称，如 "amd64"），为空表示不限
    #[serde(default)]
    pub architectures: Vec<String>,
    /// 追加到 Shell 配置文件的行（按标记块幂等写入）
    #[serde(default)]
    pub profile_lines: Vec<String>,
}

fn default_required() -> bool {
    true
}

/// 远程版本来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResolverSpec {
    /// GitHub Releases API（releases/latest 的 tag_name）
    GithubRelease {
        repo: String,
        #[serde(default)]
        tag_prefix: Option<String>,
    },
    /// Node.js 发行索引（dist/index.json）
    NodeDist {
        #[serde(default = "default_node_index")]
        index_url: String,
    },
    /// .NET 发行索引（releases-index.json）
    DotnetReleaseIndex {
        #[serde(default = "default_dotnet_index")]
        index_url: String,
    },
    /// 通用 JSON：每个通道一个 URL，用 JSON Pointer 取版本字段
    JsonPointer {
        urls: BTreeMap<String, String>,
        pointer: String,
        #[serde(default)]
        strip_prefix: Option<String>,
    },
    /// 固定版本（离线或锁定版本）
    Fixed { version: String },
}

pub const NODE_DIST_INDEX: &str = "https://nodejs.org/dist/index.json";
pub const DOTNET_RELEASE_INDEX: &str =
    "https://dotnetcli.blob.core.windows.net/dotnet/release-metadata/releases-index.json";

fn default_node_index() -> String {
    NODE_DIST_INDEX.to_string()
}

fn default_dotnet_index() -> String {
    DOTNET_RELEASE_INDEX.to_string()
}

impl ResolverSpec {
    /// 解析器能识别的通道
    pub fn supported_channels(&self) -> Vec<String> {
        match self {
            ResolverSpec::GithubRelease { .. } => vec!["latest".to_string()],
            ResolverSpec::NodeDist { .. } | ResolverSpec::DotnetReleaseIndex { .. } => {
                vec!["latest".to_string(), "lts".to_string()]
            }
            ResolverSpec::JsonPointer { urls, .. } => urls.keys().cloned().collect(),
            ResolverSpec::Fixed { .. } => vec!["pinned".to_string()],
        }
    }

    /// 需要校验的远程 URL
    pub fn urls(&self) -> Vec<&str> {
        match self {
            ResolverSpec::GithubRelease { .. } | ResolverSpec::Fixed { .. } => vec![],
            ResolverSpec::NodeDist { index_url } | ResolverSpec::DotnetReleaseIndex { index_url } => {
                vec![index_url.as_str()]
            }
            ResolverSpec::JsonPointer { urls, .. } => urls.values().map(String::as_str).collect(),
        }
    }
}

/// 安装方式
///
/// URL、包名、命令中可使用模板变量：`{version}`、`{major}`、`{minor}`、
/// `{patch}`、`{home}`、`{os_release}`、`{arch}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallerSpec {
    /// apt-get 安装（可先安装仓库引导包）
    Apt {
        packages: Vec<String>,
        #[serde(default)]
        repo_deb: Option<String>,
    },
    /// 下载 .deb 后用 apt-get 安装
    Deb {
        url: String,
        #[serde(default)]
        sha256: Option<String>,
    },
    /// 下载远程安装脚本并用 bash 执行
    Script {
        url: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        /// 脚本成功后依次执行的命令（sh -c）
        #[serde(default)]
        post_commands: Vec<String>,
    },
}

impl InstallerSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            InstallerSpec::Apt { .. } => "apt",
            InstallerSpec::Deb { .. } => "deb",
            InstallerSpec::Script { .. } => "script",
        }
    }

    /// 是否需要 root/sudo
    pub fn needs_privileges(&self) -> bool {
        matches!(self, InstallerSpec::Apt { .. } | InstallerSpec::Deb { .. })
    }
}

/// 本地检测结果（每次检测重新生成）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub installed: bool,
    pub version: Option<String>,
    /// 检测命令原始输出
    pub raw_output: String,
}

impl ProbeResult {
    pub fn absent(raw_output: impl Into<String>) -> Self {
        Self {
            installed: false,
            version: None,
            raw_output: raw_output.into(),
        }
    }

    pub fn present(version: Option<String>, raw_output: impl Into<String>) -> Self {
        Self {
            installed: true,
            version,
            raw_output: raw_output.into(),
        }
    }
}

impl ToolSpec {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// 内置工具清单（按依赖顺序：运行时 → 包管理工具 → Shell 集成）
    pub fn builtin() -> Vec<ToolSpec> {
        vec![
            Self::dotnet_sdk(),
            Self::powershell(),
            Self::nodejs(),
            Self::uv(),
            Self::oh_my_posh(),
        ]
    }

    /// .NET SDK：微软仓库 + apt
    pub fn dotnet_sdk() -> ToolSpec {
        ToolSpec {
            name: "dotnet-sdk".to_string(),
            display_name: Some(".NET SDK".to_string()),
            required: true,
            channels: vec!["latest".to_string(), "lts".to_string()],
            channel: Some("lts".to_string()),
            check_command: "dotnet --version".to_string(),
            version_regex: None,
            resolver: ResolverSpec::DotnetReleaseIndex {
                index_url: default_dotnet_index(),
            },
            installer: InstallerSpec::Apt {
                packages: vec!["dotnet-sdk-{major}.{minor}".to_string()],
                repo_deb: Some(
                    "https://packages.microsoft.com/config/ubuntu/{os_release}/packages-microsoft-prod.deb"
                        .to_string(),
                ),
            },
            architectures: vec![],
            profile_lines: vec![
                "export DOTNET_CLI_TELEMETRY_OPTOUT=1".to_string(),
                r#"export PATH="$PATH:$HOME/.dotnet/tools""#.to_string(),
            ],
        }
    }

    /// PowerShell：GitHub Release 的 .deb 包
    pub fn powershell() -> ToolSpec {
        let mut urls = BTreeMap::new();
        urls.insert(
            "latest".to_string(),
            "https://aka.ms/pwsh-buildinfo-stable".to_string(),
        );
        urls.insert(
            "lts".to_string(),
            "https://aka.ms/pwsh-buildinfo-lts".to_string(),
        );

        ToolSpec {
            name: "powershell".to_string(),
            display_name: Some("PowerShell".to_string()),
            required: true,
            channels: vec!["latest".to_string(), "lts".to_string()],
            channel: Some("lts".to_string()),
            check_command: "pwsh --version".to_string(),
            version_regex: None,
            resolver: ResolverSpec::JsonPointer {
                urls,
                pointer: "/ReleaseTag".to_string(),
                strip_prefix: Some("v".to_string()),
            },
            installer: InstallerSpec::Deb {
                url: "https://github.com/PowerShell/PowerShell/releases/download/v{version}/powershell_{version}-1.deb_{arch}.deb"
                    .to_string(),
                sha256: None,
            },
            architectures: vec!["amd64".to_string()],
            profile_lines: vec![],
        }
    }

    /// Node.js：nvm 安装脚本 + nvm install
    pub fn nodejs() -> ToolSpec {
        let mut env = BTreeMap::new();
        // 由本工具负责写入配置块，禁止 nvm 自行修改配置文件
        env.insert("PROFILE".to_string(), "/dev/null".to_string());

        ToolSpec {
            name: "nodejs".to_string(),
            display_name: Some("Node.js".to_string()),
            required: true,
            channels: vec!["latest".to_string(), "lts".to_string()],
            channel: Some("lts".to_string()),
            check_command: r#"bash -c '[ -s "$HOME/.nvm/nvm.sh" ] && . "$HOME/.nvm/nvm.sh"; node --version'"#
                .to_string(),
            version_regex: None,
            resolver: ResolverSpec::NodeDist {
                index_url: default_node_index(),
            },
            installer: InstallerSpec::Script {
                url: "https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.1/install.sh".to_string(),
                args: vec![],
                env,
                post_commands: vec![
                    r#"bash -c '. "$HOME/.nvm/nvm.sh" && nvm install {version} && nvm alias default {version}'"#
                        .to_string(),
                ],
            },
            architectures: vec![],
            profile_lines: vec![
                r#"export NVM_DIR="$HOME/.nvm""#.to_string(),
                r#"[ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh""#.to_string(),
            ],
        }
    }

    /// uv：astral 官方安装脚本（按版本固定）
    pub fn uv() -> ToolSpec {
        let mut env = BTreeMap::new();
        env.insert("UV_NO_MODIFY_PATH".to_string(), "1".to_string());

        ToolSpec {
            name: "uv".to_string(),
            display_name: Some("uv (Python)".to_string()),
            required: true,
            channels: vec!["latest".to_string()],
            channel: None,
            check_command: "uv --version".to_string(),
            version_regex: None,
            resolver: ResolverSpec::GithubRelease {
                repo: "astral-sh/uv".to_string(),
                tag_prefix: None,
            },
            installer: InstallerSpec::Script {
                url: "https://astral.sh/uv/{version}/install.sh".to_string(),
                args: vec![],
                env,
                post_commands: vec![],
            },
            architectures: vec![],
            profile_lines: vec![r#"export PATH="$HOME/.local/bin:$PATH""#.to_string()],
        }
    }

    /// oh-my-posh：Shell 提示符美化，可选
    pub fn oh_my_posh() -> ToolSpec {
        ToolSpec {
            name: "oh-my-posh".to_string(),
            display_name: Some("Oh My Posh".to_string()),
            required: false,
            channels: vec!["latest".to_string()],
            channel: None,
            check_command: "oh-my-posh version".to_string(),
            version_regex: None,
            resolver: ResolverSpec::GithubRelease {
                repo: "JanDeDobbeleer/oh-my-posh".to_string(),
                tag_prefix: Some("v".to_string()),
            },
            installer: InstallerSpec::Script {
                url: "https://ohmyposh.dev/install.sh".to_string(),
                args: vec!["-d".to_string(), "{home}/.local/bin".to_string()],
                env: BTreeMap::new(),
                post_commands: vec![],
            },
            architectures: vec![],
            profile_lines: vec![r#"eval "$(oh-my-posh init bash)""#.to_string()],
        }
    }
}
