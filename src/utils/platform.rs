use std::path::PathBuf;

/// 当前运行平台信息
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub home_dir: Option<PathBuf>,
    /// /etc/os-release 中的 VERSION_ID（如 "22.04"）
    pub os_release: Option<String>,
    /// dpkg 架构名（amd64、arm64 等）
    pub arch: String,
}

impl PlatformInfo {
    pub fn current() -> Self {
        let os_release = std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| parse_os_release_version(&content));

        PlatformInfo {
            home_dir: dirs::home_dir(),
            os_release,
            arch: deb_architecture(std::env::consts::ARCH).to_string(),
        }
    }

    /// 构建增强的 PATH：补充用户级安装目录，使刚装好的工具无需重新登录即可检测到
    pub fn build_enhanced_path(&self) -> String {
        let current = std::env::var("PATH").unwrap_or_default();
        let mut extra: Vec<String> = Vec::new();

        if let Some(home) = &self.home_dir {
            for sub in [".local/bin", ".dotnet/tools", ".cargo/bin"] {
                extra.push(home.join(sub).to_string_lossy().to_string());
            }
        }
        for dir in ["/usr/local/bin", "/usr/bin", "/bin", "/snap/bin"] {
            extra.push(dir.to_string());
        }

        let mut parts: Vec<String> = current
            .split(':')
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        for dir in extra {
            if !parts.contains(&dir) {
                parts.push(dir);
            }
        }
        parts.join(":")
    }
}

/// Rust 目标架构名转 dpkg 架构名
pub fn deb_architecture(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "x86" => "i386",
        "powerpc64" => "ppc64el",
        other => other,
    }
}

/// 从 os-release 内容中解析 VERSION_ID
fn parse_os_release_version(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.strip_prefix("VERSION_ID=")?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
