use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

/// 默认版本号提取规则：匹配 v1.2.3 或 1.2.3-beta.1
static DEFAULT_EXTRACT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)").expect("invalid version regex")
});

/// 从命令输出中提取版本号
///
/// `pattern` 为工具自定义正则，取第一个捕获组（没有捕获组时取整个匹配）。
pub fn extract_version(output: &str, pattern: Option<&Regex>) -> Option<String> {
    let re = pattern.unwrap_or(&DEFAULT_EXTRACT_REGEX);
    let captures = re.captures(output)?;
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 解析版本号为 semver（容忍 "v" 或 "rust-v" 等前缀）
pub fn parse_version(version: &str) -> Option<Version> {
    let matched = extract_version(version.trim(), None)?;
    Version::parse(&matched).ok()
}

/// 版本是否相等；任一方无法解析时视为不相等
pub fn versions_equal(installed: Option<&str>, target: &str) -> bool {
    match (installed.and_then(parse_version), parse_version(target)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// 去掉 tag 前缀（如 "v7.4.6" -> "7.4.6"）
pub fn strip_tag_prefix(tag: &str, prefix: Option<&str>) -> String {
    let tag = tag.trim();
    match prefix {
        Some(p) if !p.is_empty() => tag.strip_prefix(p).unwrap_or(tag).to_string(),
        _ => tag.to_string(),
    }
}

/// 安装模板变量
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub version: String,
    pub home: String,
    pub os_release: String,
    /// dpkg 架构名
    pub arch: String,
}

impl TemplateVars {
    /// 替换 `{version}`、`{major}`、`{minor}`、`{patch}`、`{home}`、`{os_release}`、`{arch}`
    pub fn render(&self, template: &str) -> String {
        let parsed = parse_version(&self.version);
        let (major, minor, patch) = parsed
            .map(|v| (v.major.to_string(), v.minor.to_string(), v.patch.to_string()))
            .unwrap_or_default();

        template
            .replace("{version}", &self.version)
            .replace("{major}", &major)
            .replace("{minor}", &minor)
            .replace("{patch}", &patch)
            .replace("{home}", &self.home)
            .replace("{os_release}", &self.os_release)
            .replace("{arch}", &self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("v2.0.5").unwrap(), Version::new(2, 0, 5));
        assert_eq!(
            parse_version("PowerShell 7.4.6").unwrap(),
            Version::new(7, 4, 6)
        );
        assert_eq!(
            parse_version("0.13.0-preview.2").unwrap(),
            Version::parse("0.13.0-preview.2").unwrap()
        );
        assert!(parse_version("8.0").is_none());
        assert!(parse_version("garbage").is_none());
    }

    #[test]
    fn test_versions_equal() {
        assert!(versions_equal(Some("v22.11.0"), "22.11.0"));
        assert!(versions_equal(Some("uv 0.5.1"), "0.5.1"));
        assert!(!versions_equal(Some("7.4.5"), "7.4.6"));
        assert!(!versions_equal(None, "7.4.6"));
        // 无法比较时视为不相等
        assert!(!versions_equal(Some("unknown"), "unknown"));
    }

    #[test]
    fn test_extract_with_custom_pattern() {
        let re = Regex::new(r"SDK (\d+\.\d+\.\d+)").unwrap();
        assert_eq!(
            extract_version("Runtime 8.0.1\nSDK 8.0.404", Some(&re)),
            Some("8.0.404".to_string())
        );
        let whole = Regex::new(r"\d+\.\d+\.\d+").unwrap();
        assert_eq!(
            extract_version("ver 1.2.3", Some(&whole)),
            Some("1.2.3".to_string())
        );
        assert_eq!(extract_version("no digits", None), None);
    }

    #[test]
    fn test_strip_tag_prefix() {
        assert_eq!(strip_tag_prefix("v24.11.4", Some("v")), "24.11.4");
        assert_eq!(strip_tag_prefix("0.5.1", Some("v")), "0.5.1");
        assert_eq!(strip_tag_prefix(" 0.5.1 ", None), "0.5.1");
    }

    #[test]
    fn test_template_render() {
        let vars = TemplateVars {
            version: "8.0.404".to_string(),
            home: "/home/dev".to_string(),
            os_release: "22.04".to_string(),
            arch: "arm64".to_string(),
        };
        assert_eq!(vars.render("dotnet-sdk-{major}.{minor}"), "dotnet-sdk-8.0");
        assert_eq!(
            vars.render("https://packages.microsoft.com/config/ubuntu/{os_release}/x.deb"),
            "https://packages.microsoft.com/config/ubuntu/22.04/x.deb"
        );
        assert_eq!(vars.render("{home}/.local/bin"), "/home/dev/.local/bin");
        assert_eq!(vars.render("pkg_{version}_{arch}.deb"), "pkg_8.0.404_arm64.deb");
        assert_eq!(vars.render("v{version}-{patch}"), "v8.0.404-404");
    }
}
