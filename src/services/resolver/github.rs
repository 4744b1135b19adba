use super::{ensure_channel, fetch_text, VersionResolver};
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::utils::version::strip_tag_prefix;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const GITHUB_API: &str = "https://api.github.com";

/// GitHub release 响应中用到的字段
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

/// GitHub Releases 解析器（仅支持 latest 通道）
pub struct GithubReleaseResolver {
    client: Client,
    timeout: Duration,
    repo: String,
    tag_prefix: Option<String>,
}

impl GithubReleaseResolver {
    pub fn new(client: Client, timeout: Duration, repo: &str, tag_prefix: Option<&str>) -> Self {
        Self {
            client,
            timeout,
            repo: repo.to_string(),
            tag_prefix: tag_prefix.map(String::from),
        }
    }

    fn latest_url(&self) -> String {
        format!("{GITHUB_API}/repos/{}/releases/latest", self.repo)
    }
}

/// 解析 `releases/latest` 响应
///
/// 输入格式：`{"tag_name": "v24.11.4", "draft": false, "prerelease": false, ...}`
pub fn parse_latest_release(body: &str, tag_prefix: Option<&str>) -> ProvisionResult<String> {
    let release: Release = serde_json::from_str(body)
        .map_err(|e| ProvisionError::resolution(format!("GitHub release 响应解析失败: {e}")))?;

    if release.draft || release.prerelease {
        return Err(ProvisionError::resolution(format!(
            "latest 指向的 {} 不是正式版本",
            release.tag_name
        )));
    }

    let version = strip_tag_prefix(&release.tag_name, tag_prefix);
    if version.is_empty() {
        return Err(ProvisionError::resolution("GitHub release 的 tag_name 为空"));
    }
    Ok(version)
}

#[async_trait]
impl VersionResolver for GithubReleaseResolver {
    fn kind(&self) -> &str {
        "github-release"
    }

    fn channels(&self) -> Vec<String> {
        vec!["latest".to_string()]
    }

    async fn resolve(&self, channel: &str) -> ProvisionResult<String> {
        ensure_channel(self, channel)?;
        let body = fetch_text(&self.client, &self.latest_url(), self.timeout).await?;
        let version = parse_latest_release(&body, self.tag_prefix.as_deref())?;
        tracing::debug!(repo = %self.repo, %version, "GitHub 最新版本");
        Ok(version)
    }
}
