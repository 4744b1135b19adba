use super::{ensure_channel, fetch_text, VersionResolver};
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::utils::parse_version;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// apt 源（Ubuntu 与 packages.microsoft.com）只发布 1xx 特性带的 SDK
const APT_FEATURE_BAND: u64 = 1;

#[derive(Debug, Deserialize)]
struct ReleasesIndex {
    #[serde(rename = "releases-index")]
    releases: Vec<ChannelEntry>,
}

/// releases-index.json 中的一个通道
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEntry {
    #[serde(rename = "channel-version")]
    pub channel_version: String,
    #[serde(rename = "release-type")]
    release_type: String,
    #[serde(rename = "support-phase")]
    support_phase: String,
    /// 该通道的 releases.json 地址
    #[serde(rename = "releases.json")]
    pub releases_url: String,
}

impl ChannelEntry {
    fn is_active(&self) -> bool {
        self.support_phase == "active"
    }
}

#[derive(Debug, Deserialize)]
struct ChannelReleases {
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    sdk: Option<SdkEntry>,
    #[serde(default)]
    sdks: Vec<SdkEntry>,
}

#[derive(Debug, Deserialize)]
struct SdkEntry {
    version: String,
}

/// .NET 发行元数据解析器
///
/// 先从 releases-index.json 选出通道，再从该通道的 releases.json 中
/// 取 1xx 特性带的最新 SDK，与 `dotnet-sdk-X.Y` 软件包安装的版本一致。
pub struct DotnetReleaseResolver {
    client: Client,
    timeout: Duration,
    index_url: String,
}

impl DotnetReleaseResolver {
    pub fn new(client: Client, timeout: Duration, index_url: &str) -> Self {
        Self {
            client,
            timeout,
            index_url: index_url.to_string(),
        }
    }
}

/// 从 releases-index.json 选出通道
///
/// 索引按 channel-version 倒序；只考虑 support-phase 为 active 的通道
/// （preview/go-live/eol 均跳过）。`lts` 额外要求 release-type 为 lts。
pub fn select_dotnet_channel(body: &str, channel: &str) -> ProvisionResult<ChannelEntry> {
    let index: ReleasesIndex = serde_json::from_str(body)
        .map_err(|e| ProvisionError::resolution(format!(".NET 发行索引解析失败: {e}")))?;

    let entry = match channel {
        "latest" => index.releases.iter().find(|r| r.is_active()),
        "lts" => index
            .releases
            .iter()
            .find(|r| r.is_active() && r.release_type == "lts"),
        other => {
            return Err(ProvisionError::config(format!(
                ".NET 不支持通道 \"{other}\""
            )))
        }
    };

    entry.cloned().ok_or_else(|| {
        ProvisionError::resolution(format!(".NET 发行索引中没有处于支持期的 {channel} 通道"))
    })
}

/// 从通道的 releases.json 中取 1xx 特性带的最新正式版 SDK
///
/// SDK 补丁号的百位即特性带（8.0.111 → 1，8.0.404 → 4）。
pub fn select_feature_band_sdk(body: &str) -> ProvisionResult<String> {
    let channel: ChannelReleases = serde_json::from_str(body)
        .map_err(|e| ProvisionError::resolution(format!(".NET 通道发行记录解析失败: {e}")))?;

    channel
        .releases
        .iter()
        .flat_map(|r| r.sdk.iter().chain(r.sdks.iter()))
        .filter_map(|sdk| parse_version(&sdk.version))
        .filter(|v| v.pre.is_empty() && v.patch / 100 == APT_FEATURE_BAND)
        .max()
        .map(|v| v.to_string())
        .ok_or_else(|| {
            ProvisionError::resolution(format!(
                ".NET 通道发行记录中没有 {APT_FEATURE_BAND}xx 特性带的 SDK"
            ))
        })
}

#[async_trait]
impl VersionResolver for DotnetReleaseResolver {
    fn kind(&self) -> &str {
        "dotnet-release-index"
    }

    fn channels(&self) -> Vec<String> {
        vec!["latest".to_string(), "lts".to_string()]
    }

    async fn resolve(&self, channel: &str) -> ProvisionResult<String> {
        ensure_channel(self, channel)?;
        let index = fetch_text(&self.client, &self.index_url, self.timeout).await?;
        let entry = select_dotnet_channel(&index, channel)?;
        tracing::debug!(channel_version = %entry.channel_version, "选中 .NET 通道");

        let releases = fetch_text(&self.client, &entry.releases_url, self.timeout).await?;
        select_feature_band_sdk(&releases)
    }
}
