// 版本解析器
//
// 查询远程来源获得某个通道（latest/lts/pinned）对应的版本号。
// 每个工具使用独立的解析器实例，不跨工具缓存。

mod dotnet;
mod fixed;
mod github;
mod json_pointer;
mod node_dist;

pub use dotnet::{select_dotnet_channel, select_feature_band_sdk, DotnetReleaseResolver};
pub use fixed::FixedResolver;
pub use github::{parse_latest_release, GithubReleaseResolver};
pub use json_pointer::{extract_pointer, JsonPointerResolver};
pub use node_dist::{select_node_version, NodeDistResolver};

use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::http::with_github_auth;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// 版本解析器 Trait
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// 解析器类型（如 "node-dist"）
    fn kind(&self) -> &str;

    /// 能识别的通道
    fn channels(&self) -> Vec<String>;

    /// 解析通道对应的版本号
    ///
    /// 未识别的通道必须在任何网络请求之前返回 `ConfigError`。
    async fn resolve(&self, channel: &str) -> ProvisionResult<String>;
}

/// 检查通道是否被识别
pub fn ensure_channel(resolver: &dyn VersionResolver, channel: &str) -> ProvisionResult<()> {
    let channels = resolver.channels();
    if channels.iter().any(|c| c == channel) {
        Ok(())
    } else {
        Err(ProvisionError::config(format!(
            "解析器 {} 不支持通道 \"{}\"（可用: {}）",
            resolver.kind(),
            channel,
            channels.join(", ")
        )))
    }
}

/// 带单次重试的解析器包装
///
/// 网络/解析/超时错误在短暂等待后重试一次；最终的超时错误以 `ResolutionError` 上报。
pub struct RetryingResolver {
    inner: Arc<dyn VersionResolver>,
    backoff: Duration,
    max_attempts: u32,
}

impl RetryingResolver {
    pub fn new(inner: Arc<dyn VersionResolver>, backoff: Duration) -> Self {
        Self {
            inner,
            backoff,
            max_attempts: 2,
        }
    }
}

#[async_trait]
impl VersionResolver for RetryingResolver {
    fn kind(&self) -> &str {
        self.inner.kind()
    }

    fn channels(&self) -> Vec<String> {
        self.inner.channels()
    }

    async fn resolve(&self, channel: &str) -> ProvisionResult<String> {
        ensure_channel(self, channel)?;

        let mut attempt = 1;
        loop {
            match self.inner.resolve(channel).await {
                Ok(version) => return Ok(version),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        resolver = self.kind(),
                        channel,
                        attempt,
                        error = %e,
                        "版本查询失败，稍后重试"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(ProvisionError::Timeout { operation, seconds }) => {
                    return Err(ProvisionError::resolution(format!(
                        "{operation} 超时（{seconds} 秒），已重试 {} 次",
                        attempt - 1
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// GET 文本响应；超时返回 `TimeoutError`，其余网络/状态码错误返回 `ResolutionError`
pub(crate) async fn fetch_text(client: &Client, url: &str, timeout: Duration) -> ProvisionResult<String> {
    tracing::debug!(url, "请求版本元数据");

    let request = with_github_auth(
        client
            .get(url)
            .header("Accept", "application/json")
            .timeout(timeout),
        url,
    );

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProvisionError::timeout(format!("GET {url}"), timeout.as_secs())
        } else {
            ProvisionError::resolution(format!("请求 {url} 失败: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProvisionError::resolution(format!(
            "{url} 返回状态码 {status}"
        )));
    }

    response.text().await.map_err(|e| {
        if e.is_timeout() {
            ProvisionError::timeout(format!("GET {url}"), timeout.as_secs())
        } else {
            ProvisionError::resolution(format!("读取 {url} 响应失败: {e}"))
        }
    })
}
