use super::{ensure_channel, fetch_text, VersionResolver};
use crate::core::error::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// dist/index.json 中的一条记录
#[derive(Debug, Deserialize)]
struct NodeRelease {
    version: String,
    /// 非 LTS 为 false，LTS 为代号字符串（如 "Jod"）
    #[serde(default)]
    lts: Value,
}

/// Node.js 发行索引解析器
pub struct NodeDistResolver {
    client: Client,
    timeout: Duration,
    index_url: String,
}

impl NodeDistResolver {
    pub fn new(client: Client, timeout: Duration, index_url: &str) -> Self {
        Self {
            client,
            timeout,
            index_url: index_url.to_string(),
        }
    }
}

/// 从 index.json 选出通道对应的版本
///
/// 索引按发布时间倒序：`latest` 取第一条，`lts` 取第一条 `lts` 为字符串的记录。
/// 返回值去掉前导 "v"。
pub fn select_node_version(body: &str, channel: &str) -> ProvisionResult<String> {
    let releases: Vec<NodeRelease> = serde_json::from_str(body)
        .map_err(|e| ProvisionError::resolution(format!("Node.js 发行索引解析失败: {e}")))?;

    let release = match channel {
        "latest" => releases.first(),
        "lts" => releases.iter().find(|r| r.lts.is_string()),
        other => {
            return Err(ProvisionError::config(format!(
                "Node.js 不支持通道 \"{other}\""
            )))
        }
    };

    release
        .map(|r| r.version.trim_start_matches('v').to_string())
        .ok_or_else(|| ProvisionError::resolution(format!("Node.js 发行索引中没有 {channel} 版本")))
}

#[async_trait]
impl VersionResolver for NodeDistResolver {
    fn kind(&self) -> &str {
        "node-dist"
    }

    fn channels(&self) -> Vec<String> {
        vec!["latest".to_string(), "lts".to_string()]
    }

    async fn resolve(&self, channel: &str) -> ProvisionResult<String> {
        ensure_channel(self, channel)?;
        let body = fetch_text(&self.client, &self.index_url, self.timeout).await?;
        select_node_version(&body, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"version":"v23.3.0","date":"2024-11-20","files":["linux-x64"],"npm":"10.9.0","lts":false,"security":false},
        {"version":"v22.11.0","date":"2024-10-29","files":["linux-x64"],"npm":"10.9.0","lts":"Jod","security":false},
        {"version":"v20.18.1","date":"2024-11-20","files":["linux-x64"],"npm":"10.8.2","lts":"Iron","security":false}
    ]"#;

    #[test]
    fn test_select_latest() {
        assert_eq!(select_node_version(SAMPLE, "latest").unwrap(), "23.3.0");
    }

    #[test]
    fn test_select_lts() {
        assert_eq!(select_node_version(SAMPLE, "lts").unwrap(), "22.11.0");
    }

    #[test]
    fn test_no_lts_entry() {
        let body = r#"[{"version":"v23.3.0","lts":false}]"#;
        let err = select_node_version(body, "lts").unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::ResolutionError);
    }

    #[test]
    fn test_malformed_index() {
        assert!(select_node_version("{\"not\":\"an array\"}", "latest").is_err());
    }
}
