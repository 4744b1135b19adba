use super::{ensure_channel, fetch_text, VersionResolver};
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::utils::version::strip_tag_prefix;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// 通用 JSON 解析器：每个通道对应一个 URL，用 JSON Pointer 取版本字段
///
/// 例如 PowerShell 的 build-info：`{"ReleaseTag": "v7.4.6", ...}` + `/ReleaseTag`
pub struct JsonPointerResolver {
    client: Client,
    timeout: Duration,
    urls: BTreeMap<String, String>,
    pointer: String,
    strip_prefix: Option<String>,
}

impl JsonPointerResolver {
    pub fn new(
        client: Client,
        timeout: Duration,
        urls: BTreeMap<String, String>,
        pointer: &str,
        strip_prefix: Option<&str>,
    ) -> Self {
        Self {
            client,
            timeout,
            urls,
            pointer: pointer.to_string(),
            strip_prefix: strip_prefix.map(String::from),
        }
    }
}

/// 按 JSON Pointer 取字符串字段并去掉前缀
pub fn extract_pointer(body: &str, pointer: &str, strip_prefix: Option<&str>) -> ProvisionResult<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProvisionError::resolution(format!("JSON 响应解析失败: {e}")))?;

    let field = value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| ProvisionError::resolution(format!("响应中缺少字符串字段 {pointer}")))?;

    let version = strip_tag_prefix(field, strip_prefix);
    if version.is_empty() {
        return Err(ProvisionError::resolution(format!("字段 {pointer} 为空")));
    }
    Ok(version)
}

#[async_trait]
impl VersionResolver for JsonPointerResolver {
    fn kind(&self) -> &str {
        "json-pointer"
    }

    fn channels(&self) -> Vec<String> {
        self.urls.keys().cloned().collect()
    }

    async fn resolve(&self, channel: &str) -> ProvisionResult<String> {
        ensure_channel(self, channel)?;
        let url = self
            .urls
            .get(channel)
            .ok_or_else(|| ProvisionError::config(format!("通道 {channel} 未配置 URL")))?;
        let body = fetch_text(&self.client, url, self.timeout).await?;
        extract_pointer(&body, &self.pointer, self.strip_prefix.as_deref())
    }
}
