use crate::core::error::{ProvisionError, ProvisionResult};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

const USER_AGENT: &str = concat!("devsetup/", env!("CARGO_PKG_VERSION"));

/// 网络操作超时配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// 版本元数据查询
    pub metadata: Duration,
    /// 安装包/脚本下载
    pub download: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(30),
            download: Duration::from_secs(300),
        }
    }
}

/// 构建带代理配置的 HTTP 客户端
///
/// # 参数
/// - `proxy`: 显式代理 URL（http/https/socks5）；为空时 reqwest 会读取
///   `HTTP_PROXY`/`HTTPS_PROXY`/`ALL_PROXY`/`NO_PROXY` 环境变量
/// - `timeout`: 整个请求（含响应体）的超时时间
pub fn build_http_client(proxy: Option<&str>, timeout: Duration) -> ProvisionResult<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(reqwest::redirect::Policy::limited(10)); // aka.ms 等短链接需要重定向

    if let Some(proxy_url) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            // 为 SOCKS5 提供更友好的错误说明
            if proxy_url.starts_with("socks5") {
                ProvisionError::config(format!(
                    "SOCKS5 代理初始化失败：{e}。若需要远程 DNS 解析，建议使用 socks5h://"
                ))
            } else {
                ProvisionError::config(format!("代理 URL 无效: {e}"))
            }
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ProvisionError::config(format!("HTTP 客户端初始化失败: {e}")))
}

/// 对 GitHub 域名附加 Token（GITHUB_TOKEN 优先，其次 GH_TOKEN）
pub fn with_github_auth(request: RequestBuilder, url: &str) -> RequestBuilder {
    let is_github = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with("github.com")))
        .unwrap_or(false);
    if !is_github {
        return request;
    }

    match github_token() {
        Some(token) => request.header("Authorization", format!("Bearer {token}")),
        None => request,
    }
}

fn github_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN")
        .ok()
        .or_else(|| std::env::var("GH_TOKEN").ok())
        .filter(|t| !t.trim().is_empty())
}
