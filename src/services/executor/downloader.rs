//! 安装包下载
//!
//! 流式写入目标文件；失败时重试一次，超时在重试耗尽后报告为 `DownloadError`。

use crate::core::error::{ProvisionError, ProvisionResult};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct FileDownloader {
    client: Client,
    timeout: Duration,
    backoff: Duration,
}

impl FileDownloader {
    pub fn new(client: Client, timeout: Duration, backoff: Duration) -> Self {
        Self {
            client,
            timeout,
            backoff,
        }
    }

    /// 下载到 `dest`，返回写入的字节数
    pub async fn download(&self, url: &str, dest: &Path) -> ProvisionResult<u64> {
        let mut attempt = 1;
        loop {
            match self.download_once(url, dest).await {
                Ok(size) => {
                    tracing::info!(url, size, "下载完成");
                    return Ok(size);
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(url, attempt, error = %e, "下载失败，{}ms 后重试", self.backoff.as_millis());
                    let _ = tokio::fs::remove_file(dest).await;
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(e);
                }
            }
        }
    }

    async fn download_once(&self, url: &str, dest: &Path) -> ProvisionResult<u64> {
        tracing::debug!(url, dest = %dest.display(), "开始下载");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        if !response.status().is_success() {
            return Err(ProvisionError::download(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ProvisionError::download(url, format!("无法创建文件 {}: {e}", dest.display())))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.request_error(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ProvisionError::download(url, format!("写入文件失败: {e}")))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ProvisionError::download(url, format!("写入文件失败: {e}")))?;

        Ok(written)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> ProvisionError {
        if e.is_timeout() {
            ProvisionError::download(url, format!("超时（{}s）", self.timeout.as_secs()))
        } else {
            ProvisionError::download(url, e.to_string())
        }
    }
}

/// URL 最后一段作为文件名
pub fn file_name_from_url(url: &str, fallback: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 本地 HTTP 服务：对任意路径返回固定内容，`status` 用于模拟错误
    pub async fn serve(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut request = Vec::new();
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    pub fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }
}
