use super::{ensure_channel, VersionResolver};
use crate::core::error::ProvisionResult;
use async_trait::async_trait;

/// 固定版本解析器（pinned 通道，无网络请求）
pub struct FixedResolver {
    version: String,
}

impl FixedResolver {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.trim().to_string(),
        }
    }
}

#[async_trait]
impl VersionResolver for FixedResolver {
    fn kind(&self) -> &str {
        "fixed"
    }

    fn channels(&self) -> Vec<String> {
        vec!["pinned".to_string()]
    }

    async fn resolve(&self, channel: &str) -> ProvisionResult<String> {
        ensure_channel(self, channel)?;
        Ok(self.version.clone())
    }
}
