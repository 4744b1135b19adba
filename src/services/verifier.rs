// 安装后校验：重新检测并比对版本

use super::probe::StateProbe;
use crate::core::error::ProvisionResult;
use crate::models::ToolSpec;
use crate::utils::version::versions_equal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub observed_version: Option<String>,
}

pub struct Verifier {
    probe: Arc<dyn StateProbe>,
}

impl Verifier {
    pub fn new(probe: Arc<dyn StateProbe>) -> Self {
        Self { probe }
    }

    pub async fn verify(&self, tool: &ToolSpec, expected_version: &str) -> ProvisionResult<VerifyResult> {
        let probe = self.probe.probe(tool).await?;
        let ok = probe.installed && versions_equal(probe.version.as_deref(), expected_version);

        tracing::debug!(
            tool = %tool.name,
            expected = expected_version,
            observed = ?probe.version,
            ok,
            "安装后校验"
        );

        Ok(VerifyResult {
            ok,
            observed_version: probe.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeResult;
    use async_trait::async_trait;

    struct StaticProbe(ProbeResult);

    #[async_trait]
    impl StateProbe for StaticProbe {
        async fn probe(&self, _tool: &ToolSpec) -> ProvisionResult<ProbeResult> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_verify_matching_version() {
        let verifier = Verifier::new(Arc::new(StaticProbe(ProbeResult::present(
            Some("7.4.6".to_string()),
            "PowerShell 7.4.6",
        ))));
        let result = verifier.verify(&ToolSpec::powershell(), "7.4.6").await.unwrap();
        assert!(result.ok);
        assert_eq!(result.observed_version.as_deref(), Some("7.4.6"));
    }

    #[tokio::test]
    async fn test_verify_mismatch_and_absent() {
        let verifier = Verifier::new(Arc::new(StaticProbe(ProbeResult::present(
            Some("7.4.5".to_string()),
            "",
        ))));
        assert!(!verifier.verify(&ToolSpec::powershell(), "7.4.6").await.unwrap().ok);

        let verifier = Verifier::new(Arc::new(StaticProbe(ProbeResult::absent(""))));
        let result = verifier.verify(&ToolSpec::powershell(), "7.4.6").await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.observed_version, None);
    }
}
