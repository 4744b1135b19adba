// devsetup check：只检测，不做任何修改

use super::name_width;
use crate::core::error::ProvisionResult;
use crate::models::{ProbeResult, ToolSpec, EXIT_FAILED, EXIT_OK};
use crate::services::config::{load_config, select_tools};
use crate::services::probe::{CommandProbe, StateProbe};
use crate::utils::CommandExecutor;
use std::path::Path;

pub async fn check(config_path: Option<&Path>, requested: &[String]) -> anyhow::Result<u8> {
    let loaded = load_config(config_path)?;
    let tools = select_tools(&loaded.config.tools, requested)?;
    let probe = CommandProbe::new(CommandExecutor::new());

    let mut results = Vec::with_capacity(tools.len());
    for tool in &tools {
        let result = probe.probe(tool).await;
        if let Err(e) = &result {
            tracing::error!(tool = %tool.name, error = %e, "检测失败");
        }
        results.push((tool, result));
    }

    print!("{}", render_check(&results));
    let any_error = results.iter().any(|(_, r)| r.is_err());
    Ok(if any_error { EXIT_FAILED } else { EXIT_OK })
}

pub fn render_check(results: &[(&ToolSpec, ProvisionResult<ProbeResult>)]) -> String {
    let width = name_width(results.iter().map(|(t, _)| t.name.as_str()));
    let mut out = String::new();
    for (tool, result) in results {
        let status = match result {
            Ok(probe) if probe.installed => {
                format!("installed  {}", probe.version.as_deref().unwrap_or("(版本未知)"))
            }
            Ok(_) => "missing".to_string(),
            Err(e) => format!("error      {e}"),
        };
        out.push_str(&format!("{:<width$}  {status}\n", tool.name));
    }
    out
}
