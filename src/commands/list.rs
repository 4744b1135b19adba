// devsetup list：打印工具清单

use super::name_width;
use crate::models::{ToolSpec, EXIT_OK};
use crate::services::config::{load_config, ConfigSource};
use std::path::Path;

pub fn list(config_path: Option<&Path>) -> anyhow::Result<u8> {
    let loaded = load_config(config_path)?;
    println!("配置来源: {}", loaded.source);
    print!("{}", render_catalog(&loaded.config.tools));
    if loaded.source == ConfigSource::Builtin {
        tracing::debug!("可通过 ~/.devsetup/tools.toml 自定义工具清单");
    }
    Ok(EXIT_OK)
}

/// 每行：名称、显示名、通道（* 为默认）、必需/可选、安装方式
pub fn render_catalog(tools: &[ToolSpec]) -> String {
    let width = name_width(tools.iter().map(|t| t.name.as_str()));
    let mut out = String::new();
    for tool in tools {
        let channels: Vec<String> = tool
            .channels
            .iter()
            .map(|c| {
                if tool.channel.as_ref() == Some(c) {
                    format!("{c}*")
                } else {
                    c.clone()
                }
            })
            .collect();
        out.push_str(&format!(
            "{:<width$}  {:<16}  {:<12}  {:<8}  {}\n",
            tool.name,
            tool.display_name(),
            channels.join(","),
            if tool.required { "required" } else { "optional" },
            tool.installer.kind(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_catalog_marks_default_channel() {
        let out = render_catalog(&ToolSpec::builtin());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("dotnet-sdk"));
        assert!(lines[2].contains("latest,lts*"));
        assert!(lines[4].contains("optional"));
        assert!(lines[4].ends_with("script"));
    }
}
