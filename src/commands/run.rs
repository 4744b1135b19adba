// devsetup run：检测 → 计划 → 执行 → 校验

use super::name_width;
use crate::cli::RunArgs;
use crate::models::{RunReport, StepOutcome, StepState};
use crate::services::config::{load_config, select_tools, ChannelOverrides};
use crate::services::registry::ToolRegistry;
use crate::services::sequencer::{RunOptions, Sequencer};
use anyhow::Context;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn run(
    config_path: Option<&Path>,
    args: &RunArgs,
    cancel: CancellationToken,
) -> anyhow::Result<u8> {
    let loaded = load_config(config_path)?;
    tracing::info!(source = %loaded.source, "已加载工具清单");

    let mut settings = loaded.config.settings;
    settings.continue_on_error |= args.continue_on_error;

    let tools = select_tools(&loaded.config.tools, &args.tools)?;
    let overrides = ChannelOverrides::parse(&args.channels)?;
    let registry = ToolRegistry::new(&settings)?;
    let targets = registry.targets(&tools, &overrides)?;

    let options = RunOptions {
        force_reinstall: args.force,
        continue_on_error: settings.continue_on_error,
        dry_run: args.dry_run,
    };
    tracing::info!(tools = targets.len(), ?options, "开始运行");

    let report = Sequencer::new(registry.probe(), options, cancel)
        .run(&targets)
        .await;

    print!("{}", render_summary(&report));
    for line in report.outcomes.iter().filter_map(StepOutcome::failure_line) {
        eprintln!("{line}");
    }

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }

    let code = report.exit_code();
    tracing::info!(exit_code = code, "运行结束");
    Ok(code)
}

/// 将运行报告写为 JSON
pub fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建报告目录失败: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("序列化运行报告失败")?;
    std::fs::write(path, json).with_context(|| format!("写入运行报告失败: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "运行报告已写入");
    Ok(())
}

fn outcome_detail(outcome: &StepOutcome) -> String {
    let plan = outcome.plan.as_ref();
    match outcome.state {
        StepState::Skipped => format!(
            "{}（已是目标版本）",
            plan.map(|p| p.target_version.as_str()).unwrap_or("-")
        ),
        StepState::Failed => outcome
            .failure
            .as_ref()
            .map(|f| format!("{} 阶段失败: {}", f.phase, f.kind))
            .unwrap_or_default(),
        _ => match plan {
            Some(p) => format!(
                "{} {} → {}",
                p.action,
                p.installed_version.as_deref().unwrap_or("(未安装)"),
                p.target_version
            ),
            None => String::new(),
        },
    }
}

/// 运行摘要（stdout）
pub fn render_summary(report: &RunReport) -> String {
    let width = name_width(
        report
            .outcomes
            .iter()
            .map(|o| o.tool.as_str())
            .chain(report.not_run.iter().map(|t| t.tool.as_str())),
    );
    let mut out = String::new();
    if report.dry_run {
        out.push_str("[dry-run] 仅生成计划，未做任何修改\n");
    }

    for outcome in &report.outcomes {
        let state = serde_json::to_value(outcome.state)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<width$}  {:<8}  {:>6}ms  {}\n",
            outcome.tool,
            state,
            outcome.duration_ms,
            outcome_detail(outcome)
        ));
    }

    if !report.not_run.is_empty() {
        let names: Vec<&str> = report.not_run.iter().map(|t| t.tool.as_str()).collect();
        let reason = if report.cancelled { "已取消" } else { "已中止" };
        out.push_str(&format!("未执行（{reason}）: {}\n", names.join(", ")));
    }

    out.push_str(&format!(
        "完成 {}，跳过 {}，计划 {}，失败 {}\n",
        report.count_in_state(StepState::Done),
        report.count_in_state(StepState::Skipped),
        report.count_in_state(StepState::Planned),
        report.count_in_state(StepState::Failed),
    ));
    out
}
