// 执行计划
//
// 纯函数：根据检测结果、目标版本与强制重装标志决定动作。

use crate::models::{Plan, PlanAction, ProbeResult};
use crate::utils::version::versions_equal;

pub struct StepPlanner;

impl StepPlanner {
    /// 决策表：
    ///
    /// | 已安装 | 版本一致 | 强制重装 | 动作 |
    /// |---|---|---|---|
    /// | 否 | - | - | Install |
    /// | 是 | 是 | 否 | Skip |
    /// | 是 | 是 | 是 | Reinstall |
    /// | 是 | 否 | - | Upgrade |
    ///
    /// 版本无法比较时按不一致处理（Upgrade）。
    pub fn plan(tool: &str, probe: &ProbeResult, target_version: &str, force_reinstall: bool) -> Plan {
        let installed_version = probe.version.clone();

        let (action, reason) = if !probe.installed {
            (PlanAction::Install, "未安装".to_string())
        } else if versions_equal(probe.version.as_deref(), target_version) {
            if force_reinstall {
                (
                    PlanAction::Reinstall,
                    format!("已是 {target_version}，强制重装"),
                )
            } else {
                (PlanAction::Skip, format!("已是 {target_version}"))
            }
        } else {
            let current = probe.version.as_deref().unwrap_or("未知版本");
            (
                PlanAction::Upgrade,
                format!("{current} -> {target_version}"),
            )
        };

        Plan {
            tool: tool.to_string(),
            action,
            target_version: target_version.to_string(),
            installed_version,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(version: &str) -> ProbeResult {
        ProbeResult::present(Some(version.to_string()), version)
    }

    #[test]
    fn test_absent_always_installs() {
        for force in [false, true] {
            let plan = StepPlanner::plan("pwsh", &ProbeResult::absent(""), "7.4.6", force);
            assert_eq!(plan.action, PlanAction::Install);
            assert_eq!(plan.target_version, "7.4.6");
        }
    }

    #[test]
    fn test_same_version_skips() {
        let plan = StepPlanner::plan("pwsh", &installed("7.4.6"), "7.4.6", false);
        assert_eq!(plan.action, PlanAction::Skip);
        assert!(!plan.action.is_mutating());
    }

    #[test]
    fn test_same_version_forced_reinstalls() {
        let plan = StepPlanner::plan("pwsh", &installed("7.4.6"), "7.4.6", true);
        assert_eq!(plan.action, PlanAction::Reinstall);
    }

    #[test]
    fn test_different_version_upgrades() {
        for force in [false, true] {
            let plan = StepPlanner::plan("pwsh", &installed("7.4.5"), "7.4.6", force);
            assert_eq!(plan.action, PlanAction::Upgrade);
            assert_eq!(plan.reason, "7.4.5 -> 7.4.6");
        }
    }

    #[test]
    fn test_newer_installed_still_plans_upgrade_to_target() {
        let plan = StepPlanner::plan("node", &installed("23.3.0"), "22.11.0", false);
        assert_eq!(plan.action, PlanAction::Upgrade);
    }

    #[test]
    fn test_incomparable_versions_plan_upgrade() {
        let probe = ProbeResult::present(None, "dev build");
        let plan = StepPlanner::plan("foo", &probe, "1.0.0", false);
        assert_eq!(plan.action, PlanAction::Upgrade);
        assert!(plan.reason.contains("未知版本"));

        let plan = StepPlanner::plan("foo", &installed("1.0.0"), "not-a-version", false);
        assert_eq!(plan.action, PlanAction::Upgrade);
    }

    #[test]
    fn test_prefix_differences_are_equal() {
        let plan = StepPlanner::plan("node", &installed("v22.11.0"), "22.11.0", false);
        assert_eq!(plan.action, PlanAction::Skip);
    }
}
