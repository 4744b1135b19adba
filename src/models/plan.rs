use serde::{Deserialize, Serialize};
use std::fmt;

/// 计划动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Skip,
    Install,
    Upgrade,
    Reinstall,
}

impl PlanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAction::Skip => "skip",
            PlanAction::Install => "install",
            PlanAction::Upgrade => "upgrade",
            PlanAction::Reinstall => "reinstall",
        }
    }

    /// 是否需要执行器介入
    pub fn is_mutating(&self) -> bool {
        !matches!(self, PlanAction::Skip)
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个工具的执行计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tool: String,
    pub action: PlanAction,
    pub target_version: String,
    /// 计划时观察到的已安装版本
    pub installed_version: Option<String>,
    pub reason: String,
}
