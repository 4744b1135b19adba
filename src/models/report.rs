use super::plan::Plan;
use crate::core::error::{ErrorKind, ProvisionError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日志摘录保留的最大行数
const LOG_EXCERPT_LINES: usize = 20;

/// 单个工具的状态机状态
///
/// `Pending -> Probing -> Planning -> (Skipped | Executing) -> Verifying -> (Done | Failed)`，
/// dry-run 时在 Planning 之后进入 `Planned`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Probing,
    Planning,
    Skipped,
    Planned,
    Executing,
    Verifying,
    Done,
    Failed,
}

impl StepState {
    /// 状态机允许的迁移
    pub fn can_advance_to(&self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, Probing)
                | (Probing, Planning)
                | (Planning, Skipped)
                | (Planning, Planned)
                | (Planning, Executing)
                | (Executing, Verifying)
                | (Verifying, Done)
                | (Probing, Failed)
                | (Planning, Failed)
                | (Executing, Failed)
                | (Verifying, Failed)
        )
    }
}

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Probe,
    Resolve,
    Execute,
    Verify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Probe => "probe",
            Phase::Resolve => "resolve",
            Phase::Execute => "execute",
            Phase::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 失败详情
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub phase: Phase,
    pub kind: ErrorKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(phase: Phase, error: &ProvisionError) -> Self {
        Self {
            phase,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// 单个工具的执行结果（不可变，按顺序追加到运行报告）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub tool: String,
    pub required: bool,
    pub plan: Option<Plan>,
    pub state: StepState,
    pub success: bool,
    pub failure: Option<StepFailure>,
    pub observed_version: Option<String>,
    pub duration_ms: u64,
    pub log_excerpt: String,
    pub started_at: DateTime<Local>,
}

impl StepOutcome {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// 结构化失败行：`tool=<t> phase=<p> kind=<K> message=<m>`
    pub fn failure_line(&self) -> Option<String> {
        self.failure.as_ref().map(|f| {
            format!(
                "tool={} phase={} kind={} message={}",
                self.tool,
                f.phase,
                f.kind,
                f.message.replace('\n', " ")
            )
        })
    }
}

/// 未执行的工具（因中止或取消）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotRunTool {
    pub tool: String,
    pub required: bool,
}

/// 一次运行的完整报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub dry_run: bool,
    pub cancelled: bool,
    /// 运行中遇到配置错误而中止
    pub config_aborted: bool,
    pub outcomes: Vec<StepOutcome>,
    pub not_run: Vec<NotRunTool>,
}

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            dry_run,
            cancelled: false,
            config_aborted: false,
            outcomes: Vec::new(),
            not_run: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    /// 失败的必需工具
    pub fn failed_required(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| o.required && !o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn count_in_state(&self, state: StepState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// 进程退出码（报告的纯函数）
    pub fn exit_code(&self) -> u8 {
        if self.config_aborted {
            return EXIT_CONFIG;
        }
        let required_not_run = self.cancelled && self.not_run.iter().any(|t| t.required);
        if self.failed_required().next().is_some() || required_not_run {
            EXIT_FAILED
        } else {
            EXIT_OK
        }
    }
}

/// 截取日志末尾若干行
pub fn log_excerpt(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(LOG_EXCERPT_LINES);
    lines[start..].join("\n")
}
