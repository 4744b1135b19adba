//! 多工具配置编排
//!
//! 每个工具依次经历 `Pending -> Probing -> Planning -> (Skipped | Executing) -> Verifying -> (Done | Failed)`，
//! 工具之间严格串行。取消只在两个工具之间检查。

use super::executor::Executor;
use super::planner::StepPlanner;
use super::probe::StateProbe;
use super::resolver::VersionResolver;
use super::verifier::Verifier;
use crate::core::error::{ErrorKind, ProvisionError, ProvisionResult};
use crate::core::logger::FAILURE_LOG_TARGET;
use crate::models::{
    log_excerpt, NotRunTool, Phase, Plan, RunReport, StepFailure, StepOutcome, StepState, ToolSpec,
};
use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// 单个工具的编排输入
#[derive(Clone)]
pub struct ProvisionTarget {
    pub spec: Arc<ToolSpec>,
    pub channel: String,
    pub resolver: Arc<dyn VersionResolver>,
    pub executor: Arc<dyn Executor>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub force_reinstall: bool,
    pub continue_on_error: bool,
    pub dry_run: bool,
}

pub struct Sequencer {
    probe: Arc<dyn StateProbe>,
    verifier: Verifier,
    options: RunOptions,
    cancel: CancellationToken,
}

/// 单个工具的一次状态机运行
struct ToolCycle<'a> {
    target: &'a ProvisionTarget,
    state: StepState,
    plan: Option<Plan>,
    observed_version: Option<String>,
    log: Vec<String>,
    started: Instant,
    started_at: chrono::DateTime<Local>,
}

impl<'a> ToolCycle<'a> {
    fn new(target: &'a ProvisionTarget) -> Self {
        Self {
            target,
            state: StepState::Pending,
            plan: None,
            observed_version: None,
            log: Vec::new(),
            started: Instant::now(),
            started_at: Local::now(),
        }
    }

    fn advance(&mut self, next: StepState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "非法状态迁移 {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(tool = %self.target.spec.name, from = ?self.state, to = ?next, "状态迁移");
        self.state = next;
    }

    fn finish(mut self, result: Result<StepState, StepFailure>) -> StepOutcome {
        let (success, failure) = match result {
            Ok(state) => {
                self.advance(state);
                (true, None)
            }
            Err(failure) => {
                self.advance(StepState::Failed);
                self.log.push(failure.message.clone());
                (false, Some(failure))
            }
        };

        StepOutcome {
            tool: self.target.spec.name.clone(),
            required: self.target.spec.required,
            plan: self.plan,
            state: self.state,
            success,
            failure,
            observed_version: self.observed_version,
            duration_ms: self.started.elapsed().as_millis() as u64,
            log_excerpt: log_excerpt(&self.log),
            started_at: self.started_at,
        }
    }
}

/// 将错误标记为指定阶段的失败
trait InPhase<T> {
    fn in_phase(self, phase: Phase) -> Result<T, StepFailure>;
}

impl<T> InPhase<T> for ProvisionResult<T> {
    fn in_phase(self, phase: Phase) -> Result<T, StepFailure> {
        self.map_err(|e: ProvisionError| StepFailure::new(phase, &e))
    }
}

impl Sequencer {
    pub fn new(probe: Arc<dyn StateProbe>, options: RunOptions, cancel: CancellationToken) -> Self {
        Self {
            verifier: Verifier::new(probe.clone()),
            probe,
            options,
            cancel,
        }
    }

    /// 按顺序处理所有工具，返回运行报告
    pub async fn run(&self, targets: &[ProvisionTarget]) -> RunReport {
        let mut report = RunReport::new(self.options.dry_run);

        for (index, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("收到取消请求，停止处理剩余工具");
                report.cancelled = true;
                mark_not_run(&mut report, &targets[index..]);
                break;
            }

            let outcome = self.run_tool(target).await;
            let failure_kind = outcome.error_kind();
            match &outcome.failure_line() {
                Some(line) => tracing::error!(target: FAILURE_LOG_TARGET, "{line}"),
                None => tracing::info!(
                    tool = %outcome.tool,
                    state = ?outcome.state,
                    duration_ms = outcome.duration_ms,
                    "工具处理完成"
                ),
            }
            report.push(outcome);

            let rest = &targets[index + 1..];
            match failure_kind {
                Some(ErrorKind::ConfigError) => {
                    tracing::error!("配置错误，中止运行");
                    report.config_aborted = true;
                    mark_not_run(&mut report, rest);
                    break;
                }
                Some(_) if !self.options.continue_on_error => {
                    if !rest.is_empty() {
                        tracing::warn!(remaining = rest.len(), "遇到失败，停止处理剩余工具");
                    }
                    mark_not_run(&mut report, rest);
                    break;
                }
                _ => {}
            }
        }

        report.finish();
        report
    }

    async fn run_tool(&self, target: &ProvisionTarget) -> StepOutcome {
        let mut cycle = ToolCycle::new(target);
        let result = self.drive(&mut cycle).await;
        cycle.finish(result)
    }

    /// 推进状态机直到终态前一步；返回终态或失败
    async fn drive(&self, cycle: &mut ToolCycle<'_>) -> Result<StepState, StepFailure> {
        let target = cycle.target;
        let spec = target.spec.as_ref();

        cycle.advance(StepState::Probing);
        let probe = self.probe.probe(spec).await.in_phase(Phase::Probe)?;
        cycle.log.push(format!(
            "检测: installed={} version={}",
            probe.installed,
            probe.version.as_deref().unwrap_or("-")
        ));
        cycle.observed_version = probe.version.clone();

        cycle.advance(StepState::Planning);
        let target_version = target
            .resolver
            .resolve(&target.channel)
            .await
            .in_phase(Phase::Resolve)?;
        let plan = StepPlanner::plan(&spec.name, &probe, &target_version, self.options.force_reinstall);
        tracing::info!(
            tool = %spec.name,
            action = %plan.action,
            target = %plan.target_version,
            reason = %plan.reason,
            "计划"
        );
        cycle.log.push(format!("计划: {} {} ({})", plan.action, plan.target_version, plan.reason));
        cycle.plan = Some(plan.clone());

        if !plan.action.is_mutating() {
            return Ok(StepState::Skipped);
        }
        if self.options.dry_run {
            return Ok(StepState::Planned);
        }

        cycle.advance(StepState::Executing);
        let execution = target.executor.execute(&plan).await.in_phase(Phase::Execute)?;
        cycle.log.extend(execution.log);

        cycle.advance(StepState::Verifying);
        let verified = self
            .verifier
            .verify(spec, &plan.target_version)
            .await
            .in_phase(Phase::Verify)?;
        cycle.observed_version = verified.observed_version.clone();
        if !verified.ok {
            return Err(StepFailure::new(
                Phase::Verify,
                &ProvisionError::Verification(format!(
                    "期望版本 {}，实际 {}",
                    plan.target_version,
                    verified.observed_version.as_deref().unwrap_or("未检测到")
                )),
            ));
        }

        Ok(StepState::Done)
    }
}

fn mark_not_run(report: &mut RunReport, targets: &[ProvisionTarget]) {
    report.not_run.extend(targets.iter().map(|t| NotRunTool {
        tool: t.spec.name.clone(),
        required: t.spec.required,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanAction, ProbeResult, ResolverSpec};
    use crate::services::executor::ExecutionResult;
    use crate::services::resolver::RetryingResolver;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 模拟的本机状态：工具名 -> 已安装版本
    #[derive(Clone, Default)]
    struct World {
        installed: Arc<Mutex<HashMap<String, String>>>,
        probes: Arc<AtomicUsize>,
        executions: Arc<AtomicUsize>,
    }

    impl World {
        fn with(tools: &[(&str, &str)]) -> Self {
            let world = World::default();
            for (name, version) in tools {
                world.set(name, version);
            }
            world
        }

        fn set(&self, tool: &str, version: &str) {
            self.installed
                .lock()
                .unwrap()
                .insert(tool.to_string(), version.to_string());
        }

        fn executions(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    struct FakeProbe(World);

    #[async_trait]
    impl StateProbe for FakeProbe {
        async fn probe(&self, tool: &ToolSpec) -> ProvisionResult<ProbeResult> {
            self.0.probes.fetch_add(1, Ordering::SeqCst);
            if tool.name == "broken" {
                return Err(ProvisionError::probe("exit 126"));
            }
            Ok(match self.0.installed.lock().unwrap().get(&tool.name) {
                Some(v) => ProbeResult::present(Some(v.clone()), v.clone()),
                None => ProbeResult::absent(""),
            })
        }
    }

    /// 安装成功时把目标版本写入 World；`installs_as` 用于模拟装错版本
    struct FakeExecutor {
        world: World,
        installs_as: Option<&'static str>,
        fail_with: Option<fn() -> ProvisionError>,
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn execute(&self, plan: &Plan) -> ProvisionResult<ExecutionResult> {
            self.world.executions.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            let version = self
                .installs_as
                .map(str::to_string)
                .unwrap_or_else(|| plan.target_version.clone());
            self.world.set(&plan.tool, &version);
            Ok(ExecutionResult {
                log: vec![format!("installed {version}")],
                ..Default::default()
            })
        }
    }

    enum Answer {
        Version(&'static str),
        Timeout,
        BadChannel,
    }

    struct FakeResolver {
        answer: Answer,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VersionResolver for FakeResolver {
        fn kind(&self) -> &str {
            "fake"
        }

        fn channels(&self) -> Vec<String> {
            vec!["latest".to_string(), "lts".to_string()]
        }

        async fn resolve(&self, _channel: &str) -> ProvisionResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Answer::Version(v) => Ok(v.to_string()),
                Answer::Timeout => Err(ProvisionError::timeout("GET https://example.invalid", 30)),
                Answer::BadChannel => Err(ProvisionError::config("unknown channel")),
            }
        }
    }

    fn spec(name: &str, required: bool) -> Arc<ToolSpec> {
        Arc::new(ToolSpec {
            name: name.to_string(),
            display_name: None,
            required,
            channels: vec!["latest".to_string(), "lts".to_string()],
            channel: Some("lts".to_string()),
            check_command: format!("{name} --version"),
            version_regex: None,
            resolver: ResolverSpec::Fixed {
                version: "0.0.0".to_string(),
            },
            installer: crate::models::InstallerSpec::Script {
                url: "https://example.invalid/install.sh".to_string(),
                args: vec![],
                env: Default::default(),
                post_commands: vec![],
            },
            architectures: vec![],
            profile_lines: vec![],
        })
    }

    fn target_with(
        name: &str,
        required: bool,
        answer: Answer,
        executor: FakeExecutor,
    ) -> ProvisionTarget {
        let resolver: Arc<dyn VersionResolver> = Arc::new(FakeResolver {
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        });
        ProvisionTarget {
            spec: spec(name, required),
            channel: "lts".to_string(),
            resolver: Arc::new(RetryingResolver::new(resolver, Duration::ZERO)),
            executor: Arc::new(executor),
        }
    }

    fn target(world: &World, name: &str, required: bool, version: &'static str) -> ProvisionTarget {
        target_with(
            name,
            required,
            Answer::Version(version),
            FakeExecutor {
                world: world.clone(),
                installs_as: None,
                fail_with: None,
            },
        )
    }

    fn sequencer(world: &World, options: RunOptions) -> Sequencer {
        Sequencer::new(
            Arc::new(FakeProbe(world.clone())),
            options,
            CancellationToken::new(),
        )
    }

    fn action_of(outcome: &StepOutcome) -> PlanAction {
        outcome.plan.as_ref().unwrap().action
    }

    #[tokio::test]
    async fn test_absent_tool_is_installed_and_verified() {
        let world = World::default();
        let report = sequencer(&world, RunOptions::default())
            .run(&[target(&world, "powershell", true, "7.4.6")])
            .await;

        let outcome = &report.outcomes[0];
        assert_eq!(action_of(outcome), PlanAction::Install);
        assert_eq!(outcome.plan.as_ref().unwrap().target_version, "7.4.6");
        assert_eq!(outcome.state, StepState::Done);
        assert!(outcome.success);
        assert_eq!(outcome.observed_version.as_deref(), Some("7.4.6"));
        assert!(outcome.log_excerpt.contains("installed 7.4.6"));
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_older_version_is_upgraded() {
        let world = World::with(&[("powershell", "7.4.5")]);
        let report = sequencer(&world, RunOptions::default())
            .run(&[target(&world, "powershell", true, "7.4.6")])
            .await;

        assert_eq!(action_of(&report.outcomes[0]), PlanAction::Upgrade);
        assert_eq!(report.outcomes[0].state, StepState::Done);
    }

    #[tokio::test]
    async fn test_force_reinstalls_current_version() {
        let world = World::with(&[("powershell", "7.4.6")]);
        let options = RunOptions {
            force_reinstall: true,
            ..Default::default()
        };
        let report = sequencer(&world, options)
            .run(&[target(&world, "powershell", true, "7.4.6")])
            .await;

        assert_eq!(action_of(&report.outcomes[0]), PlanAction::Reinstall);
        assert_eq!(world.executions(), 1);
        assert!(report.outcomes[0].success);
    }

    #[tokio::test]
    async fn test_skip_never_calls_executor() {
        let world = World::with(&[("uv", "0.5.11")]);
        let report = sequencer(&world, RunOptions::default())
            .run(&[target(&world, "uv", true, "0.5.11")])
            .await;

        assert_eq!(report.outcomes[0].state, StepState::Skipped);
        assert!(report.outcomes[0].success);
        assert_eq!(world.executions(), 0);
        // Skip 不重新检测
        assert_eq!(world.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_timeout_continues_when_allowed() {
        let world = World::default();
        let options = RunOptions {
            continue_on_error: true,
            ..Default::default()
        };
        let resolver_calls = Arc::new(AtomicUsize::new(0));
        let flaky = ProvisionTarget {
            spec: spec("oh-my-posh", false),
            channel: "lts".to_string(),
            resolver: Arc::new(RetryingResolver::new(
                Arc::new(FakeResolver {
                    answer: Answer::Timeout,
                    calls: resolver_calls.clone(),
                }),
                Duration::ZERO,
            )),
            executor: Arc::new(FakeExecutor {
                world: world.clone(),
                installs_as: None,
                fail_with: None,
            }),
        };

        let report = sequencer(&world, options)
            .run(&[flaky, target(&world, "nodejs", true, "22.12.0")])
            .await;

        let failed = &report.outcomes[0];
        assert!(!failed.success);
        assert_eq!(failed.error_kind(), Some(ErrorKind::ResolutionError));
        assert_eq!(failed.failure.as_ref().unwrap().phase, Phase::Resolve);
        assert_eq!(resolver_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            failed.failure_line().unwrap().split(' ').take(3).collect::<Vec<_>>(),
            vec!["tool=oh-my-posh", "phase=resolve", "kind=ResolutionError"]
        );

        assert_eq!(report.outcomes[1].state, StepState::Done);
        // 只有可选工具失败
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_required_failure_halts_by_default() {
        let world = World::default();
        let failing = target_with(
            "dotnet-sdk",
            true,
            Answer::Version("8.0.404"),
            FakeExecutor {
                world: world.clone(),
                installs_as: None,
                fail_with: Some(|| ProvisionError::permission("sudo 需要密码")),
            },
        );

        let report = sequencer(&world, RunOptions::default())
            .run(&[failing, target(&world, "nodejs", true, "22.12.0"), target(&world, "uv", false, "0.5.11")])
            .await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::PermissionError));
        assert_eq!(report.outcomes[0].failure.as_ref().unwrap().phase, Phase::Execute);
        let not_run: Vec<_> = report.not_run.iter().map(|t| t.tool.as_str()).collect();
        assert_eq!(not_run, vec!["nodejs", "uv"]);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_mutation() {
        let world = World::with(&[("uv", "0.5.11"), ("nodejs", "20.0.0")]);
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let targets = [
            target(&world, "powershell", true, "7.4.6"),
            target(&world, "nodejs", true, "22.12.0"),
            target(&world, "uv", true, "0.5.11"),
        ];

        let report = sequencer(&world, options).run(&targets).await;

        assert!(report.dry_run);
        let actions: Vec<_> = report.outcomes.iter().map(action_of).collect();
        assert_eq!(
            actions,
            vec![PlanAction::Install, PlanAction::Upgrade, PlanAction::Skip]
        );
        assert_eq!(report.count_in_state(StepState::Planned), 2);
        assert!(report.outcomes.iter().all(|o| o.success));
        assert_eq!(world.executions(), 0);
        // 每个工具只检测一次，没有校验
        assert_eq!(world.probes.load(Ordering::SeqCst), 3);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_second_run_skips_everything() {
        let world = World::with(&[("nodejs", "20.0.0")]);
        let targets = [
            target(&world, "powershell", true, "7.4.6"),
            target(&world, "nodejs", true, "22.12.0"),
        ];

        let first = sequencer(&world, RunOptions::default()).run(&targets).await;
        assert_eq!(first.count_in_state(StepState::Done), 2);

        let second = sequencer(&world, RunOptions::default()).run(&targets).await;
        assert_eq!(second.count_in_state(StepState::Skipped), 2);
        assert_eq!(world.executions(), 2);
    }

    #[tokio::test]
    async fn test_wrong_version_after_install_is_verification_error() {
        let world = World::default();
        let target = target_with(
            "nodejs",
            true,
            Answer::Version("22.12.0"),
            FakeExecutor {
                world: world.clone(),
                installs_as: Some("20.18.1"),
                fail_with: None,
            },
        );

        let report = sequencer(&world, RunOptions::default()).run(&[target]).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.error_kind(), Some(ErrorKind::VerificationError));
        assert_eq!(outcome.failure.as_ref().unwrap().phase, Phase::Verify);
        assert_eq!(outcome.observed_version.as_deref(), Some("20.18.1"));
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_probe_error_is_distinct_from_absent() {
        let world = World::default();
        let report = sequencer(&world, RunOptions::default())
            .run(&[target(&world, "broken", true, "1.0.0")])
            .await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ProbeError));
        assert!(outcome.plan.is_none());
        assert_eq!(world.executions(), 0);
    }

    #[tokio::test]
    async fn test_config_error_aborts_run() {
        let world = World::default();
        let options = RunOptions {
            continue_on_error: true,
            ..Default::default()
        };
        let bad = target_with(
            "powershell",
            false,
            Answer::BadChannel,
            FakeExecutor {
                world: world.clone(),
                installs_as: None,
                fail_with: None,
            },
        );

        let report = sequencer(&world, options)
            .run(&[bad, target(&world, "uv", true, "0.5.11")])
            .await;

        assert!(report.config_aborted);
        assert_eq!(report.not_run.len(), 1);
        assert_eq!(report.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let world = World::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sequencer = Sequencer::new(Arc::new(FakeProbe(world.clone())), RunOptions::default(), cancel);

        let report = sequencer
            .run(&[target(&world, "nodejs", true, "22.12.0"), target(&world, "uv", false, "0.5.11")])
            .await;

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.not_run.len(), 2);
        assert_eq!(report.exit_code(), 1);
        assert!(report.finished_at.is_some());
    }
}
