// 服务层模块
//
// - resolver: 远程版本解析
// - probe / planner / verifier: 检测、决策、校验
// - executor: 下载、包管理器、Shell 配置写入
// - sequencer: 多工具编排
// - config / registry: 配置加载与组装

pub mod config;
pub mod executor;
pub mod planner;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod sequencer;
pub mod verifier;

pub use config::{load_config, select_tools, ChannelOverrides, ConfigSource, LoadedConfig};
pub use executor::{ExecutionEnv, ExecutionResult, Executor, InstallerExecutor};
pub use planner::StepPlanner;
pub use probe::{CommandProbe, StateProbe};
pub use registry::ToolRegistry;
pub use resolver::{RetryingResolver, VersionResolver};
pub use sequencer::{ProvisionTarget, RunOptions, Sequencer};
pub use verifier::{Verifier, VerifyResult};
