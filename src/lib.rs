// lib.rs - 开发工具配置库：检测 → 计划 → 执行 → 校验

pub mod cli;
pub mod commands;
pub mod core;
pub mod models;
pub mod services;
pub mod utils;

pub use models::*;
pub use services::{
    CommandProbe, Executor, InstallerExecutor, ProvisionTarget, RunOptions, Sequencer, StateProbe,
    StepPlanner, ToolRegistry, VersionResolver, Verifier,
};

pub use core::{init_logger, ErrorKind, ProvisionError, ProvisionResult};
