//! 命令行参数定义（clap derive）

use crate::models::LogLevel;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ubuntu 开发环境一键配置
#[derive(Parser, Debug)]
#[command(name = "devsetup")]
#[command(about = "检测、安装并校验开发工具（.NET SDK、PowerShell、Node.js、uv、oh-my-posh）")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 工具清单配置文件
    #[arg(long, global = true, env = "DEVSETUP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info", value_enum, help = "日志级别")]
    pub log_level: LogLevel,

    /// 控制台日志使用 JSON 格式
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// 日志文件；指向目录时自动生成带时间戳的文件名
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 按顺序检测、安装并校验工具
    Run(RunArgs),

    /// 只检测已安装版本，不做任何修改
    Check {
        /// 要检测的工具（默认全部）
        tools: Vec<String>,
    },

    /// 列出工具清单
    List,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// 要处理的工具（默认全部，按配置顺序执行）
    pub tools: Vec<String>,

    /// 版本通道：`lts`、`latest`，或针对单个工具 `nodejs=lts`（可重复）
    #[arg(long = "channel", value_name = "CHANNEL|TOOL=CHANNEL")]
    pub channels: Vec<String>,

    /// 已是目标版本时也重新安装
    #[arg(long)]
    pub force: bool,

    /// 某个工具失败后继续处理后续工具
    #[arg(long)]
    pub continue_on_error: bool,

    /// 只输出计划，不做任何修改
    #[arg(long)]
    pub dry_run: bool,

    /// 运行报告（JSON）输出路径
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}
