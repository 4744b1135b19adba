use clap::Parser;
use devsetup::cli::{Cli, Commands};
use devsetup::core::ProvisionError;
use devsetup::models::{LogConfig, LogFormat, EXIT_CONFIG, EXIT_FAILED};
use devsetup::{commands, init_logger};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: cli.log_level,
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        file_path: cli.log_file.clone(),
    };
    // guard 需持有到进程结束，保证文件日志落盘
    let _log_guard = match init_logger(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("日志初始化失败: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("收到 Ctrl-C，当前工具完成后停止");
                cancel.cancel();
            }
        }
    });

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Run(args) => commands::run(config, args, cancel).await,
        Commands::Check { tools } => commands::check(config, tools).await,
        Commands::List => commands::list(config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = match e.downcast_ref::<ProvisionError>() {
                Some(err) if err.is_config() => EXIT_CONFIG,
                _ => EXIT_FAILED,
            };
            tracing::error!("{e:#}");
            eprintln!("错误: {e:#}");
            ExitCode::from(code)
        }
    }
}
