use crate::models::config::{LogConfig, LogFormat, LogLevel};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing::Metadata;
use tracing_subscriber::filter::{filter_fn, FilterFn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// 失败行的日志 target：只写入日志文件，控制台上由命令直接输出到 stderr
pub const FAILURE_LOG_TARGET: &str = "devsetup::failure";

/// 初始化日志系统
///
/// - 控制台输出写到 stderr（stdout 留给运行报告）
/// - 配置了 `file_path` 时额外写入日志文件（非阻塞）
/// - `RUST_LOG` 优先于配置的级别
///
/// 返回文件写入线程的 guard，调用方需持有到进程结束以保证日志落盘。
pub fn init_logger(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = create_env_filter(&config.level);

    let (file_layer, guard) = match &config.file_path {
        Some(path) => {
            let file_path = resolve_log_file(path)?;
            let (layer, guard) = create_file_layer(&file_path, config.format)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(create_console_layer(config.format))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("日志系统已初始化，不能重复初始化: {e}"))?;

    tracing::debug!(
        level = config.level.as_str(),
        format = ?config.format,
        file_path = ?config.file_path,
        "日志系统初始化完成"
    );

    Ok(guard)
}

/// 创建环境过滤器
fn create_env_filter(level: &LogLevel) -> EnvFilter {
    // 格式：RUST_LOG=debug 或 RUST_LOG=devsetup=trace,reqwest=warn
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "devsetup={},hyper=warn,reqwest=warn,h2=warn,tokio=warn",
            level.as_str()
        ))
    })
}

fn is_console_event(metadata: &Metadata<'_>) -> bool {
    metadata.target() != FAILURE_LOG_TARGET
}

fn console_filter() -> FilterFn<fn(&Metadata<'_>) -> bool> {
    filter_fn(is_console_event as fn(&Metadata<'_>) -> bool)
}

fn create_console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(cfg!(debug_assertions))
            .with_thread_ids(false)
            .with_ansi(true)
            .with_filter(console_filter())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(console_filter())
            .boxed(),
    }
}

fn create_file_layer<S>(
    file_path: &Path,
    format: LogFormat,
) -> anyhow::Result<(Box<dyn Layer<S> + Send + Sync + 'static>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let dir = file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = file_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("日志文件路径无效: {}", file_path.display()))?;

    std::fs::create_dir_all(&dir)?;
    let (writer, guard) = non_blocking(rolling::never(dir, file_name));

    let layer = match format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .boxed(),
    };

    Ok((layer, guard))
}

/// 解析日志文件路径：指向已存在的目录时生成 `devsetup-YYYYmmdd-HHMMSS.log`
pub fn resolve_log_file(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_dir() {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        return Ok(path.join(format!("devsetup-{stamp}.log")));
    }
    Ok(path.to_path_buf())
}
