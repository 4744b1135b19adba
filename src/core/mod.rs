// 核心基础设施层
//
// 错误类型、日志系统、HTTP 客户端

pub mod error;
pub mod http;
pub mod logger;

pub use error::{ErrorKind, ProvisionError, ProvisionResult};
pub use http::{build_http_client, HttpTimeouts};
pub use logger::{init_logger, resolve_log_file, FAILURE_LOG_TARGET};
