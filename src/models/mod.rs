pub mod config;
pub mod plan;
pub mod report;
pub mod tool;

pub use config::*;
pub use plan::*;
pub use report::*;
pub use tool::*;
