pub mod command;
pub mod file_helpers;
pub mod platform;
pub mod version;

pub use command::*;
pub use file_helpers::*;
pub use platform::*;
pub use version::*;
