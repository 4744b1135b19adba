// 子命令实现
//
// 每个命令返回进程退出码；配置错误以 `ProvisionError::Config` 向上传递，由 main 映射为 2。

pub mod check;
pub mod list;
pub mod run;

pub use check::check;
pub use list::list;
pub use run::run;

/// 名称列宽
fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).max().unwrap_or(0).max(8)
}
