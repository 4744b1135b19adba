//! Shell 配置文件的标记块编辑
//!
//! 每个工具的配置写成一个带起止标记的块：
//!
//! ```text
//! # >>> devsetup:nodejs >>>
//! export NVM_DIR="$HOME/.nvm"
//! # <<< devsetup:nodejs <<<
//! ```
//!
//! 起始标记已存在则不做任何修改，否则追加到文件末尾。写入期间持有文件排他锁。

use crate::core::error::{ProvisionError, ProvisionResult};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// 单个配置文件的编辑结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "path", rename_all = "snake_case")]
pub enum ProfileEdit {
    Appended(PathBuf),
    AlreadyPresent(PathBuf),
}

/// 配置文件编辑器
#[derive(Debug, Clone)]
pub struct ProfileEditor {
    home: PathBuf,
    files: Vec<String>,
}

pub fn start_marker(key: &str) -> String {
    format!("# >>> devsetup:{key} >>>")
}

pub fn end_marker(key: &str) -> String {
    format!("# <<< devsetup:{key} <<<")
}

/// 生成完整的标记块（以换行结尾）
pub fn render_block(key: &str, lines: &[String]) -> String {
    let mut block = start_marker(key);
    block.push('\n');
    for line in lines {
        block.push_str(line);
        block.push('\n');
    }
    block.push_str(&end_marker(key));
    block.push('\n');
    block
}

/// 计算追加后的内容；块已存在时返回 None
pub fn apply_block(content: &str, key: &str, lines: &[String]) -> Option<String> {
    let marker = start_marker(key);
    if content.lines().any(|l| l.trim_end() == marker) {
        return None;
    }

    let mut appended = String::new();
    if !content.is_empty() && !content.ends_with('\n') {
        appended.push('\n');
    }
    if !content.is_empty() {
        appended.push('\n');
    }
    appended.push_str(&render_block(key, lines));
    Some(appended)
}

impl ProfileEditor {
    pub fn new(home: PathBuf, files: Vec<String>) -> Self {
        Self { home, files }
    }

    /// 使用 HOME 目录
    pub fn for_home(files: Vec<String>) -> ProvisionResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ProvisionError::config("无法获取用户主目录（HOME 未设置）"))?;
        Ok(Self::new(home, files))
    }

    /// 配置文件的绝对路径（相对路径基于 HOME）
    pub fn profile_paths(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|f| {
                let p = Path::new(f);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    self.home.join(p)
                }
            })
            .collect()
    }

    /// 确保所有配置文件中都存在该工具的配置块
    pub fn ensure_block(&self, key: &str, lines: &[String]) -> ProvisionResult<Vec<ProfileEdit>> {
        self.profile_paths()
            .iter()
            .map(|path| ensure_block_in(path, key, lines))
            .collect()
    }
}

fn ensure_block_in(path: &Path, key: &str, lines: &[String]) -> ProvisionResult<ProfileEdit> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ProvisionError::profile_write(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| ProvisionError::profile_write(path, e))?;

    // 获取排他锁（阻塞等待其他写操作完成），锁在 file drop 时自动释放
    file.lock_exclusive()
        .map_err(|e| ProvisionError::profile_write(path, e))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| ProvisionError::profile_write(path, e))?;

    match apply_block(&content, key, lines) {
        None => {
            tracing::debug!(path = %path.display(), key, "配置块已存在，跳过");
            Ok(ProfileEdit::AlreadyPresent(path.to_path_buf()))
        }
        Some(appended) => {
            file.write_all(appended.as_bytes())
                .and_then(|_| file.flush())
                .map_err(|e| ProvisionError::profile_write(path, e))?;
            tracing::info!(path = %path.display(), key, "已追加配置块");
            Ok(ProfileEdit::Appended(path.to_path_buf()))
        }
    }
}
