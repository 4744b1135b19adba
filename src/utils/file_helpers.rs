//! 文件操作辅助函数
//!
//! 下载产物的 SHA256 计算与校验。

use crate::core::error::{ProvisionError, ProvisionResult};
use std::fs;
use std::path::Path;

/// 计算文件的 SHA256 哈希值（十六进制小写）
pub fn file_checksum(path: &Path) -> std::io::Result<String> {
    use sha2::{Digest, Sha256};

    let content = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let digest = hasher.finalize();
    Ok(format!("{digest:x}"))
}

/// 校验下载文件的 SHA256，不匹配时返回 `DownloadError`
pub fn verify_checksum(path: &Path, expected: &str, source_url: &str) -> ProvisionResult<()> {
    let actual = file_checksum(path)
        .map_err(|e| ProvisionError::download(source_url, format!("读取下载文件失败: {e}")))?;

    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ProvisionError::download(
            source_url,
            format!("SHA256 不匹配: 期望 {expected}，实际 {actual}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_checksum() -> std::io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(b"test content")?;
        temp_file.flush()?;

        let checksum = file_checksum(temp_file.path())?;
        assert_eq!(
            checksum,
            "6ae8a75555209fd6c44157c0aed8016e763ff435a19cf186f76863140143ff72"
        );
        Ok(())
    }

    #[test]
    fn test_verify_checksum_accepts_uppercase() -> std::io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(b"test content")?;
        temp_file.flush()?;

        let expected = "6AE8A75555209FD6C44157C0AED8016E763FF435A19CF186F76863140143FF72";
        assert!(verify_checksum(temp_file.path(), expected, "https://x/pkg.deb").is_ok());
        Ok(())
    }

    #[test]
    fn test_verify_checksum_mismatch() -> std::io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(b"tampered")?;
        temp_file.flush()?;

        let err = verify_checksum(temp_file.path(), "00", "https://x/pkg.deb").unwrap_err();
        assert!(err.to_string().contains("SHA256 不匹配"));
        Ok(())
    }

    #[test]
    fn test_verify_checksum_missing_file() {
        let err = verify_checksum(Path::new("/nonexistent/file.deb"), "00", "u").unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::DownloadError);
    }
}
