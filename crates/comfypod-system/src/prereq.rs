//! 前置依赖检测（Python 解释器、包安装器是否可用）。
//!
//! 说明：
//! - 本模块只负责“检测是否可用”，不负责安装；镜像基础层负责提供解释器与 pip。
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

/// 前置依赖是否可用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrereqStatus {
    /// 已找到（解析后的可执行文件路径）。
    Installed(PathBuf),
    /// 未找到。
    Missing,
}

/// 在 PATH 中（或按给定路径）查找可执行文件。
///
/// 返回值：
/// - `Installed(path)`：找到可执行文件
/// - `Missing`：未找到
pub fn program_status(program: &str) -> PrereqStatus {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            PrereqStatus::Installed(candidate.to_path_buf())
        } else {
            PrereqStatus::Missing
        };
    }
    match which::which(program) {
        Ok(path) => PrereqStatus::Installed(path),
        Err(_) => PrereqStatus::Missing,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn finds_sh_and_misses_nonsense() {
        assert!(matches!(program_status("sh"), PrereqStatus::Installed(_)));
        assert_eq!(
            program_status("comfypod-definitely-not-installed"),
            PrereqStatus::Missing
        );
        assert_eq!(program_status("/nonexistent/pip"), PrereqStatus::Missing);
    }
}
