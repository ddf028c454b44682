//! 插件依赖清单发现。
//!
//! 规则：
//! - 自插件根目录递归查找文件名精确等于清单文件名的普通文件
//! - 相对根目录的任一目录分量以 `.` 开头（隐藏目录）时整棵子树跳过
//! - 不跟随符号链接；无法读取的目录项记录告警后跳过
//! - 结果顺序即文件系统遍历顺序，不做排序，调用方不应依赖顺序
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// 隐藏目录标记。
pub const HIDDEN_MARKER: char = '.';

/// 一个已发现的依赖清单。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementsManifest {
    /// 清单文件路径（以插件根目录为前缀）。
    pub path: PathBuf,
    /// 发现顺序（从 0 开始）。
    pub order: usize,
}

fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(HIDDEN_MARKER)
}

/// 判断 `path` 相对 `root` 的目录分量中是否存在隐藏目录。
///
/// 说明：
/// - 只检查目录分量，最后一个分量（文件名本身）不参与判断
/// - `path` 不在 `root` 之下时返回 `false`
pub fn is_under_hidden_dir(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    let Some(parent) = rel.parent() else {
        return false;
    };
    parent.components().any(|c| match c {
        Component::Normal(name) => is_hidden_name(name),
        _ => false,
    })
}

/// 扫描插件根目录，返回全部依赖清单。
///
/// 参数：
/// - `root`：插件根目录
/// - `file_name`：清单文件名（如 `requirements.txt`）
///
/// 返回值：
/// - 发现的清单列表；根目录不存在时返回空列表
pub fn discover_manifests(root: &Path, file_name: &str) -> Vec<RequirementsManifest> {
    if !root.is_dir() {
        warn!("插件目录不存在，跳过扫描: {}", root.display());
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && e.file_type().is_dir() && is_hidden_name(e.file_name())));

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("读取目录项失败，跳过: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.file_name() != OsStr::new(file_name) {
            continue;
        }
        found.push(RequirementsManifest {
            path: entry.into_path(),
            order: found.len(),
        });
    }
    found
}
