//! 统一路径与目录约定。
//!
//! 目标：
//! - 将落盘路径集中管理，避免散落在各模块中
//! - 统一构建状态文件路径，便于镜像内排障
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// 覆盖状态目录的环境变量名。
pub const STATE_DIR_ENV: &str = "COMFYPOD_STATE_DIR";

/// 默认状态目录。
pub const DEFAULT_STATE_DIR: &str = "/var/lib/comfypod";

/// 获取构建状态目录。
///
/// 返回值：
/// - 设置了 `COMFYPOD_STATE_DIR` 且非空：该目录
/// - 否则：`/var/lib/comfypod`
pub fn state_dir() -> PathBuf {
    match std::env::var(STATE_DIR_ENV) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => PathBuf::from(DEFAULT_STATE_DIR),
    }
}

/// 默认构建状态文件路径。
///
/// 返回值：
/// - `<state_dir>/build-state.json`
pub fn default_state_file() -> PathBuf {
    state_dir().join("build-state.json")
}

/// 确保目录存在（不存在则递归创建）。
///
/// 异常处理：
/// - 目录创建失败（权限、路径非法等）会返回错误。
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("创建目录失败: {}", path.display()))?;
    Ok(())
}

/// 将清单中的路径字段解析为实际路径。
///
/// 参数：
/// - `base`：相对路径的基准目录（通常是应用根目录或清单所在目录）
/// - `raw`：清单中的路径字符串
///
/// 返回值：
/// - `raw` 为绝对路径：直接返回
/// - `raw` 为相对路径：返回 `base.join(raw)`
///
/// 异常处理：
/// - `raw` 为空字符串时返回错误，避免误用导致写入基准目录本身。
pub fn resolve_path(base: &Path, raw: &str) -> Result<PathBuf> {
    if raw.is_empty() {
        return Err(anyhow!("空路径"));
    }
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        Ok(p)
    } else {
        Ok(base.join(p))
    }
}
