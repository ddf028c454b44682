//! 应用目录布局：预先创建模型子目录与输出/临时目录。
//!
//! 说明：
//! - 模型子目录在镜像中为空目录，运行时由网络存储挂载填充
//! - 重复执行是幂等的
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::manifest::ImageManifest;
use crate::paths;

/// 默认创建的模型子目录。
pub const DEFAULT_MODEL_SUBDIRS: &[&str] = &[
    "checkpoints",
    "clip",
    "clip_vision",
    "configs",
    "controlnet",
    "embeddings",
    "loras",
    "unet",
    "upscale_models",
    "vae",
];

/// 在 `models_root` 下创建全部模型子目录。
///
/// 返回值：
/// - 已确保存在的目录列表（含 `models_root` 本身）
///
/// 异常处理：
/// - 任一目录创建失败返回错误；空名称返回错误
pub fn scaffold_models(models_root: &Path, subdirs: &[String]) -> Result<Vec<PathBuf>> {
    paths::ensure_dir(models_root)?;
    let mut created = vec![models_root.to_path_buf()];
    for sub in subdirs {
        let dir = paths::resolve_path(models_root, sub)?;
        paths::ensure_dir(&dir)?;
        created.push(dir);
    }
    Ok(created)
}

/// 按清单创建完整目录布局（模型目录 + 启动输出/临时目录）。
pub fn scaffold(manifest: &ImageManifest) -> Result<Vec<PathBuf>> {
    let models_root = manifest.models_root()?;
    let mut created = scaffold_models(&models_root, &manifest.layout.model_subdirs)?;
    for raw in [
        &manifest.launch.output_directory,
        &manifest.launch.temp_directory,
    ] {
        let dir = paths::resolve_path(&manifest.app_root(), raw)?;
        paths::ensure_dir(&dir)?;
        created.push(dir);
    }
    info!("目录布局已就绪: {}", models_root.display());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_is_idempotent() {
        let root = std::env::temp_dir().join(format!("comfypod-layout-{}", uuid::Uuid::new_v4()));
        let mut manifest = ImageManifest::default();
        manifest.app_root = root.to_string_lossy().to_string();
        manifest.launch.output_directory = "output".to_string();
        manifest.launch.temp_directory = "temp".to_string();

        let first = scaffold(&manifest).unwrap();
        let second = scaffold(&manifest).unwrap();
        assert_eq!(first, second);
        for sub in DEFAULT_MODEL_SUBDIRS {
            assert!(root.join("models").join(sub).is_dir(), "missing {sub}");
        }
        assert!(root.join("output").is_dir());
        assert!(root.join("temp").is_dir());

        let _ = std::fs::remove_dir_all(&root);
    }
}
