//! 网络存储中的模型文件校验。
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

/// 网络存储默认挂载点。
pub const DEFAULT_NETWORK_VOLUME: &str = "/runpod-volume";

/// 文生图工作流依赖的模型文件（相对模型根目录）。
pub const REQUIRED_MODELS: &[(&str, &str)] = &[
    ("checkpoint", "checkpoints/flux1-dev.safetensors"),
    ("vae", "vae/ae.safetensors"),
    ("clip1", "clip/t5xxl_fp16.safetensors"),
    ("clip2", "clip/clip_l.safetensors"),
];

/// 缺失的模型文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingModel {
    /// 模型用途标识（如 `checkpoint`）。
    pub kind: String,
    pub path: PathBuf,
}

/// 检查模型根目录下必需的模型文件。
///
/// 返回值：
/// - 缺失项列表；为空表示全部存在
pub fn missing_models(models_root: &Path) -> Vec<MissingModel> {
    REQUIRED_MODELS
        .iter()
        .map(|(kind, rel)| (kind, models_root.join(rel)))
        .filter(|(_, path)| !path.exists())
        .map(|(kind, path)| MissingModel {
            kind: kind.to_string(),
            path,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_missing_files() {
        let root = std::env::temp_dir().join(format!("comfypod-models-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("vae")).unwrap();
        std::fs::write(root.join("vae/ae.safetensors"), b"x").unwrap();

        let missing = missing_models(&root);
        assert_eq!(missing.len(), 3);
        assert!(missing.iter().all(|m| m.kind != "vae"));
        assert!(missing.iter().any(|m| m.path == root.join("clip/clip_l.safetensors")));

        let _ = std::fs::remove_dir_all(&root);
    }
}
