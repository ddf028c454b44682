//! 构建状态落盘模型（build-state.json）。
//!
//! 目的：
//! - 记录“本次镜像构建安装了什么、哪些插件依赖失败”，随镜像一起留存便于排障
//! - 记录每个插件清单内容的 SHA-256，便于比对不同构建之间插件依赖是否变化
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::sweep::{BaseStep, InstallOutcome, SweepReport};

/// 构建状态（会序列化为 JSON 存储到状态目录）。
///
/// 字段说明：
/// - `state_id`：本次构建状态 ID
/// - `app_name`：被封装应用名称（与清单一致）
/// - `built_at`：构建时间（UTC）
/// - `base`：已完成的基础依赖步骤（状态文件存在即表示全部成功）
/// - `plugins`：插件依赖清单及其安装结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildState {
    pub state_id: Uuid,
    pub app_name: String,
    pub built_at: OffsetDateTime,
    #[serde(default)]
    pub base: Vec<BaseStep>,
    #[serde(default)]
    pub plugins: Vec<ManifestRecord>,
}

impl BuildState {
    /// 创建一份新的构建状态。
    pub fn new(app_name: String) -> Self {
        Self {
            state_id: Uuid::new_v4(),
            app_name,
            built_at: OffsetDateTime::now_utc(),
            base: Vec::new(),
            plugins: Vec::new(),
        }
    }

    /// 将一次插件扫描的结果追加到状态中。
    ///
    /// 说明：
    /// - 清单内容读取失败时 `sha256` 留空，不影响记录
    /// - 同一路径已有记录时以本次结果覆盖
    pub fn record_sweep(&mut self, report: &SweepReport) {
        for o in &report.outcomes {
            let path = o.manifest.path.to_string_lossy().to_string();
            self.plugins.retain(|p| p.path != path);
            self.plugins.push(ManifestRecord {
                path,
                sha256: file_sha256(&o.manifest.path),
                outcome: o.outcome.clone(),
            });
        }
    }

    /// 插件依赖安装失败的数量。
    pub fn failed_plugins(&self) -> usize {
        self.plugins.iter().filter(|p| !p.outcome.is_success()).count()
    }
}

/// 单个插件清单的落盘记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// 清单文件路径。
    pub path: String,
    #[serde(default)]
    /// 清单内容摘要（小写十六进制）。
    pub sha256: Option<String>,
    /// 安装结果。
    pub outcome: InstallOutcome,
}

/// 计算文件内容的 SHA-256（小写十六进制）；读取失败返回 `None`。
pub fn file_sha256(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let digest = Sha256::digest(&bytes);
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::discovery::RequirementsManifest;
    use crate::sweep::ManifestOutcome;

    #[test]
    fn record_sweep_and_roundtrip_json() {
        let dir = std::env::temp_dir().join(format!("comfypod-state-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let ok = dir.join("requirements.txt");
        std::fs::write(&ok, "abc").unwrap();

        let report = SweepReport {
            outcomes: vec![
                ManifestOutcome {
                    manifest: RequirementsManifest { path: ok.clone(), order: 0 },
                    outcome: InstallOutcome::Success,
                },
                ManifestOutcome {
                    manifest: RequirementsManifest {
                        path: PathBuf::from("/gone/requirements.txt"),
                        order: 1,
                    },
                    outcome: InstallOutcome::Failure { reason: "exit 1".to_string() },
                },
            ],
        };

        let mut state = BuildState::new("ComfyUI".to_string());
        state.record_sweep(&report);
        assert_eq!(state.failed_plugins(), 1);
        assert_eq!(
            state.plugins[0].sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(state.plugins[1].sha256.is_none());

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""status":"failure""#));
        let back: BuildState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.plugins.len(), 2);
        assert_eq!(back.state_id, state.state_id);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
