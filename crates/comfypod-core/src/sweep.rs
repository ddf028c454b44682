//! 依赖安装：基础依赖（失败即终止）与插件依赖扫描安装（失败跳过）。
//!
//! 错误分级：
//! - 致命：基础依赖安装失败，返回 [`InstallError`]，构建中止，插件扫描不会执行
//! - 可恢复：单个插件清单安装失败，记录为 [`InstallOutcome::Failure`] 并继续下一个
//!
//! 约束：
//! - 严格顺序执行，一个清单处理完毕（成功或失败）后才处理下一个
//! - 所有安装写入同一个全局包环境，不做按清单隔离；版本冲突时以最后安装者为准
//! - 不区分失败原因（缺包、网络、语法错误一律视为失败），不重试，不回滚
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::discovery::{self, RequirementsManifest};

/// 单次安装器调用失败。
#[derive(Debug, Error)]
pub enum InstallFailure {
    /// 安装器进程无法启动（不存在/无权限等）。
    #[error("启动安装程序失败: {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 安装器退出码不在成功列表中。
    #[error("安装程序退出码异常: {code}\n{output}")]
    ExitCode { code: i32, output: String },
}

/// 基础依赖安装失败（致命）。
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("基础依赖清单不存在: {}", .0.display())]
    BaseMissing(PathBuf),
    #[error("基础依赖安装失败: {}", .path.display())]
    BaseRequirements {
        path: PathBuf,
        #[source]
        source: InstallFailure,
    },
    #[error("基础依赖包安装失败: {packages}")]
    BasePackages {
        packages: String,
        #[source]
        source: InstallFailure,
    },
}

/// 包安装器抽象（真实实现调用外部 `pip`，测试中可替换）。
pub trait PackageInstaller {
    /// 按单个依赖清单安装。
    fn install_manifest(&mut self, manifest: &Path) -> Result<(), InstallFailure>;

    /// 按包说明符列表安装。
    fn install_packages(&mut self, packages: &[String]) -> Result<(), InstallFailure>;
}

/// 单个清单的安装结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    Success,
    Failure { reason: String },
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InstallOutcome::Success)
    }
}

/// 清单与其安装结果。
#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub manifest: RequirementsManifest,
    pub outcome: InstallOutcome,
}

/// 一次插件依赖扫描的结果汇总。
///
/// 说明：
/// - 扫描本身总是成功；失败数量仅用于日志与状态落盘，不影响退出码
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub outcomes: Vec<ManifestOutcome>,
}

impl SweepReport {
    /// 实际尝试安装的清单数。
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    /// 安装失败的清单路径。
    pub fn failed_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_success())
            .map(|o| o.manifest.path.as_path())
            .collect()
    }
}

/// 已完成的基础依赖步骤（用于状态落盘）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseStep {
    Requirements { path: String },
    Packages { packages: Vec<String> },
}

/// 安装基础依赖。
///
/// 参数：
/// - `requirements`：应用自身的 requirements 文件；`None` 表示不安装
/// - `packages`：额外包说明符；为空表示不安装
/// - `installer`：包安装器
///
/// 返回值：
/// - 成功：已完成的步骤列表
///
/// 异常处理：
/// - 清单不存在或安装器失败返回 [`InstallError`]，调用方应终止构建
pub fn install_base(
    requirements: Option<&Path>,
    packages: &[String],
    installer: &mut impl PackageInstaller,
) -> Result<Vec<BaseStep>, InstallError> {
    let mut steps = Vec::new();

    if let Some(path) = requirements {
        if !path.is_file() {
            return Err(InstallError::BaseMissing(path.to_path_buf()));
        }
        info!("安装基础依赖: {}", path.display());
        installer
            .install_manifest(path)
            .map_err(|source| InstallError::BaseRequirements {
                path: path.to_path_buf(),
                source,
            })?;
        steps.push(BaseStep::Requirements {
            path: path.to_string_lossy().to_string(),
        });
    }

    if !packages.is_empty() {
        info!("安装基础依赖包: {}", packages.join(" "));
        installer
            .install_packages(packages)
            .map_err(|source| InstallError::BasePackages {
                packages: packages.join(" "),
                source,
            })?;
        steps.push(BaseStep::Packages {
            packages: packages.to_vec(),
        });
    }

    Ok(steps)
}

/// 逐个安装已发现的插件依赖清单。
///
/// 异常处理：
/// - 单个清单失败只记录告警并继续；本函数不会失败
pub fn run_sweep(
    manifests: &[RequirementsManifest],
    installer: &mut impl PackageInstaller,
) -> SweepReport {
    let mut report = SweepReport::default();
    for manifest in manifests {
        info!("安装插件依赖: {}", manifest.path.display());
        let outcome = match installer.install_manifest(&manifest.path) {
            Ok(()) => InstallOutcome::Success,
            Err(e) => {
                warn!("插件依赖安装失败，跳过: {} ({e})", manifest.path.display());
                InstallOutcome::Failure {
                    reason: e.to_string(),
                }
            }
        };
        report.outcomes.push(ManifestOutcome {
            manifest: manifest.clone(),
            outcome,
        });
    }

    let failed = report.attempted() - report.succeeded();
    if failed > 0 {
        warn!(
            "插件依赖扫描完成: 共 {} 个，成功 {} 个，失败 {} 个",
            report.attempted(),
            report.succeeded(),
            failed
        );
    } else {
        info!("插件依赖扫描完成: 共 {} 个，全部成功", report.attempted());
    }
    report
}

/// 发现并安装插件根目录下的全部依赖清单。
pub fn sweep_plugins(
    root: &Path,
    file_name: &str,
    installer: &mut impl PackageInstaller,
) -> SweepReport {
    let manifests = discovery::discover_manifests(root, file_name);
    info!("发现插件依赖清单 {} 个: {}", manifests.len(), root.display());
    run_sweep(&manifests, installer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 记录调用的假安装器：路径中包含 `broken` 的清单安装失败。
    #[derive(Default)]
    struct RecordingInstaller {
        manifests: Vec<PathBuf>,
        packages: Vec<Vec<String>>,
        fail_packages: bool,
    }

    impl PackageInstaller for RecordingInstaller {
        fn install_manifest(&mut self, manifest: &Path) -> Result<(), InstallFailure> {
            self.manifests.push(manifest.to_path_buf());
            if manifest.to_string_lossy().contains("broken") {
                return Err(InstallFailure::ExitCode {
                    code: 1,
                    output: "ERROR: Invalid requirement".to_string(),
                });
            }
            Ok(())
        }

        fn install_packages(&mut self, packages: &[String]) -> Result<(), InstallFailure> {
            self.packages.push(packages.to_vec());
            if self.fail_packages {
                return Err(InstallFailure::ExitCode {
                    code: 1,
                    output: String::new(),
                });
            }
            Ok(())
        }
    }

    fn manifest(path: &str, order: usize) -> RequirementsManifest {
        RequirementsManifest {
            path: PathBuf::from(path),
            order,
        }
    }

    #[test]
    fn empty_sweep_makes_no_calls() {
        let mut installer = RecordingInstaller::default();
        let report = run_sweep(&[], &mut installer);
        assert_eq!(report.attempted(), 0);
        assert!(installer.manifests.is_empty());
    }

    #[test]
    fn failures_do_not_stop_the_sweep() {
        let manifests = vec![
            manifest("/n/pluginA/requirements.txt", 0),
            manifest("/n/broken1/requirements.txt", 1),
            manifest("/n/pluginC/requirements.txt", 2),
            manifest("/n/broken2/requirements.txt", 3),
        ];
        let mut installer = RecordingInstaller::default();
        let report = run_sweep(&manifests, &mut installer);

        assert_eq!(installer.manifests.len(), 4);
        assert_eq!(report.attempted(), 4);
        assert_eq!(report.succeeded(), 2);
        let mut failed = report.failed_paths();
        failed.sort();
        assert_eq!(
            failed,
            vec![
                Path::new("/n/broken1/requirements.txt"),
                Path::new("/n/broken2/requirements.txt")
            ]
        );
    }

    #[test]
    fn missing_base_requirements_is_fatal() {
        let mut installer = RecordingInstaller::default();
        let missing = std::env::temp_dir().join(format!("comfypod-none-{}.txt", uuid::Uuid::new_v4()));
        let err = install_base(Some(&missing), &[], &mut installer).unwrap_err();
        assert!(matches!(err, InstallError::BaseMissing(_)));
        assert!(installer.manifests.is_empty());
    }

    #[test]
    fn base_package_failure_is_fatal() {
        let mut installer = RecordingInstaller {
            fail_packages: true,
            ..Default::default()
        };
        let err = install_base(None, &["torch".to_string()], &mut installer).unwrap_err();
        assert!(matches!(err, InstallError::BasePackages { .. }));
        assert_eq!(installer.packages, vec![vec!["torch".to_string()]]);
    }

    #[test]
    fn base_steps_are_recorded() {
        let dir = std::env::temp_dir().join(format!("comfypod-base-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let req = dir.join("requirements.txt");
        std::fs::write(&req, "numpy\n").unwrap();

        let mut installer = RecordingInstaller::default();
        let steps = install_base(Some(&req), &["xformers".to_string()], &mut installer).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], BaseStep::Requirements { .. }));
        assert_eq!(installer.manifests, vec![req.clone()]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
