//! 镜像构建清单（image-manifest.json）模型定义。
//!
//! 该模块描述“镜像构建 + 启动”需要的全部输入：
//! - 被封装应用（ComfyUI）的安装根目录与插件目录
//! - 包安装器命令（默认 `pip install --no-cache-dir -r <清单>`）
//! - 基础依赖（应用自身的 requirements，失败即终止构建）
//! - 模型目录布局（由外部网络存储挂载填充）
//! - 启动参数与透传环境变量
//!
//! 约定：
//! - 所有字段均提供默认值，`{}` 即描述标准镜像；清单可向前兼容
//! - 该模块仅定义数据结构与路径推导，不执行任何安装动作
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::paths;

/// 插件依赖清单的默认文件名。
pub const DEFAULT_MANIFEST_FILE_NAME: &str = "requirements.txt";

/// 镜像构建清单根对象（对应 `image-manifest.json`）。
///
/// 说明：
/// - `app_root` 为绝对路径；`plugin_dir`、`base.requirements`、`layout.models_root`
///   可为相对路径（相对 `app_root`）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageManifest {
    /// 被封装应用名称（用于日志与状态落盘）。
    pub app_name: String,
    /// 应用安装根目录。
    pub app_root: String,
    /// 插件目录（每个插件一个子目录）。
    pub plugin_dir: String,
    /// 插件依赖清单文件名（精确匹配）。
    pub manifest_file_name: String,
    /// 包安装器命令。
    pub installer: InstallerCommand,
    /// 基础依赖配置。
    pub base: BaseDependencies,
    /// 模型目录布局。
    pub layout: LayoutManifest,
    /// 启动配置。
    pub launch: LaunchManifest,
    /// 额外环境变量（追加到固定的三项之后，同名覆盖）。
    pub environment: Vec<KeyValue>,
}

impl Default for ImageManifest {
    fn default() -> Self {
        Self {
            app_name: "ComfyUI".to_string(),
            app_root: "/ComfyUI".to_string(),
            plugin_dir: "custom_nodes".to_string(),
            manifest_file_name: DEFAULT_MANIFEST_FILE_NAME.to_string(),
            installer: InstallerCommand::default(),
            base: BaseDependencies::default(),
            layout: LayoutManifest::default(),
            launch: LaunchManifest::default(),
            environment: Vec::new(),
        }
    }
}

impl ImageManifest {
    /// 应用安装根目录。
    pub fn app_root(&self) -> PathBuf {
        PathBuf::from(&self.app_root)
    }

    /// 插件根目录（依赖清单的扫描起点）。
    ///
    /// 异常处理：
    /// - `plugin_dir` 为空字符串时返回错误
    pub fn plugin_root(&self) -> Result<PathBuf> {
        paths::resolve_path(&self.app_root(), &self.plugin_dir)
    }

    /// 模型根目录。
    pub fn models_root(&self) -> Result<PathBuf> {
        paths::resolve_path(&self.app_root(), &self.layout.models_root)
    }

    /// 基础依赖清单路径；未配置时返回 `None`。
    pub fn base_requirements_path(&self) -> Result<Option<PathBuf>> {
        match self.base.requirements.as_deref() {
            None => Ok(None),
            Some(raw) => paths::resolve_path(&self.app_root(), raw).map(Some),
        }
    }

    /// 实际生效的环境变量（有序）。
    ///
    /// 返回值：
    /// - 固定三项：`PYTHONPATH=<app_root>`、`PYTHONUNBUFFERED=1`、`PYTHONDONTWRITEBYTECODE=1`
    /// - 之后追加 `environment` 中的条目；与已有键同名时覆盖原值（位置不变）
    pub fn effective_environment(&self) -> Vec<KeyValue> {
        let mut env = vec![
            KeyValue::new("PYTHONPATH", &self.app_root),
            KeyValue::new("PYTHONUNBUFFERED", "1"),
            KeyValue::new("PYTHONDONTWRITEBYTECODE", "1"),
        ];
        for kv in &self.environment {
            match env.iter_mut().find(|e| e.key == kv.key) {
                Some(existing) => existing.value = kv.value.clone(),
                None => env.push(kv.clone()),
            }
        }
        env
    }
}

/// 外部包安装器命令定义。
///
/// 约定：
/// - 调用形式为 `<program> <args...> <清单路径>`
/// - `success_exit_codes` 为空时仅 `0` 视为成功
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerCommand {
    /// 安装器可执行文件（可为 PATH 中的命令名）。
    pub program: String,
    #[serde(default)]
    /// 清单路径之前的参数。
    pub args: Vec<String>,
    #[serde(default)]
    /// 视为成功的退出码列表。
    pub success_exit_codes: Vec<i32>,
}

impl Default for InstallerCommand {
    fn default() -> Self {
        Self {
            program: "pip".to_string(),
            args: vec![
                "install".to_string(),
                "--no-cache-dir".to_string(),
                "-r".to_string(),
            ],
            success_exit_codes: Vec::new(),
        }
    }
}

impl InstallerCommand {
    /// 判断退出码是否视为成功。
    pub fn is_success(&self, code: i32) -> bool {
        if self.success_exit_codes.is_empty() {
            code == 0
        } else {
            self.success_exit_codes.contains(&code)
        }
    }
}

/// 基础依赖（被封装应用自身的依赖）。
///
/// 说明：
/// - 任一步骤失败即视为构建失败，插件依赖扫描不会执行
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseDependencies {
    /// 应用自身的 requirements 文件（相对 `app_root`）。
    pub requirements: Option<String>,
    /// 额外包说明符（如 `torch==2.3.1`），在 requirements 之后一次性安装。
    pub packages: Vec<String>,
    /// 安装额外包时使用的参数（包说明符追加其后）。
    pub package_args: Vec<String>,
}

impl Default for BaseDependencies {
    fn default() -> Self {
        Self {
            requirements: Some(DEFAULT_MANIFEST_FILE_NAME.to_string()),
            packages: Vec::new(),
            package_args: vec!["install".to_string(), "--no-cache-dir".to_string()],
        }
    }
}

/// 模型目录布局。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutManifest {
    /// 模型根目录（相对 `app_root` 或绝对路径）。
    pub models_root: String,
    /// 需要预先创建的模型子目录（空目录，运行时由网络存储填充）。
    pub model_subdirs: Vec<String>,
}

impl Default for LayoutManifest {
    fn default() -> Self {
        Self {
            models_root: "models".to_string(),
            model_subdirs: crate::layout::DEFAULT_MODEL_SUBDIRS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 启动配置（写入启动脚本后即固定，运行时不再读取任何参数）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchManifest {
    /// Python 解释器。
    pub python: String,
    /// 应用入口脚本（相对 `app_root`）。
    pub entry: String,
    /// 监听地址。
    pub listen: String,
    /// 监听端口。
    pub port: u16,
    /// 是否开启 CORS 响应头。
    pub enable_cors_header: bool,
    /// 上传大小上限（MB）。
    pub max_upload_size_mb: u32,
    /// 输出目录。
    pub output_directory: String,
    /// 临时目录。
    pub temp_directory: String,
    /// 启动脚本落盘路径。
    pub script_path: String,
}

impl Default for LaunchManifest {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            entry: "main.py".to_string(),
            listen: "0.0.0.0".to_string(),
            port: 8188,
            enable_cors_header: true,
            max_upload_size_mb: 100,
            output_directory: "/runpod-volume/ComfyUI/output".to_string(),
            temp_directory: "/tmp/comfyui".to_string(),
            script_path: "/start.sh".to_string(),
        }
    }
}

/// 键值对（环境变量等）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 空对象应得到标准镜像的默认配置。
    fn empty_object_yields_defaults() {
        let m: ImageManifest = serde_json::from_str("{}").unwrap();
        assert_eq!(m.app_root, "/ComfyUI");
        assert_eq!(m.manifest_file_name, "requirements.txt");
        assert_eq!(m.installer.program, "pip");
        assert_eq!(m.launch.port, 8188);
        assert_eq!(m.plugin_root().unwrap(), PathBuf::from("/ComfyUI/custom_nodes"));
        assert_eq!(
            m.base_requirements_path().unwrap(),
            Some(PathBuf::from("/ComfyUI/requirements.txt"))
        );
    }

    #[test]
    fn environment_overrides_keep_position() {
        let m: ImageManifest = serde_json::from_str(
            r#"{ "app_root": "/opt/app",
                 "environment": [
                   { "key": "PYTHONUNBUFFERED", "value": "0" },
                   { "key": "HF_HOME", "value": "/runpod-volume/hf" } ] }"#,
        )
        .unwrap();
        let env = m.effective_environment();
        assert_eq!(env[0], KeyValue::new("PYTHONPATH", "/opt/app"));
        assert_eq!(env[1], KeyValue::new("PYTHONUNBUFFERED", "0"));
        assert_eq!(env[2], KeyValue::new("PYTHONDONTWRITEBYTECODE", "1"));
        assert_eq!(env[3], KeyValue::new("HF_HOME", "/runpod-volume/hf"));
        assert_eq!(env.len(), 4);
    }

    #[test]
    fn installer_success_codes() {
        let mut cmd = InstallerCommand::default();
        assert!(cmd.is_success(0));
        assert!(!cmd.is_success(1));
        cmd.success_exit_codes = vec![0, 23];
        assert!(cmd.is_success(23));
    }
}
