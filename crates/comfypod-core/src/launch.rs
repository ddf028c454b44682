//! 启动命令与启动脚本渲染。
//!
//! 启动参数在构建时由清单确定并写死到脚本中；容器启动时脚本不读取任何
//! 环境变量或命令行参数来改变这些选项。
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::borrow::Cow;
use std::path::PathBuf;

use crate::manifest::{ImageManifest, KeyValue};

/// 完整的应用启动命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// 解释器。
    pub program: String,
    /// 入口脚本与固定参数。
    pub args: Vec<String>,
    /// 工作目录（应用根目录）。
    pub cwd: PathBuf,
    /// 透传环境变量。
    pub env: Vec<KeyValue>,
}

impl LaunchCommand {
    /// 由构建清单生成启动命令。
    ///
    /// 参数顺序固定：
    /// `<entry> --listen <addr> --port <port> [--enable-cors-header]
    ///  --max-upload-size <MB> --output-directory <dir> --temp-directory <dir>`
    pub fn from_manifest(manifest: &ImageManifest) -> Self {
        let launch = &manifest.launch;
        let mut args = vec![
            launch.entry.clone(),
            "--listen".to_string(),
            launch.listen.clone(),
            "--port".to_string(),
            launch.port.to_string(),
        ];
        if launch.enable_cors_header {
            args.push("--enable-cors-header".to_string());
        }
        args.extend([
            "--max-upload-size".to_string(),
            launch.max_upload_size_mb.to_string(),
            "--output-directory".to_string(),
            launch.output_directory.clone(),
            "--temp-directory".to_string(),
            launch.temp_directory.clone(),
        ]);
        Self {
            program: launch.python.clone(),
            args,
            cwd: manifest.app_root(),
            env: manifest.effective_environment(),
        }
    }

    /// 渲染为 POSIX shell 启动脚本。
    pub fn render_script(&self) -> String {
        let mut out = String::from("#!/bin/sh\nset -e\n\n");
        for kv in &self.env {
            out.push_str(&format!("export {}={}\n", kv.key, shell_quote(&kv.value)));
        }
        out.push('\n');
        out.push_str(&format!("cd {}\n", shell_quote(&self.cwd.to_string_lossy())));
        let mut line = format!("exec {}", shell_quote(&self.program));
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        out.push_str(&line);
        out.push('\n');
        out
    }
}

/// 按 POSIX shell 规则引用单个参数。
///
/// 仅包含安全字符时原样返回，否则用单引号包裹（内部单引号写作 `'\''`）。
pub fn shell_quote(s: &str) -> Cow<'_, str> {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if safe {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_has_fixed_flags() {
        let cmd = LaunchCommand::from_manifest(&ImageManifest::default());
        assert_eq!(cmd.program, "python");
        assert_eq!(
            cmd.args,
            vec![
                "main.py",
                "--listen",
                "0.0.0.0",
                "--port",
                "8188",
                "--enable-cors-header",
                "--max-upload-size",
                "100",
                "--output-directory",
                "/runpod-volume/ComfyUI/output",
                "--temp-directory",
                "/tmp/comfyui",
            ]
        );
        assert_eq!(cmd.cwd, PathBuf::from("/ComfyUI"));
    }

    #[test]
    fn script_exports_env_and_execs() {
        let script = LaunchCommand::from_manifest(&ImageManifest::default()).render_script();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("export PYTHONPATH=/ComfyUI\n"));
        assert!(script.contains("export PYTHONUNBUFFERED=1\n"));
        assert!(script.contains("export PYTHONDONTWRITEBYTECODE=1\n"));
        assert!(script.contains("cd /ComfyUI\n"));
        assert!(script.contains(
            "exec python main.py --listen 0.0.0.0 --port 8188 --enable-cors-header \
             --max-upload-size 100 --output-directory /runpod-volume/ComfyUI/output \
             --temp-directory /tmp/comfyui\n"
        ));
    }

    #[test]
    fn cors_flag_can_be_disabled() {
        let mut m = ImageManifest::default();
        m.launch.enable_cors_header = false;
        let cmd = LaunchCommand::from_manifest(&m);
        assert!(!cmd.args.iter().any(|a| a == "--enable-cors-header"));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("/tmp/x"), "/tmp/x");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}
