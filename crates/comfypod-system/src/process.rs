//! 外部包安装器进程调用。
//!
//! 实现策略：
//! - 每个清单独立启动一次安装器进程，阻塞等待结束
//! - 安装器继承当前进程环境，所有安装写入同一个全局包环境
//! - 失败时附带 stdout/stderr 便于在构建日志中排障
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use comfypod_core::manifest::InstallerCommand;
use comfypod_core::sweep::{InstallFailure, PackageInstaller};
use tracing::debug;

/// 基于外部命令（默认 `pip`）的包安装器。
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: InstallerCommand,
    package_args: Vec<String>,
}

impl CommandInstaller {
    /// 创建安装器。
    ///
    /// 参数：
    /// - `command`：按清单安装时的命令（清单路径追加在参数末尾）
    /// - `package_args`：按包说明符安装时的参数（说明符追加在参数末尾）
    pub fn new(command: InstallerCommand, package_args: Vec<String>) -> Self {
        Self {
            command,
            package_args,
        }
    }

    fn run(&self, extra_args: &[&OsStr], base_args: &[String]) -> Result<(), InstallFailure> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(base_args);
        cmd.args(extra_args);
        let out = cmd.output().map_err(|source| InstallFailure::Spawn {
            program: self.command.program.clone(),
            source,
        })?;
        let code = out.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);
        if self.command.is_success(code) {
            debug!("安装程序输出:\n{}", stdout);
            return Ok(());
        }
        Err(InstallFailure::ExitCode {
            code,
            output: format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
        })
    }
}

impl PackageInstaller for CommandInstaller {
    fn install_manifest(&mut self, manifest: &Path) -> Result<(), InstallFailure> {
        self.run(&[manifest.as_os_str()], &self.command.args)
    }

    fn install_packages(&mut self, packages: &[String]) -> Result<(), InstallFailure> {
        let extra: Vec<&OsStr> = packages.iter().map(|p| OsStr::new(p.as_str())).collect();
        self.run(&extra, &self.package_args)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh_installer(script: &str) -> CommandInstaller {
        CommandInstaller::new(
            InstallerCommand {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "installer".to_string()],
                success_exit_codes: Vec::new(),
            },
            vec!["-c".to_string(), script.to_string(), "installer".to_string()],
        )
    }

    #[test]
    fn zero_exit_is_success() {
        let mut installer = sh_installer("test -n \"$1\"");
        assert!(installer.install_manifest(Path::new("/x/requirements.txt")).is_ok());
        assert!(installer.install_packages(&["numpy".to_string()]).is_ok());
    }

    #[test]
    fn non_zero_exit_carries_output() {
        let mut installer = sh_installer("echo \"bad: $1\" >&2; exit 3");
        let err = installer
            .install_manifest(Path::new("/x/requirements.txt"))
            .unwrap_err();
        match err {
            InstallFailure::ExitCode { code, output } => {
                assert_eq!(code, 3);
                assert!(output.contains("bad: /x/requirements.txt"), "output: {output}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_failure() {
        let mut installer = CommandInstaller::new(
            InstallerCommand {
                program: "/nonexistent/comfypod-pip".to_string(),
                args: Vec::new(),
                success_exit_codes: Vec::new(),
            },
            Vec::new(),
        );
        let err = installer.install_manifest(Path::new("r.txt")).unwrap_err();
        assert!(matches!(err, InstallFailure::Spawn { .. }));
    }
}
