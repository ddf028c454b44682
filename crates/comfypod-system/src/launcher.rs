//! 启动脚本落盘与应用启动。
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use comfypod_core::launch::LaunchCommand;
use tracing::info;

/// 写入启动脚本并设置可执行权限（unix 下为 0755）。
///
/// 异常处理：
/// - 创建父目录、写文件或设置权限失败返回错误
pub fn write_script(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建目录失败: {}", parent.display()))?;
        }
    }
    std::fs::write(path, content)
        .with_context(|| format!("写入启动脚本失败: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("设置启动脚本权限失败: {}", path.display()))?;
    }

    info!("启动脚本已写入: {}", path.display());
    Ok(())
}

fn build_command(launch: &LaunchCommand) -> Command {
    let mut cmd = Command::new(&launch.program);
    cmd.args(&launch.args).current_dir(&launch.cwd);
    for kv in &launch.env {
        cmd.env(&kv.key, &kv.value);
    }
    cmd
}

/// 启动被封装应用。
///
/// 行为：
/// - unix：以 `exec` 替换当前进程，成功时不返回
/// - 其他平台：启动子进程并等待，退出码非 0 时返回错误
pub fn exec(launch: &LaunchCommand) -> Result<()> {
    info!(
        "启动应用: {} {} (cwd={})",
        launch.program,
        launch.args.join(" "),
        launch.cwd.display()
    );
    let mut cmd = build_command(launch);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = cmd.exec();
        Err(anyhow!("启动应用失败: {}: {err}", launch.program))
    }

    #[cfg(not(unix))]
    {
        let status = cmd
            .status()
            .with_context(|| format!("启动应用失败: {}", launch.program))?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("应用异常退出: {:?}", status.code()))
        }
    }
}
