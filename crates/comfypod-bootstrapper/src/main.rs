//! ComfyUI 镜像构建引导程序（bootstrapper）。
//!
//! 职责：
//! - 读取 `image-manifest.json`，按步骤编排镜像构建
//! - 创建模型目录布局（空目录，运行时由网络存储填充）
//! - 安装基础依赖（失败即终止构建）
//! - 扫描插件目录下的依赖清单并逐个安装（单个失败记录后继续）
//! - 生成启动脚本；容器启动时以固定参数拉起应用
//! - 生成 `build-state.json`，记录本次构建的安装结果
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfypod_core::launch::LaunchCommand;
use comfypod_core::manifest::ImageManifest;
use comfypod_core::state::BuildState;
use comfypod_core::sweep::{self, SweepReport};
use comfypod_core::{discovery, layout, paths};
use comfypod_system::process::CommandInstaller;
use comfypod_system::{launcher, prereq};
use tracing::{info, warn};

/// 命令行参数。
///
/// 说明：
/// - `manifest` 指向构建清单文件（默认 `image-manifest.json`；默认文件不存在时使用内置默认配置）
#[derive(Debug, Parser)]
#[command(name = "comfypod-bootstrapper", version)]
struct Cli {
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_MANIFEST: &str = "image-manifest.json";

/// bootstrapper 支持的子命令。
#[derive(Debug, Subcommand)]
enum Commands {
    /// 完整构建：目录布局 + 基础依赖 + 插件依赖 + 启动脚本 + 状态落盘。
    Install,
    /// 仅安装基础依赖（失败返回非 0）。
    InstallBase,
    /// 仅扫描并安装插件依赖（单个失败不影响退出码）。
    Sweep {
        /// 覆盖清单中的插件目录。
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// 仅创建目录布局。
    Scaffold,
    /// 仅生成启动脚本。
    WriteLauncher {
        /// 覆盖清单中的脚本路径。
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 以固定参数启动应用。
    Launch,
    /// 仅列出将被安装的插件依赖清单（不做安装）。
    Detect,
    /// 环境自检（解释器、安装器、目录）。
    Doctor,
}

/// 程序入口：解析参数并分发子命令。
///
/// 异常处理：
/// - 任意子命令执行失败会返回 `Err`，进程以非 0 退出码结束（构建随之中止）。
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let manifest = load_manifest(&cli.manifest)?;
    match cli.command {
        Commands::Install => install(&manifest),
        Commands::InstallBase => install_base(&manifest).map(|_| ()),
        Commands::Sweep { root } => sweep_only(&manifest, root.as_deref()),
        Commands::Scaffold => layout::scaffold(&manifest).map(|_| ()),
        Commands::WriteLauncher { output } => write_launcher(&manifest, output.as_deref()),
        Commands::Launch => launcher::exec(&LaunchCommand::from_manifest(&manifest)),
        Commands::Detect => detect(&manifest),
        Commands::Doctor => doctor(&manifest),
    }
}

/// 读取并解析构建清单（JSON）。
///
/// 返回值：
/// - 文件存在：解析后的 [`ImageManifest`]
/// - 默认路径且文件不存在：内置默认配置
///
/// 异常处理：
/// - 显式指定的文件不存在、读取失败或 JSON 解析失败返回错误
fn load_manifest(path: &Path) -> Result<ImageManifest> {
    if !path.exists() && path == Path::new(DEFAULT_MANIFEST) {
        info!("未找到 {}，使用内置默认配置", DEFAULT_MANIFEST);
        return Ok(ImageManifest::default());
    }
    let bytes = std::fs::read(path).with_context(|| format!("读取清单失败: {}", path.display()))?;
    let manifest: ImageManifest =
        serde_json::from_slice(&bytes).context("解析清单 JSON 失败")?;
    Ok(manifest)
}

fn installer_for(manifest: &ImageManifest) -> CommandInstaller {
    CommandInstaller::new(
        manifest.installer.clone(),
        manifest.base.package_args.clone(),
    )
}

/// 执行完整构建流程。
///
/// 主要步骤：
/// 1) 创建目录布局
/// 2) 安装基础依赖（失败即返回错误，后续步骤不执行）
/// 3) 扫描安装插件依赖（失败仅记录）
/// 4) 生成启动脚本
/// 5) 落盘 `build-state.json`
fn install(manifest: &ImageManifest) -> Result<()> {
    info!("开始构建: {} ({})", manifest.app_name, manifest.app_root);

    layout::scaffold(manifest)?;

    let mut state = BuildState::new(manifest.app_name.clone());
    state.base = install_base(manifest)?;

    let report = run_sweep(manifest, None)?;
    state.record_sweep(&report);

    write_launcher(manifest, None)?;
    persist_state(&state);

    if state.failed_plugins() > 0 {
        warn!("构建完成，{} 个插件依赖安装失败", state.failed_plugins());
    } else {
        info!("构建完成");
    }
    Ok(())
}

/// 安装基础依赖。
///
/// 异常处理：
/// - 清单缺失或安装器失败返回错误（致命）
fn install_base(manifest: &ImageManifest) -> Result<Vec<sweep::BaseStep>> {
    let requirements = manifest.base_requirements_path()?;
    let mut installer = installer_for(manifest);
    let steps = sweep::install_base(
        requirements.as_deref(),
        &manifest.base.packages,
        &mut installer,
    )?;
    info!("基础依赖安装完成");
    Ok(steps)
}

fn run_sweep(manifest: &ImageManifest, root: Option<&Path>) -> Result<SweepReport> {
    let root = match root {
        Some(r) => r.to_path_buf(),
        None => manifest.plugin_root()?,
    };
    let mut installer = installer_for(manifest);
    Ok(sweep::sweep_plugins(
        &root,
        &manifest.manifest_file_name,
        &mut installer,
    ))
}

/// 单独执行插件依赖扫描，并把结果合并进已有的状态文件。
///
/// 说明：
/// - 插件安装失败不会使本命令失败
/// - 状态文件读取/解析/写入失败只记录告警；无法解析时以新的状态重新记录
fn sweep_only(manifest: &ImageManifest, root: Option<&Path>) -> Result<()> {
    let report = run_sweep(manifest, root)?;

    let mut state = load_state(&paths::default_state_file())
        .unwrap_or_else(|| BuildState::new(manifest.app_name.clone()));
    state.record_sweep(&report);
    persist_state(&state);
    Ok(())
}

/// 读取已有的构建状态；文件不存在或无法解析时返回 `None`。
fn load_state(path: &Path) -> Option<BuildState> {
    if !path.exists() {
        return None;
    }
    let parsed = std::fs::read(path)
        .context("读取 build-state.json 失败")
        .and_then(|bytes| {
            serde_json::from_slice::<BuildState>(&bytes).context("解析 build-state.json 失败")
        });
    match parsed {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("忽略已有状态文件 {}: {e:#}", path.display());
            None
        }
    }
}

fn write_launcher(manifest: &ImageManifest, output: Option<&Path>) -> Result<()> {
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(&manifest.launch.script_path),
    };
    let script = LaunchCommand::from_manifest(manifest).render_script();
    launcher::write_script(&path, &script)
}

/// 列出插件依赖清单并输出到 stdout（不做系统修改）。
fn detect(manifest: &ImageManifest) -> Result<()> {
    let root = manifest.plugin_root()?;
    for m in discovery::discover_manifests(&root, &manifest.manifest_file_name) {
        println!("{}", m.path.display());
    }
    Ok(())
}

/// 环境自检（用于排障）。
///
/// 输出：
/// - 解释器与安装器是否可用
/// - 应用根目录、插件目录、模型目录是否存在
fn doctor(manifest: &ImageManifest) -> Result<()> {
    println!("python = {:?}", prereq::program_status(&manifest.launch.python));
    println!(
        "installer = {:?}",
        prereq::program_status(&manifest.installer.program)
    );
    println!("app_root = {}", manifest.app_root().is_dir());
    println!("plugin_root = {}", manifest.plugin_root()?.is_dir());
    println!("models_root = {}", manifest.models_root()?.is_dir());
    println!("state_file = {}", paths::default_state_file().display());
    Ok(())
}

/// 将构建状态序列化并写入状态目录。
///
/// 说明：
/// - 状态文件仅用于排障；创建目录、序列化或写文件失败只记录告警，不影响构建结果
fn persist_state(state: &BuildState) {
    let path = paths::default_state_file();
    if let Err(e) = write_state(&path, state) {
        warn!("写入状态文件失败，已跳过: {e:#}");
    }
}

fn write_state(path: &Path, state: &BuildState) -> Result<()> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(state).context("序列化 build-state.json 失败")?;
    std::fs::write(path, bytes)
        .with_context(|| format!("写入状态文件失败: {}", path.display()))?;
    Ok(())
}
