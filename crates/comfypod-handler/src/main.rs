//! 无服务器文生图任务处理程序。
//!
//! 目标：
//! - 接收一条任务事件（JSON），驱动容器内运行的 ComfyUI 完成文生图
//! - 模型文件来自网络存储挂载（默认 `/runpod-volume`）
//! - 处理结果以 JSON 输出到 stdout；日志输出到 stderr
//!
//! 用法：
//! - `comfypod-handler --event event.json`
//! - `cat event.json | comfypod-handler`
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

mod comfy;
mod handler;
mod webhook;

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use comfypod_core::job::{JobEvent, JobReply};
use comfypod_core::models::DEFAULT_NETWORK_VOLUME;
use tracing::{info, warn};

use crate::comfy::ComfyClient;
use crate::handler::{Handler, HandlerConfig};
use crate::webhook::HttpNotifier;

/// 运行参数。
///
/// 说明：
/// - `--event`：事件文件路径；不指定时从 stdin 读取
/// - `--output-dir`：不指定时为 `<network_volume>/ComfyUI/output`
#[derive(Debug, Parser)]
#[command(name = "comfypod-handler", version)]
struct Args {
    #[arg(long)]
    event: Option<PathBuf>,

    #[arg(long, default_value = "http://127.0.0.1:8188")]
    comfy_url: String,

    #[arg(long, default_value = DEFAULT_NETWORK_VOLUME)]
    network_volume: PathBuf,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,
}

/// 程序入口：初始化日志、读取事件、处理并输出结果。
///
/// 异常处理：
/// - 事件读取/解析失败不会使进程失败，而是输出 `{ "error": "Handler error: ..." }`
/// - 仅结果序列化或写 stdout 失败时返回错误
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("任务处理程序启动");
    info!("网络存储: {}", args.network_volume.display());
    if !args.network_volume.exists() {
        warn!("网络存储不存在: {}", args.network_volume.display());
    }

    let config = HandlerConfig {
        models_root: args.network_volume.join("models"),
        output_dir: args
            .output_dir
            .clone()
            .unwrap_or_else(|| args.network_volume.join("ComfyUI").join("output")),
    };
    let handler = Handler::new(
        ComfyClient::new(&args.comfy_url, Duration::from_secs(args.timeout_secs))?,
        HttpNotifier::new(),
        config,
    );

    let reply = match read_event(args.event.as_deref()) {
        Ok(event) => handler.handle(event).await,
        Err(e) => {
            warn!("事件处理失败: {e:#}");
            JobReply::error(format!("Handler error: {e:#}"))
        }
    };

    let out = serde_json::to_string(&reply).context("序列化处理结果失败")?;
    println!("{out}");
    Ok(())
}

/// 读取并解析任务事件。
///
/// 异常处理：
/// - 文件/stdin 读取失败或 JSON 解析失败返回错误
fn read_event(path: Option<&std::path::Path>) -> Result<JobEvent> {
    let raw = match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("读取事件失败: {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("读取 stdin 失败")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("解析事件 JSON 失败")
}
