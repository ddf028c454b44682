//! 生成图片的收集与编码。
//!
//! 查找规则：
//! - 优先匹配文件名 `runpod_generation*<job_id>*.png`
//! - 无匹配时兜底：输出目录下全部 `*.png` 按修改时间倒序，取前 `batch_size` 张
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, warn};

/// 任务输出文件名前缀（由工作流中的 SaveImage 节点配置）。
pub const OUTPUT_PREFIX: &str = "runpod_generation";

fn png_files(output_dir: &Path) -> Vec<(PathBuf, String)> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        warn!("读取输出目录失败: {}", output_dir.display());
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.ends_with(".png").then(|| (e.path(), name))
        })
        .collect()
}

/// 查找某个任务生成的图片。
///
/// 参数：
/// - `output_dir`：ComfyUI 输出目录
/// - `job_id`：任务 ID
/// - `batch_size`：兜底模式下最多返回的图片数
pub fn find_job_images(output_dir: &Path, job_id: &str, batch_size: usize) -> Vec<PathBuf> {
    let files = png_files(output_dir);

    let mut matched: Vec<PathBuf> = files
        .iter()
        .filter(|(_, name)| {
            name.strip_prefix(OUTPUT_PREFIX)
                .and_then(|rest| rest.strip_suffix(".png"))
                .map(|middle| middle.contains(job_id))
                .unwrap_or(false)
        })
        .map(|(p, _)| p.clone())
        .collect();
    if !matched.is_empty() {
        matched.sort();
        return matched;
    }

    let mut all: Vec<(PathBuf, SystemTime)> = files
        .into_iter()
        .map(|(p, _)| {
            let mtime = std::fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (p, mtime)
        })
        .collect();
    all.sort_by(|a, b| b.1.cmp(&a.1));
    all.into_iter().take(batch_size).map(|(p, _)| p).collect()
}

/// 将图片逐个编码为 base64。
///
/// 异常处理：
/// - 单个文件读取失败记录告警并跳过
pub fn encode_images(paths: &[PathBuf]) -> Vec<String> {
    let mut encoded = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => {
                encoded.push(STANDARD.encode(bytes));
                info!("图片已编码: {}", path.display());
            }
            Err(e) => warn!("图片编码失败，跳过: {} ({e})", path.display()),
        }
    }
    encoded
}
