//! 文生图任务处理流程。
//!
//! 处理步骤：
//! 1) 补全输入默认值，校验工作流与提示词
//! 2) 回调 IN_PROGRESS
//! 3) 检查 ComfyUI 就绪、网络存储中的模型文件齐全
//! 4) 提交工作流并等待执行完成
//! 5) 收集输出图片并编码为 base64，回调 COMPLETED
//!
//! 任一步骤失败都会回调 FAILED 并返回 `{ "error": ... }`，不会中断进程。
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::PathBuf;

use anyhow::Result;
use comfypod_core::job::{
    is_empty_workflow, JobEvent, JobOutput, JobReply, JobStatus, WebhookPayload,
};
use comfypod_core::{models, outputs};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};

/// 工作流执行后端（真实实现为 ComfyUI HTTP API）。
pub(crate) trait WorkflowBackend {
    /// 后端是否可用。
    async fn ready(&self) -> bool;

    /// 执行工作流，返回执行记录。
    async fn execute(&self, workflow: &Value, job_id: &str) -> Result<Value>;
}

/// 状态回调发送方。失败只记录日志，不向上返回。
pub(crate) trait Notifier {
    async fn notify(&self, url: &str, payload: &WebhookPayload);
}

/// 处理器配置。
#[derive(Debug, Clone)]
pub(crate) struct HandlerConfig {
    /// 网络存储中的模型根目录。
    pub models_root: PathBuf,
    /// ComfyUI 输出目录。
    pub output_dir: PathBuf,
}

pub(crate) struct Handler<B, N> {
    backend: B,
    notifier: N,
    config: HandlerConfig,
}

impl<B: WorkflowBackend, N: Notifier> Handler<B, N> {
    pub fn new(backend: B, notifier: N, config: HandlerConfig) -> Self {
        Self {
            backend,
            notifier,
            config,
        }
    }

    async fn send_webhook(
        &self,
        url: Option<&str>,
        job_id: &str,
        status: JobStatus,
        output: Option<JobOutput>,
        error: Option<String>,
    ) {
        let Some(url) = url else {
            return;
        };
        let payload = WebhookPayload {
            job_id: job_id.to_string(),
            status,
            timestamp: OffsetDateTime::now_utc().unix_timestamp(),
            output,
            error,
        };
        self.notifier.notify(url, &payload).await;
    }

    async fn fail(&self, url: Option<&str>, job_id: &str, message: String) -> JobReply {
        warn!("任务失败: {job_id}: {message}");
        self.send_webhook(url, job_id, JobStatus::Failed, None, Some(message.clone()))
            .await;
        JobReply::error(message)
    }

    /// 处理单个任务事件。
    pub async fn handle(&self, event: JobEvent) -> JobReply {
        let job = event.resolve();
        let url = job.webhook_url.as_deref();
        info!("处理任务: {} (user: {})", job.job_id, job.user_id);

        if is_empty_workflow(&job.workflow) {
            return self
                .fail(url, &job.job_id, "Missing workflow in input".to_string())
                .await;
        }
        let Some(prompt) = job.params.prompt().map(str::to_string) else {
            return self
                .fail(url, &job.job_id, "Missing prompt in params".to_string())
                .await;
        };

        self.send_webhook(url, &job.job_id, JobStatus::InProgress, None, None)
            .await;

        if !self.backend.ready().await {
            return self
                .fail(url, &job.job_id, "Failed to initialize ComfyUI".to_string())
                .await;
        }

        let missing = models::missing_models(&self.config.models_root);
        if !missing.is_empty() {
            for m in &missing {
                warn!("缺少模型: {}: {}", m.kind, m.path.display());
            }
            return self
                .fail(
                    url,
                    &job.job_id,
                    "Required models not found in network volume".to_string(),
                )
                .await;
        }

        let preview: String = prompt.chars().take(100).collect();
        info!("开始生成: {preview}");

        if let Err(e) = self.backend.execute(&job.workflow, &job.job_id).await {
            return self
                .fail(url, &job.job_id, format!("Workflow execution failed: {e}"))
                .await;
        }

        let files = outputs::find_job_images(
            &self.config.output_dir,
            &job.job_id,
            job.params.batch_size(),
        );
        if files.is_empty() {
            return self
                .fail(url, &job.job_id, "No images generated".to_string())
                .await;
        }
        info!("找到生成图片 {} 张", files.len());

        let images = outputs::encode_images(&files);
        let output = JobOutput {
            image_count: images.len(),
            images,
            job_id: job.job_id.clone(),
            prompt,
            generation_params: job.params.clone(),
        };
        self.send_webhook(
            url,
            &job.job_id,
            JobStatus::Completed,
            Some(output.clone()),
            None,
        )
        .await;
        info!("任务完成: {}，共 {} 张", job.job_id, output.image_count);
        JobReply::Output(output)
    }
}
