//! ComfyUI HTTP API 客户端。
//!
//! 协议：
//! - `GET  /system_stats`：就绪探测
//! - `POST /prompt`：提交工作流，返回 `prompt_id`
//! - `GET  /history/<prompt_id>`：执行完成后出现对应记录
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::handler::WorkflowBackend;

/// 单个 HTTP 请求的超时。
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// ComfyUI 客户端。
///
/// 说明：
/// - ComfyUI 与处理程序运行在同一容器内，不走系统代理
pub(crate) struct ComfyClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl ComfyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(1),
            timeout,
        })
    }

    async fn submit(&self, workflow: &Value, job_id: &str) -> Result<String> {
        let res = self
            .http
            .post(format!("{}/prompt", self.base_url))
            .json(&json!({ "prompt": workflow, "client_id": job_id }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("提交工作流失败")?;
        let status = res.status();
        let body: Value = res.json().await.context("解析 /prompt 响应失败")?;
        if !status.is_success() {
            return Err(anyhow!("ComfyUI 拒绝工作流 ({status}): {body}"));
        }
        body.get("prompt_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("/prompt 响应缺少 prompt_id: {body}"))
    }

    async fn history(&self, prompt_id: &str) -> Result<Option<Value>> {
        let body: Value = self
            .http
            .get(format!("{}/history/{prompt_id}", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("查询执行记录失败")?
            .json()
            .await
            .context("解析 /history 响应失败")?;
        Ok(body.get(prompt_id).cloned())
    }

    fn timed_out(&self) -> anyhow::Error {
        anyhow!("等待执行结果超时 ({} 秒)", self.timeout.as_secs())
    }
}

/// 从执行记录中提取失败原因；执行成功返回 `None`。
pub(crate) fn history_error(entry: &Value) -> Option<String> {
    let status = entry.get("status")?;
    if status.get("status_str").and_then(|s| s.as_str()) != Some("error") {
        return None;
    }
    let detail = status
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|msgs| {
            msgs.iter().find_map(|m| {
                let pair = m.as_array()?;
                if pair.first()?.as_str()? != "execution_error" {
                    return None;
                }
                pair.get(1)?
                    .get("exception_message")
                    .and_then(|e| e.as_str())
                    .map(str::to_string)
            })
        });
    Some(detail.unwrap_or_else(|| "execution error".to_string()))
}

impl WorkflowBackend for ComfyClient {
    async fn ready(&self) -> bool {
        match self
            .http
            .get(format!("{}/system_stats", self.base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(res) if res.status().is_success() => true,
            Ok(res) => {
                warn!("ComfyUI 未就绪: {}", res.status());
                false
            }
            Err(e) => {
                warn!("ComfyUI 未就绪: {e}");
                false
            }
        }
    }

    async fn execute(&self, workflow: &Value, job_id: &str) -> Result<Value> {
        let prompt_id = self.submit(workflow, job_id).await?;
        info!("工作流已提交: {job_id} -> {prompt_id}");

        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out());
            }
            // 单次查询也受总超时约束，避免一次挂起的请求越过截止时间。
            let entry = tokio::time::timeout(remaining, self.history(&prompt_id))
                .await
                .map_err(|_| self.timed_out())??;
            if let Some(entry) = entry {
                if let Some(reason) = history_error(&entry) {
                    return Err(anyhow!(reason));
                }
                return Ok(entry);
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}
