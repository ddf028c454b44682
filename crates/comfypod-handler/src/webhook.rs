//! 任务状态回调（webhook）。
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::time::Duration;

use comfypod_core::job::WebhookPayload;
use tracing::{info, warn};

use crate::handler::Notifier;

/// 单次回调超时。
pub(crate) const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// 基于 HTTP POST 的回调发送方。
pub(crate) struct HttpNotifier {
    http: reqwest::Client,
}

impl HttpNotifier {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Notifier for HttpNotifier {
    async fn notify(&self, url: &str, payload: &WebhookPayload) {
        let res = self
            .http
            .post(url)
            .json(payload)
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await;
        match res {
            Ok(r) if r.status().is_success() => {
                info!("回调已发送: {:?} (job {})", payload.status, payload.job_id)
            }
            Ok(r) => warn!("回调返回异常状态: {} ({url})", r.status()),
            Err(e) => warn!("回调发送失败: {e}"),
        }
    }
}
