//! 无服务器任务（job）数据模型：事件输入、回调载荷与处理结果。
//!
//! 协议形态：
//! - 事件为 JSON：`{ "input": { "job_id", "user_id", "workflow", "params", "webhook_url" } }`
//! - 处理结果为 JSON：成功时为 [`JobOutput`]，失败时为 `{ "error": "<描述>" }`
//! - 回调（webhook）为 JSON POST，载荷见 [`WebhookPayload`]
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 任务事件（最外层）。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobEvent {
    #[serde(default)]
    pub input: Option<JobInput>,
}

/// 任务输入（字段均可缺省）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// ComfyUI 工作流（API 格式 JSON）。
    #[serde(default)]
    pub workflow: Value,
    #[serde(default)]
    pub params: JobParams,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// 生成参数。
///
/// 说明：
/// - 仅 `prompt`/`batch_size` 被处理流程使用，其余字段（宽高、步数等）原样保留并回传
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobParams {
    /// 非空提示词。
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.is_empty())
    }

    /// 兜底收集图片时的数量上限（默认 1）。
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(1)
    }
}

/// 补全默认值后的任务。
#[derive(Debug, Clone)]
pub struct ResolvedJob {
    pub job_id: String,
    pub user_id: String,
    pub workflow: Value,
    pub params: JobParams,
    pub webhook_url: Option<String>,
}

impl JobEvent {
    /// 补全默认值：`job_id` 缺省为随机 UUID，`user_id` 缺省为 `unknown`。
    pub fn resolve(self) -> ResolvedJob {
        let input = self.input.unwrap_or_default();
        ResolvedJob {
            job_id: input.job_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: input.user_id.unwrap_or_else(|| "unknown".to_string()),
            workflow: input.workflow,
            params: input.params,
            webhook_url: input.webhook_url.filter(|u| !u.is_empty()),
        }
    }
}

/// 判断工作流是否为空（null、空对象、空数组、空字符串、false、0 均视为空）。
pub fn is_empty_workflow(workflow: &Value) -> bool {
    match workflow {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// 任务状态（回调中使用）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

/// 成功结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// base64 编码的 PNG 图片。
    pub images: Vec<String>,
    pub job_id: String,
    pub prompt: String,
    pub image_count: usize,
    pub generation_params: JobParams,
}

/// 回调载荷。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub job_id: String,
    pub status: JobStatus,
    /// Unix 秒。
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 处理结果（直接序列化为返回给调度方的 JSON）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobReply {
    Output(JobOutput),
    Error { error: String },
}

impl JobReply {
    pub fn error(message: impl Into<String>) -> Self {
        JobReply::Error {
            error: message.into(),
        }
    }
}
