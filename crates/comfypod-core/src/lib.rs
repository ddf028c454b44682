//! ComfyUI 镜像构建与运行核心库（与平台/网络无关）。
//!
//! 功能：
//! - 定义镜像构建清单（image-manifest.json）模型
//! - 插件依赖清单（requirements.txt）的发现与逐个安装（失败不阻塞）
//! - 构建状态落盘模型（build-state.json）
//! - 启动脚本渲染、模型目录布局、模型文件校验
//! - 无服务器任务（job）的请求/响应/回调数据模型与输出图片收集
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod discovery;
pub mod job;
pub mod launch;
pub mod layout;
pub mod manifest;
pub mod models;
pub mod outputs;
pub mod paths;
pub mod state;
pub mod sweep;
