//! 操作系统能力封装（外部进程、可执行文件探测、启动脚本落盘）。
//!
//! 说明：
//! - `comfypod-core` 只描述“做什么”，本 crate 负责真正调用外部程序与写文件权限
//! - 目标平台为 Linux 容器；非 unix 平台下部分能力降级（见各模块说明）
//!
//! 作者：ComfyPod 项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod launcher;
pub mod prereq;
pub mod process;
