//! # Quiz Pipeline
//!
//! 引导用户完成"上传 → 摘要 → 测验"三个阶段的客户端，
//! 所有内容分析都由远端推理后端完成，本地只负责编排请求和展示结果。
//!
//! ## 架构设计
//!
//! ### ① 接入层（Clients）
//! - `clients/` - 后端接口的唯一出口，每次调用恰好一个网络请求，从不重试
//! - `BackendClient` - 六个业务接口加健康检查
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 与阶段无关的纯能力
//! - `SingleFlight` - 相同请求在途时抑制重复调用
//! - `KeywordHighlighter` - 关键词高亮切分
//! - `upload_validator` - 上传前的本地校验
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 三阶段状态机和流程编排
//! - `PipelineState` - 阶段与会话记录，唯一的写入者
//! - `PipelineFlow` - 校验 → 单飞 → 请求 → 过期检查 → 写入
//!
//! ### ④ 应用层（App）
//! - `app` - 命令行驱动，读取输入、展示结果、从标准输入作答
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::{App, InputSource};
pub use clients::BackendClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::{highlight, Flight, KeywordHighlighter, Segment, SingleFlight};
pub use workflow::{PipelineFlow, PipelineState, Stage, StepOutcome};
