//! # Mock Exam Engine
//!
//! 雅思模考客户端的非界面核心：题目内容归一化与考试会话引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有唯一的 HTTP 客户端，只暴露后端能力
//! - `ExamApi` - 后端能力 trait，测试中用内存实现替换
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个 Part
//! - `json_unwrap` - 多层 JSON 解包
//! - `envelope` - `{admin, user}` 信封拆分
//! - `ContentTransformer` - 题组展开与题号计算
//! - `MediaResolver` - 图片 / 音频地址归一化
//! - `ReviewBoard` - 批改复核与重新计分
//! - `IssueWriter` - 写 content_issues.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个 Part"的完整加载流程
//! - `PartCtx` - 上下文封装（section + part ordinal）
//! - `PartFlow` - 流程编排（fetch → unwrap → envelope → transform）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/section_loader` - 整节并发加载
//! - `orchestrator/exam_runner` - 一节考试的生命周期
//!
//! 会话状态（`session/`）由编排层显式创建和传递，没有全局单例
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, RunMode};
pub use error::{AppError, AppResult};
pub use infrastructure::{ExamApi, HttpExamApi};
pub use models::question::{Part, Question, WritingTask};
pub use models::Section;
pub use orchestrator::{App, RunSummary, SectionLoader};
pub use session::{ExamSession, SharedSession};
pub use workflow::{PartCtx, PartFlow, PartOutcome};
