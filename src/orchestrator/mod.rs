//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `exam_runner` - 考试运行器
//! - 管理应用生命周期（初始化、运行、交卷）
//! - 按运行模式调度（检查 / 考试 / 预览）
//! - 管理计时器和自动保存任务
//!
//! ### `section_loader` - 整节加载器
//! - 并发加载一节的所有 Part（Semaphore）
//! - 按序号汇总结果和统计
//!
//! ## 层次关系
//!
//! ```text
//! exam_runner (一节考试)
//!     ↓
//! section_loader (Vec<Part>)
//!     ↓
//! workflow::PartFlow (单个 Part)
//!     ↓
//! services (能力层：解包 / 信封 / 转换 / 批改)
//!     ↓
//! infrastructure (基础设施：ExamApi)
//! ```

pub mod exam_runner;
pub mod section_loader;

pub use exam_runner::{App, RunSummary};
pub use section_loader::{LoadStats, LoadedSection, SectionLoader};
