//! Part 处理流程 - 流程层
//!
//! 核心职责：定义"一个 Part"的完整加载流程
//!
//! 流程顺序：
//! 1. 获取原始内容
//! 2. 多层解包 → 信封拆分 → 选择视图
//! 3. 转换为题目 / 写作任务
//! 4. content_issues.txt（记录数据问题）

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::ExamApi;
use crate::models::meta::PartMeta;
use crate::models::question::{Part, WritingTask};
use crate::models::section::Section;
use crate::services::envelope::{load_tagged, ContentView};
use crate::services::{ContentTransformer, IssueWriter, MediaResolver};
use crate::workflow::part_ctx::PartCtx;

/// Part 加载结果
#[derive(Debug, Clone, PartialEq)]
pub enum PartOutcome {
    /// 听力 / 阅读 Part
    Part(Part),
    /// 写作任务
    Task(WritingTask),
    /// 没有可用内容（不是致命错误）
    Empty,
}

/// Part 处理流程
///
/// - 编排单个 Part 的加载流程
/// - 不持有会话状态
/// - 只依赖业务能力（services）和后端能力（infrastructure）
pub struct PartFlow {
    transformer: ContentTransformer,
    issue_writer: Option<IssueWriter>,
    view: ContentView,
    max_depth: usize,
    verbose_logging: bool,
}

impl PartFlow {
    /// 创建新的 Part 处理流程
    pub fn new(config: &Config) -> AppResult<Self> {
        let media = MediaResolver::new(&config.api_base_url)?;
        Ok(Self {
            transformer: ContentTransformer::new(media),
            issue_writer: config.issue_file.as_deref().map(IssueWriter::with_path),
            view: if config.admin_view {
                ContentView::Admin
            } else {
                ContentView::User
            },
            max_depth: config.unwrap_max_depth,
            verbose_logging: config.verbose_logging,
        })
    }

    pub fn view(&self) -> ContentView {
        self.view
    }

    pub async fn run(
        &self,
        api: &dyn ExamApi,
        meta: &PartMeta,
        ctx: &PartCtx,
    ) -> AppResult<PartOutcome> {
        debug!("{} 📥 获取内容...", ctx);
        let raw = api.fetch_part_content(&meta.id).await?;

        let tagged = match load_tagged(raw, self.view, self.max_depth) {
            Ok(tagged) => tagged,
            Err(e) => {
                warn!("{} ⚠️ 内容不可用，按空 Part 处理: {}", ctx, e);
                return Ok(PartOutcome::Empty);
            }
        };

        if self.view == ContentView::Admin && !tagged.is_admin() {
            warn!("{} ⚠️ 没有 admin 内容，使用考生视图（不含答案）", ctx);
        }

        let content = tagged.content();
        if ctx.section == Section::Writing {
            let task = self
                .transformer
                .transform_writing_task(content, ctx.ordinal, meta);
            info!("{} ✓ 写作任务加载完成 (最少 {} 词)", ctx, task.min_words);
            return Ok(PartOutcome::Task(task));
        }

        let part = self.transformer.transform_part(content, ctx.ordinal, meta);
        info!(
            "{} ✓ 加载完成: {} 题, 题号 {}",
            ctx,
            part.questions.len(),
            part.question_range
        );

        if !part.issues.is_empty() {
            warn!("{} ⚠️ 发现 {} 条题号数据问题", ctx, part.issues.len());
            if self.verbose_logging {
                for issue in &part.issues {
                    warn!("{}    - {}", ctx, issue);
                }
            }
            self.write_issues(ctx, &part).await;
        }

        Ok(PartOutcome::Part(part))
    }

    /// 写入数据问题，失败只记录日志
    async fn write_issues(&self, ctx: &PartCtx, part: &Part) {
        let Some(writer) = &self.issue_writer else {
            return;
        };
        if let Err(e) = writer.write(ctx, &part.issues).await {
            error!("{} ❌ 写入 {} 失败: {}", ctx, writer.path(), e);
        }
    }
}
