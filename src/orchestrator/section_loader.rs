//! 整节加载器 - 编排层
//!
//! ## 职责
//!
//! 1. **列出 Part**：获取本节所有 Part 元数据并按序号排序
//! 2. **并发加载**：使用 Semaphore 限制同时进行的请求数
//! 3. **保持顺序**：结果按序号返回，与完成先后无关
//! 4. **登录失效**：任何一个 Part 返回 401 时整体失败
//! 5. **统计**：汇总成功 / 空内容 / 失败数量

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::ExamApi;
use crate::models::meta::PartMeta;
use crate::models::question::{Part, WritingTask};
use crate::models::section::Section;
use crate::workflow::{PartCtx, PartFlow, PartOutcome};

/// 加载统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub total: usize,
    pub loaded: usize,
    pub empty: usize,
    pub failed: usize,
}

/// 一整节的内容
#[derive(Debug, Default, Clone)]
pub struct LoadedSection {
    pub parts: Vec<Part>,
    pub tasks: Vec<WritingTask>,
    pub stats: LoadStats,
}

impl LoadedSection {
    pub fn question_count(&self) -> usize {
        if self.tasks.is_empty() {
            self.parts.iter().map(|p| p.questions.len()).sum()
        } else {
            self.tasks.len()
        }
    }

    pub fn issue_count(&self) -> usize {
        self.parts.iter().map(|p| p.issues.len()).sum()
    }
}

/// 整节加载器
pub struct SectionLoader {
    flow: Arc<PartFlow>,
    max_concurrent: usize,
}

impl SectionLoader {
    pub fn new(flow: PartFlow, max_concurrent: usize) -> Self {
        Self {
            flow: Arc::new(flow),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 加载一整节
    pub async fn load(
        &self,
        api: Arc<dyn ExamApi>,
        section: Section,
        section_id: &str,
    ) -> AppResult<LoadedSection> {
        info!("\n📁 正在获取 {} 的 Part 列表...", section);
        let metas = order_parts(api.list_parts(section_id).await?);

        let mut loaded = LoadedSection {
            stats: LoadStats {
                total: metas.len(),
                ..Default::default()
            },
            ..Default::default()
        };
        if metas.is_empty() {
            warn!("⚠️ {} 没有任何 Part", section);
            return Ok(loaded);
        }
        info!("✓ 找到 {} 个 Part", metas.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(metas.len());

        for (ordinal, meta) in metas {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Other(format!("并发控制失效: {}", e)))?;

            let flow = self.flow.clone();
            let api = api.clone();
            let ctx = PartCtx::new(section, meta.id.clone(), ordinal);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = flow.run(api.as_ref(), &meta, &ctx).await;
                if let Err(e) = &result {
                    error!("{} ❌ 加载失败: {}", ctx, e);
                }
                result
            });
            handles.push((ordinal, handle));
        }

        let mut unauthorized: Option<AppError> = None;
        for (ordinal, handle) in handles {
            match handle.await {
                Ok(Ok(PartOutcome::Part(part))) => {
                    loaded.parts.push(part);
                    loaded.stats.loaded += 1;
                }
                Ok(Ok(PartOutcome::Task(task))) => {
                    loaded.tasks.push(task);
                    loaded.stats.loaded += 1;
                }
                Ok(Ok(PartOutcome::Empty)) => loaded.stats.empty += 1,
                Ok(Err(e)) => {
                    loaded.stats.failed += 1;
                    if e.is_unauthorized() && unauthorized.is_none() {
                        unauthorized = Some(e);
                    }
                }
                Err(e) => {
                    error!("[Part#{}] 任务执行失败: {}", ordinal, e);
                    loaded.stats.failed += 1;
                }
            }
        }

        if let Some(e) = unauthorized {
            return Err(e);
        }

        Ok(loaded)
    }
}

/// 按序号排序；缺失序号时使用列表位置（从1开始）
fn order_parts(metas: Vec<PartMeta>) -> Vec<(u32, PartMeta)> {
    let mut ordered: Vec<(u32, PartMeta)> = metas
        .into_iter()
        .enumerate()
        .map(|(index, meta)| (meta.ordinal.unwrap_or(index as u32 + 1), meta))
        .collect();
    ordered.sort_by_key(|(ordinal, _)| *ordinal);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_parts_uses_ordinal_then_position() {
        let mut second = PartMeta::new("b", 2);
        second.ordinal = None;
        let ordered = order_parts(vec![PartMeta::new("c", 3), second, PartMeta::new("a", 1)]);
        let ids: Vec<(u32, &str)> = ordered.iter().map(|(o, m)| (*o, m.id.as_str())).collect();
        assert_eq!(ids, vec![(1, "a"), (2, "b"), (3, "c")]);
    }
}
