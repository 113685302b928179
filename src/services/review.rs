//! 批改复核 - 业务能力层
//!
//! 展示后端计算好的正误，管理员人工改判后触发重新计分

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::infrastructure::ExamApi;
use crate::models::answer::{AnswerMap, CorrectnessMap, ReviewRow, ScoreSummary, SubmissionTarget};
use crate::models::section::Section;
use crate::services::scoring::band_score;

/// 改判结果
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// 与当前正误相同，没有发起任何请求
    Unchanged,
    /// 已改判并重新计分
    Recalculated(ScoreSummary),
}

/// 某次模考某一节的批改复核面板
///
/// 正误以后端为准，本地不做任何校验
pub struct ReviewBoard {
    api: Arc<dyn ExamApi>,
    target: SubmissionTarget,
    section: Section,
    rows: Vec<ReviewRow>,
    score: Option<ScoreSummary>,
    /// 已改判但重新计分尚未成功
    recalc_pending: bool,
}

impl ReviewBoard {
    /// 加载已提交答案及批改结果
    pub async fn load(
        api: Arc<dyn ExamApi>,
        target: SubmissionTarget,
        section: Section,
    ) -> AppResult<Self> {
        let mut rows = api.fetch_review(&target).await?;
        rows.sort_by_key(|row| row.question_ord);

        info!(
            "[{}] ✓ 已加载 {} 条作答记录 (模考 {}, 节 {})",
            section,
            rows.len(),
            target.mock_id,
            target.section_id
        );

        Ok(Self {
            api,
            target,
            section,
            rows,
            score: None,
            recalc_pending: false,
        })
    }

    pub fn rows(&self) -> &[ReviewRow] {
        &self.rows
    }

    pub fn section(&self) -> Section {
        self.section
    }

    /// 题号 → 正误
    pub fn correctness(&self) -> CorrectnessMap {
        self.rows
            .iter()
            .map(|row| (row.question_ord, row.is_correct))
            .collect()
    }

    /// 题号 → 已提交答案
    pub fn answers(&self) -> AnswerMap {
        self.rows
            .iter()
            .filter_map(|row| row.answer.clone().map(|a| (row.question_ord, a)))
            .collect()
    }

    /// 当前判为正确的题数
    pub fn correct_count(&self) -> u32 {
        self.rows
            .iter()
            .filter(|row| row.is_correct == Some(true))
            .count() as u32
    }

    /// 最近一次重新计分的结果
    pub fn score(&self) -> Option<&ScoreSummary> {
        self.score.as_ref()
    }

    /// 人工改判
    ///
    /// 正误发生变化时：一次改判请求 + 一次重新计分请求；
    /// 与当前值相同时不发请求，除非上次重新计分失败（此时只补发重新计分）
    pub async fn mark(&mut self, question_ord: u32, is_correct: bool) -> AppResult<MarkOutcome> {
        let current = self
            .rows
            .iter()
            .find(|row| row.question_ord == question_ord)
            .and_then(|row| row.is_correct);

        if current == Some(is_correct) && !self.recalc_pending {
            debug!(
                "[{}] 第 {} 题已是 {}，跳过改判",
                self.section, question_ord, is_correct
            );
            return Ok(MarkOutcome::Unchanged);
        }

        if current != Some(is_correct) {
            self.api
                .override_correctness(&self.target, question_ord, is_correct)
                .await?;
            self.set_local(question_ord, is_correct);
            self.recalc_pending = true;
        } else {
            info!("[{}] 🔄 补发重新计分 (第 {} 题)", self.section, question_ord);
        }

        let mut summary = self.api.recalculate_score(&self.target).await?;
        self.recalc_pending = false;
        if summary.band_score.is_none() {
            summary.band_score = band_score(self.section, summary.correct_count);
        }

        info!(
            "[{}] ✓ 第 {} 题改判为 {}，重新计分: {}/{} (band {:?})",
            self.section,
            question_ord,
            if is_correct { "正确" } else { "错误" },
            summary.correct_count,
            summary.total_questions,
            summary.band_score
        );

        self.score = Some(summary.clone());
        Ok(MarkOutcome::Recalculated(summary))
    }

    fn set_local(&mut self, question_ord: u32, is_correct: bool) {
        match self
            .rows
            .iter_mut()
            .find(|row| row.question_ord == question_ord)
        {
            Some(row) => row.is_correct = Some(is_correct),
            None => {
                self.rows.push(ReviewRow {
                    question_ord,
                    answer: None,
                    is_correct: Some(is_correct),
                    correct_answers: Vec::new(),
                });
                self.rows.sort_by_key(|row| row.question_ord);
            }
        }
    }
}
