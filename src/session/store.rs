//! 考试会话状态
//!
//! 每一节考试一个 [`ExamSession`]，由调用方显式持有并传递；
//! 所有修改都经过 [`ExamSession::apply`]

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{AppResult, SessionError};
use crate::infrastructure::ExamApi;
use crate::models::answer::{
    AnswerMap, AnswerValue, CorrectnessMap, ReviewRow, SubmissionTarget, SubmittedAnswer,
};
use crate::models::question::{Part, WritingTask};
use crate::models::section::Section;

/// 在计时器、自动保存和调用方之间共享的会话
pub type SharedSession = Arc<Mutex<ExamSession>>;

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    Loading,
    Ready,
    InProgress,
    Submitting,
    Submitted,
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Loading => "Loading",
            SessionPhase::Ready => "Ready",
            SessionPhase::InProgress => "InProgress",
            SessionPhase::Submitting => "Submitting",
            SessionPhase::Submitted => "Submitted",
        };
        f.write_str(name)
    }
}

/// 会话动作
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    BeginLoading,
    SetParts(Vec<Part>),
    SetTasks(Vec<WritingTask>),
    Start,
    /// 写作的 `question_id` 为任务序号
    SetAnswer {
        question_id: u32,
        value: AnswerValue,
    },
    ClearAnswer {
        question_id: u32,
    },
    BeginSubmit,
    SubmitSucceeded,
    SubmitFailed,
    LoadReview(Vec<ReviewRow>),
    EnterPreview,
    ExitPreview,
    Reset,
}

impl SessionAction {
    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::BeginLoading => "begin_loading",
            SessionAction::SetParts(_) => "set_parts",
            SessionAction::SetTasks(_) => "set_tasks",
            SessionAction::Start => "start",
            SessionAction::SetAnswer { .. } => "set_answer",
            SessionAction::ClearAnswer { .. } => "clear_answer",
            SessionAction::BeginSubmit => "begin_submit",
            SessionAction::SubmitSucceeded => "submit_succeeded",
            SessionAction::SubmitFailed => "submit_failed",
            SessionAction::LoadReview(_) => "load_review",
            SessionAction::EnterPreview => "enter_preview",
            SessionAction::ExitPreview => "exit_preview",
            SessionAction::Reset => "reset",
        }
    }

    /// 预览模式下是否允许
    fn allowed_in_preview(&self) -> bool {
        matches!(
            self,
            SessionAction::BeginLoading
                | SessionAction::SetParts(_)
                | SessionAction::SetTasks(_)
                | SessionAction::LoadReview(_)
                | SessionAction::EnterPreview
                | SessionAction::ExitPreview
                | SessionAction::Reset
        )
    }
}

/// 一节考试的会话状态
#[derive(Debug, Clone)]
pub struct ExamSession {
    section: Section,
    phase: SessionPhase,
    preview: bool,
    parts: Vec<Part>,
    tasks: Vec<WritingTask>,
    answers: AnswerMap,
    correctness: CorrectnessMap,
}

impl ExamSession {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            phase: SessionPhase::Idle,
            preview: false,
            parts: Vec::new(),
            tasks: Vec::new(),
            answers: AnswerMap::new(),
            correctness: CorrectnessMap::new(),
        }
    }

    /// 包装为共享会话
    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// 执行一个动作
    pub fn apply(&mut self, action: SessionAction) -> Result<(), SessionError> {
        if self.preview && !action.allowed_in_preview() {
            return Err(SessionError::PreviewReadOnly {
                action: action.name(),
            });
        }

        let name = action.name();
        match action {
            SessionAction::BeginLoading => {
                self.require(&[SessionPhase::Idle, SessionPhase::Ready], name)?;
                self.phase = SessionPhase::Loading;
            }
            SessionAction::SetParts(parts) => {
                self.require(
                    &[SessionPhase::Idle, SessionPhase::Loading, SessionPhase::Ready],
                    name,
                )?;
                self.parts = parts;
                self.tasks.clear();
                self.answers.clear();
                self.correctness.clear();
                self.phase = SessionPhase::Ready;
            }
            SessionAction::SetTasks(tasks) => {
                self.require(
                    &[SessionPhase::Idle, SessionPhase::Loading, SessionPhase::Ready],
                    name,
                )?;
                self.tasks = tasks;
                self.parts.clear();
                self.answers.clear();
                self.correctness.clear();
                self.phase = SessionPhase::Ready;
            }
            SessionAction::Start => {
                self.require(&[SessionPhase::Ready], name)?;
                self.phase = SessionPhase::InProgress;
            }
            SessionAction::SetAnswer { question_id, value } => {
                self.require_answerable(name)?;
                self.answers.insert(question_id, value);
            }
            SessionAction::ClearAnswer { question_id } => {
                self.require_answerable(name)?;
                self.answers.remove(&question_id);
            }
            SessionAction::BeginSubmit => {
                if self.phase == SessionPhase::Submitted {
                    return Err(SessionError::AlreadySubmitted);
                }
                self.require(&[SessionPhase::Ready, SessionPhase::InProgress], name)?;
                self.phase = SessionPhase::Submitting;
            }
            SessionAction::SubmitSucceeded => {
                self.require(&[SessionPhase::Submitting], name)?;
                self.phase = SessionPhase::Submitted;
            }
            SessionAction::SubmitFailed => {
                self.require(&[SessionPhase::Submitting], name)?;
                self.phase = SessionPhase::InProgress;
            }
            SessionAction::LoadReview(rows) => {
                if !self.preview {
                    return Err(SessionError::NotInPreview);
                }
                self.answers = rows
                    .iter()
                    .filter_map(|row| row.answer.clone().map(|a| (row.question_ord, a)))
                    .collect();
                self.correctness = rows
                    .iter()
                    .map(|row| (row.question_ord, row.is_correct))
                    .collect();
            }
            SessionAction::EnterPreview => self.preview = true,
            SessionAction::ExitPreview => self.preview = false,
            SessionAction::Reset => self.clear(),
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.phase = SessionPhase::Idle;
        self.preview = false;
        self.parts.clear();
        self.tasks.clear();
        self.answers.clear();
        self.correctness.clear();
    }

    fn require(&self, allowed: &[SessionPhase], action: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.phase.to_string(),
                action,
            })
        }
    }

    fn require_answerable(&self, action: &'static str) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        self.require(&[SessionPhase::Ready, SessionPhase::InProgress], action)
    }

    // ========== 常用动作 ==========

    pub fn begin_loading(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::BeginLoading)
    }

    pub fn set_parts(&mut self, parts: Vec<Part>) -> Result<(), SessionError> {
        self.apply(SessionAction::SetParts(parts))
    }

    pub fn set_tasks(&mut self, tasks: Vec<WritingTask>) -> Result<(), SessionError> {
        self.apply(SessionAction::SetTasks(tasks))
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::Start)
    }

    /// 记录答案（不校验答案格式）
    pub fn set_answer(
        &mut self,
        question_id: u32,
        value: impl Into<AnswerValue>,
    ) -> Result<(), SessionError> {
        self.apply(SessionAction::SetAnswer {
            question_id,
            value: value.into(),
        })
    }

    pub fn clear_answer(&mut self, question_id: u32) -> Result<(), SessionError> {
        self.apply(SessionAction::ClearAnswer { question_id })
    }

    pub fn enter_preview(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::EnterPreview)
    }

    pub fn exit_preview(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::ExitPreview)
    }

    /// 回到初始状态，科目保持不变
    pub fn reset(&mut self) {
        self.clear();
    }

    /// 预览模式下加载已提交答案和后端批改结果（正误原样保存）
    pub fn load_submitted_answers_with_correctness(
        &mut self,
        rows: Vec<ReviewRow>,
    ) -> Result<(), SessionError> {
        self.apply(SessionAction::LoadReview(rows))
    }

    // ========== 查询 ==========

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn tasks(&self) -> &[WritingTask] {
        &self.tasks
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn correctness(&self) -> &CorrectnessMap {
        &self.correctness
    }

    pub fn get_answer(&self, question_id: u32) -> Option<&AnswerValue> {
        self.answers.get(&question_id)
    }

    /// 全部题号（写作为任务序号）
    pub fn question_ids(&self) -> BTreeSet<u32> {
        if self.section.is_numbered() {
            self.parts
                .iter()
                .flat_map(|p| p.questions.iter().map(|q| q.id))
                .collect()
        } else {
            self.tasks.iter().map(|t| t.ordinal).collect()
        }
    }

    /// 已作答题数（空答案不计）
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_empty()).count()
    }

    /// 尚未作答的题号
    pub fn unanswered(&self) -> Vec<u32> {
        self.question_ids()
            .into_iter()
            .filter(|id| self.answers.get(id).map_or(true, |a| a.is_empty()))
            .collect()
    }

    /// 待提交的听力 / 阅读答案
    pub fn submitted_answers(&self) -> Vec<SubmittedAnswer> {
        self.answers
            .iter()
            .filter(|(_, answer)| !answer.is_empty())
            .map(|(ord, answer)| SubmittedAnswer {
                question_ord: *ord,
                answer: answer.clone(),
            })
            .collect()
    }

    /// 写作草稿快照：(任务 ID, 正文)
    pub fn writing_snapshot(&self) -> Vec<(String, String)> {
        self.tasks
            .iter()
            .map(|task| {
                let text = self
                    .answers
                    .get(&task.ordinal)
                    .map(AnswerValue::as_text)
                    .unwrap_or_default();
                (task.id.clone(), text)
            })
            .collect()
    }

    // ========== 提交 ==========

    /// 交卷
    ///
    /// 听力 / 阅读一次性提交全部答案；写作逐个任务保存。
    /// 失败时回到 `InProgress`，答案保留，错误返回给调用方
    pub async fn finish_section(
        &mut self,
        api: &dyn ExamApi,
        target: &SubmissionTarget,
    ) -> AppResult<()> {
        self.apply(SessionAction::BeginSubmit)?;
        info!(
            "[{}] 📤 正在提交 ({} 题已作答)...",
            self.section,
            self.answered_count()
        );

        match self.flush(api, target).await {
            Ok(()) => {
                self.apply(SessionAction::SubmitSucceeded)?;
                info!("[{}] ✓ 提交成功", self.section);
                Ok(())
            }
            Err(e) => {
                self.apply(SessionAction::SubmitFailed)?;
                error!("[{}] ❌ 提交失败，答案已保留: {}", self.section, e);
                Err(e)
            }
        }
    }

    async fn flush(&self, api: &dyn ExamApi, target: &SubmissionTarget) -> AppResult<()> {
        if self.section.is_numbered() {
            let answers = self.submitted_answers();
            if answers.is_empty() {
                warn!("[{}] ⚠️ 没有任何作答，提交空答卷", self.section);
            }
            return api.submit_answers(target, &answers).await;
        }

        for (task_id, text) in self.writing_snapshot() {
            api.submit_writing(target, &task_id, &text).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Question, QuestionRange, QuestionType};

    fn part(ids: std::ops::RangeInclusive<u32>) -> Part {
        let questions: Vec<Question> = ids
            .map(|id| Question {
                id,
                question_type: QuestionType::ShortAnswer,
                text: format!("q{}", id),
                options: None,
                image_url: None,
                correct_answer: None,
            })
            .collect();
        Part {
            id: "p1".to_string(),
            ordinal: 1,
            title: "Part 1".to_string(),
            instruction: String::new(),
            passage: None,
            audio: None,
            question_range: QuestionRange::from_ids(questions.iter().map(|q| q.id))
                .unwrap_or(QuestionRange::new(1, 1)),
            questions,
            issues: Vec::new(),
        }
    }

    fn in_progress() -> ExamSession {
        let mut session = ExamSession::new(Section::Listening);
        session.begin_loading().unwrap();
        session.set_parts(vec![part(1..=10)]).unwrap();
        session.start().unwrap();
        session
    }

    #[test]
    fn test_set_then_get_returns_exact_value() {
        let mut session = in_progress();
        session.set_answer(3, "  Smith ").unwrap();
        session
            .set_answer(5, vec!["A".to_string(), "C".to_string()])
            .unwrap();
        assert_eq!(session.get_answer(3), Some(&AnswerValue::from("  Smith ")));
        assert_eq!(
            session.get_answer(5),
            Some(&AnswerValue::Multi(vec!["A".to_string(), "C".to_string()]))
        );

        session.set_answer(3, "Jones").unwrap();
        assert_eq!(session.get_answer(3), Some(&AnswerValue::from("Jones")));
        assert_eq!(session.answered_count(), 2);
    }

    #[test]
    fn test_preview_rejects_mutation() {
        let mut session = in_progress();
        session.set_answer(1, "a").unwrap();
        session.enter_preview().unwrap();

        let err = session.set_answer(1, "b").unwrap_err();
        assert!(matches!(
            err,
            SessionError::PreviewReadOnly {
                action: "set_answer"
            }
        ));
        assert_eq!(session.get_answer(1), Some(&AnswerValue::from("a")));
        assert!(session.clear_answer(1).is_err());

        session.exit_preview().unwrap();
        session.set_answer(1, "b").unwrap();
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = ExamSession::new(Section::Reading);
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidTransition { action: "start", .. })
        ));
        assert!(session.set_answer(1, "x").is_err());
        assert!(session.apply(SessionAction::SubmitSucceeded).is_err());
    }

    #[test]
    fn test_set_parts_clears_answers() {
        let mut session = in_progress();
        session.set_answer(1, "a").unwrap();
        session.reset();
        session.set_parts(vec![part(1..=5)]).unwrap();
        assert!(session.answers().is_empty());
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.unanswered(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_submit_lifecycle_reducer() {
        let mut session = in_progress();
        session.apply(SessionAction::BeginSubmit).unwrap();
        assert_eq!(session.phase(), SessionPhase::Submitting);
        session.apply(SessionAction::SubmitFailed).unwrap();
        assert_eq!(session.phase(), SessionPhase::InProgress);

        session.apply(SessionAction::BeginSubmit).unwrap();
        session.apply(SessionAction::SubmitSucceeded).unwrap();
        assert!(matches!(
            session.apply(SessionAction::BeginSubmit),
            Err(SessionError::AlreadySubmitted)
        ));
        assert!(matches!(
            session.set_answer(1, "late"),
            Err(SessionError::AlreadySubmitted)
        ));
    }

    #[test]
    fn test_load_review_requires_preview_and_keeps_correctness() {
        let rows = vec![
            ReviewRow {
                question_ord: 1,
                answer: Some(AnswerValue::from("a")),
                is_correct: Some(true),
                correct_answers: vec!["a".to_string()],
            },
            ReviewRow {
                question_ord: 2,
                answer: None,
                // 后端判为正确，即使没有答案也原样保存
                is_correct: Some(true),
                correct_answers: vec![],
            },
            ReviewRow {
                question_ord: 3,
                answer: Some(AnswerValue::from("c")),
                is_correct: None,
                correct_answers: vec![],
            },
        ];

        let mut session = ExamSession::new(Section::Reading);
        assert!(matches!(
            session.load_submitted_answers_with_correctness(rows.clone()),
            Err(SessionError::NotInPreview)
        ));

        session.enter_preview().unwrap();
        session.load_submitted_answers_with_correctness(rows).unwrap();
        assert_eq!(session.correctness().get(&2), Some(&Some(true)));
        assert_eq!(session.correctness().get(&3), Some(&None));
        assert_eq!(session.get_answer(2), None);
        assert_eq!(session.answers().len(), 2);
    }

    #[test]
    fn test_writing_snapshot_uses_task_ordinals() {
        let mut session = ExamSession::new(Section::Writing);
        session
            .set_tasks(vec![
                WritingTask {
                    id: "w1".to_string(),
                    ordinal: 1,
                    title: "Task 1".to_string(),
                    prompt: String::new(),
                    image_url: None,
                    min_words: 150,
                },
                WritingTask {
                    id: "w2".to_string(),
                    ordinal: 2,
                    title: "Task 2".to_string(),
                    prompt: String::new(),
                    image_url: None,
                    min_words: 250,
                },
            ])
            .unwrap();
        session.start().unwrap();
        session.set_answer(2, "essay").unwrap();

        assert_eq!(
            session.writing_snapshot(),
            vec![
                ("w1".to_string(), String::new()),
                ("w2".to_string(), "essay".to_string())
            ]
        );
        assert_eq!(session.unanswered(), vec![1]);
    }
}
