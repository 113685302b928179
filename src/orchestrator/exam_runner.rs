//! 考试运行器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一节考试的完整生命周期。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、后端客户端
//! 2. **整节加载**：委托 `SectionLoader` 并发加载所有 Part
//! 3. **会话管理**：创建 `ExamSession`，按模式进入考试或预览
//! 4. **计时**：听力按音频时长，阅读 / 写作按固定时长
//! 5. **交卷**：到时或 Ctrl-C 时只交卷一次
//! 6. **登录失效**：收到 401 时清空会话并退出

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::{Config, RunMode};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{ExamApi, HttpExamApi};
use crate::models::answer::{AnswerValue, SubmissionTarget};
use crate::models::section::Section;
use crate::orchestrator::section_loader::{LoadedSection, SectionLoader};
use crate::services::{band_score, ReviewBoard};
use crate::session::{
    preload_durations, spawn_autosave, start_timer, start_timer_after_audio, ExamSession,
    SharedSession, TimerHandle,
};
use crate::utils::logging::{init_log_file, log_section_loaded, log_startup, print_final_stats};
use crate::workflow::PartFlow;

/// 运行结果
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub parts: usize,
    pub questions: usize,
    pub answered: usize,
    pub issues: usize,
    pub submitted: bool,
    pub band_score: Option<f32>,
}

/// 应用主结构
pub struct App {
    config: Config,
    api: Arc<dyn ExamApi>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> AppResult<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let api: Arc<dyn ExamApi> = Arc::new(HttpExamApi::new(&config)?);
        Ok(Self { config, api })
    }

    /// 使用指定的后端能力创建（不写日志文件）
    pub fn with_api(config: Config, api: Arc<dyn ExamApi>) -> Self {
        Self { config, api }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<RunSummary> {
        let result = match self.config.mode {
            RunMode::Inspect => self.inspect().await,
            RunMode::Session => self.run_session().await,
            RunMode::Review => self.review().await,
        };

        match &result {
            Ok(summary) => print_final_stats(
                summary.answered,
                summary.questions,
                summary.submitted,
                &self.config.output_log_file,
            ),
            Err(e) if e.is_unauthorized() => error!("🔒 登录已失效，请重新登录后再试: {}", e),
            Err(e) => error!("❌ 运行失败: {}", e),
        }
        result
    }

    fn target(&self) -> AppResult<SubmissionTarget> {
        let mock_id = self
            .config
            .mock_id
            .clone()
            .ok_or_else(|| AppError::Other("缺少 mock_id，无法提交或查看批改".to_string()))?;
        Ok(SubmissionTarget::new(mock_id, self.config.section_id.clone()))
    }

    async fn load_section(&self) -> AppResult<LoadedSection> {
        let flow = PartFlow::new(&self.config)?;
        let loader = SectionLoader::new(flow, self.config.max_concurrent_requests);
        let loaded = loader
            .load(self.api.clone(), self.config.section, &self.config.section_id)
            .await?;

        log_section_loaded(
            loaded.stats.loaded,
            loaded.stats.total,
            loaded.question_count(),
        );
        if loaded.stats.empty > 0 || loaded.stats.failed > 0 {
            warn!(
                "⚠️ 空内容 {} 个, 失败 {} 个",
                loaded.stats.empty, loaded.stats.failed
            );
        }
        Ok(loaded)
    }

    /// 只加载并输出题目概况
    async fn inspect(&self) -> AppResult<RunSummary> {
        let loaded = self.load_section().await?;

        for part in &loaded.parts {
            info!(
                "[{}] {} | 题号 {} | {} 题 | 数据问题 {}",
                self.config.section,
                part.title,
                part.question_range,
                part.questions.len(),
                part.issues.len()
            );
        }
        for task in &loaded.tasks {
            info!(
                "[{}] {} | 最少 {} 词",
                self.config.section, task.title, task.min_words
            );
        }

        Ok(RunSummary {
            parts: loaded.parts.len() + loaded.tasks.len(),
            questions: loaded.question_count(),
            issues: loaded.issue_count(),
            ..Default::default()
        })
    }

    /// 预览：加载题目 + 已提交答案 + 后端批改结果
    async fn review(&self) -> AppResult<RunSummary> {
        let target = self.target()?;
        let loaded = self.load_section().await?;

        let board = ReviewBoard::load(self.api.clone(), target, self.config.section).await?;

        let mut session = ExamSession::new(self.config.section);
        session.enter_preview()?;
        session.begin_loading()?;
        set_content(&mut session, &loaded)?;
        session.load_submitted_answers_with_correctness(board.rows().to_vec())?;

        let correct = board.correct_count();
        let band = band_score(self.config.section, correct);
        info!(
            "[{}] 📋 答对 {}/{} (band {:?})",
            self.config.section,
            correct,
            loaded.question_count(),
            band
        );

        Ok(RunSummary {
            parts: loaded.parts.len() + loaded.tasks.len(),
            questions: loaded.question_count(),
            answered: session.answered_count(),
            issues: loaded.issue_count(),
            submitted: true,
            band_score: band,
        })
    }

    /// 考试：计时 → 作答 → 交卷
    async fn run_session(&self) -> AppResult<RunSummary> {
        let target = self.target()?;

        let mut session = ExamSession::new(self.config.section);
        session.begin_loading()?;
        let loaded = match self.load_section().await {
            Ok(loaded) => loaded,
            Err(e) => {
                session.reset();
                return Err(e);
            }
        };
        set_content(&mut session, &loaded)?;
        session.start()?;

        if let Some(path) = &self.config.answers_file {
            let answers = read_answers_file(path).await?;
            info!("📄 从 {} 读取 {} 条答案", path, answers.len());
            for (question_id, value) in answers {
                session.set_answer(question_id, value)?;
            }
        }

        let session = session.shared();
        let (expired_tx, expired_rx) = oneshot::channel::<()>();
        let _timer = self.start_section_timer(&loaded, expired_tx).await;

        let _autosave = (self.config.section == Section::Writing).then(|| {
            spawn_autosave(
                session.clone(),
                self.api.clone(),
                target.clone(),
                Duration::from_secs(self.config.autosave_interval_secs.max(1)),
            )
        });

        tokio::select! {
            _ = expired_rx => info!("⏰ 时间到，自动交卷"),
            _ = tokio::signal::ctrl_c() => info!("🛑 收到中断信号，提前交卷"),
        }

        self.finish(&session, &target).await?;

        let session = session.lock().await;
        Ok(RunSummary {
            parts: loaded.parts.len() + loaded.tasks.len(),
            questions: loaded.question_count(),
            answered: session.answered_count(),
            issues: loaded.issue_count(),
            submitted: true,
            band_score: None,
        })
    }

    async fn start_section_timer(
        &self,
        loaded: &LoadedSection,
        expired_tx: oneshot::Sender<()>,
    ) -> TimerHandle {
        let on_expire = move || async move {
            let _ = expired_tx.send(());
        };

        match self.config.fixed_duration_secs() {
            Some(total) => start_timer(total, on_expire),
            None => {
                let report = preload_durations(self.api.as_ref(), &loaded.parts).await;
                start_timer_after_audio(
                    report.total_seconds(),
                    loaded.parts.len(),
                    self.config.listening_buffer_secs,
                    on_expire,
                )
            }
        }
    }

    /// 交卷；登录失效时清空会话
    async fn finish(&self, session: &SharedSession, target: &SubmissionTarget) -> AppResult<()> {
        let mut session = session.lock().await;
        let unanswered = session.unanswered();
        if !unanswered.is_empty() {
            warn!("⚠️ 还有 {} 题未作答: {:?}", unanswered.len(), unanswered);
        }

        match session.finish_section(self.api.as_ref(), target).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unauthorized() => {
                session.reset();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

fn set_content(session: &mut ExamSession, loaded: &LoadedSection) -> AppResult<()> {
    if session.section() == Section::Writing {
        session.set_tasks(loaded.tasks.clone())?;
    } else {
        session.set_parts(loaded.parts.clone())?;
    }
    Ok(())
}

/// 读取 `{"1": "A", "2": ["B", "C"]}` 形式的答案文件
async fn read_answers_file(path: &str) -> AppResult<BTreeMap<u32, AnswerValue>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_failed(path, e))?;
    Ok(serde_json::from_str(&text)?)
}
