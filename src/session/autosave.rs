//! 写作自动保存
//!
//! 定时把写作草稿保存到后端，失败只记录日志

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::infrastructure::ExamApi;
use crate::models::answer::SubmissionTarget;
use crate::session::store::{SessionPhase, SharedSession};

/// 默认保存间隔
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);

/// 自动保存任务，drop 时停止
pub struct AutoSaveHandle {
    task: JoinHandle<()>,
}

impl AutoSaveHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AutoSaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 保存一批草稿，返回成功保存的数量
///
/// 空草稿跳过
pub async fn save_drafts(
    api: &dyn ExamApi,
    target: &SubmissionTarget,
    drafts: &[(String, String)],
) -> usize {
    let mut saved = 0;
    for (task_id, text) in drafts {
        if text.trim().is_empty() {
            continue;
        }
        match api.submit_writing(target, task_id, text).await {
            Ok(()) => saved += 1,
            Err(e) => warn!("📝 写作任务 {} 自动保存失败: {}", task_id, e),
        }
    }
    saved
}

/// 启动自动保存
///
/// 只在 `InProgress` 阶段保存；会话提交后任务自行结束
pub fn spawn_autosave(
    session: SharedSession,
    api: Arc<dyn ExamApi>,
    target: SubmissionTarget,
    interval: Duration,
) -> AutoSaveHandle {
    info!("📝 写作自动保存已开启，间隔 {} 秒", interval.as_secs());

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let drafts = {
                let session = session.lock().await;
                match session.phase() {
                    SessionPhase::InProgress => session.writing_snapshot(),
                    SessionPhase::Submitted => break,
                    _ => continue,
                }
            };

            let saved = save_drafts(api.as_ref(), &target, &drafts).await;
            debug!("📝 自动保存 {}/{} 个写作任务", saved, drafts.len());
        }
        debug!("自动保存任务结束");
    });

    AutoSaveHandle { task }
}
