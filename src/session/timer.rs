//! 考试倒计时
//!
//! [`Countdown`] 是纯状态，[`start_timer`] 用 tokio interval 每秒驱动一次

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 听力音频结束后的答题缓冲时间
pub const LISTENING_BUFFER_SECS: u64 = 600;
/// 阅读固定时长
pub const READING_DURATION_SECS: u64 = 3600;
/// 写作固定时长
pub const WRITING_DURATION_SECS: u64 = 3600;
/// 拿不到音频时长时，每个 Part 的估算时长
const FALLBACK_SECS_PER_PART: u64 = 600;
/// 估算时至少按 4 个 Part 计算
const MIN_FALLBACK_PARTS: usize = 4;

/// 计时器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub time_remaining_seconds: u64,
    pub is_time_up: bool,
    pub total_duration_seconds: u64,
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// 本次 tick 到时，只会出现一次
    Expired,
    AlreadyExpired,
}

/// 倒计时
#[derive(Debug, Clone)]
pub struct Countdown {
    state: TimerState,
    fired: bool,
}

impl Countdown {
    pub fn new(total_secs: u64) -> Self {
        Self {
            state: TimerState {
                time_remaining_seconds: total_secs,
                is_time_up: false,
                total_duration_seconds: total_secs,
            },
            fired: false,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// 走一秒
    pub fn tick(&mut self) -> TickOutcome {
        if self.fired {
            return TickOutcome::AlreadyExpired;
        }

        self.state.time_remaining_seconds = self.state.time_remaining_seconds.saturating_sub(1);
        if self.state.time_remaining_seconds == 0 {
            self.state.is_time_up = true;
            self.fired = true;
            TickOutcome::Expired
        } else {
            TickOutcome::Running
        }
    }
}

/// 听力总时长
///
/// 有音频时长时为 `ceil(音频) + 缓冲`，否则按 `max(Part 数, 4) × 10 分钟` 估算
pub fn listening_duration(audio_secs: f64, parts_count: usize, buffer_secs: u64) -> u64 {
    if audio_secs.is_finite() && audio_secs > 0.0 {
        audio_secs.ceil() as u64 + buffer_secs
    } else {
        parts_count.max(MIN_FALLBACK_PARTS) as u64 * FALLBACK_SECS_PER_PART
    }
}

/// 正在运行的计时器
///
/// 调用 [`TimerHandle::cancel`] 或 drop 时停止
pub struct TimerHandle {
    state: watch::Receiver<TimerState>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 启动倒计时，到时后调用一次 `on_expire`
pub fn start_timer<F, Fut>(total_secs: u64, on_expire: F) -> TimerHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut countdown = Countdown::new(total_secs);
    let (tx, rx) = watch::channel(countdown.state());

    info!("⏱️ 计时开始: {} 秒", total_secs);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // 第一次 tick 立即返回
        interval.tick().await;

        let mut on_expire = Some(on_expire);
        loop {
            interval.tick().await;
            let outcome = countdown.tick();
            tx.send_replace(countdown.state());

            match outcome {
                TickOutcome::Running => {}
                TickOutcome::Expired => {
                    info!("⏰ 时间到");
                    if let Some(callback) = on_expire.take() {
                        callback().await;
                    }
                    break;
                }
                TickOutcome::AlreadyExpired => break,
            }
        }
        debug!("计时任务结束");
    });

    TimerHandle { state: rx, task }
}

/// 听力：按音频总时长启动倒计时
pub fn start_timer_after_audio<F, Fut>(
    audio_secs: f64,
    parts_count: usize,
    buffer_secs: u64,
    on_expire: F,
) -> TimerHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let total = listening_duration(audio_secs, parts_count, buffer_secs);
    if audio_secs > 0.0 {
        info!("🎧 音频总时长 {:.1} 秒，另加 {} 秒答题时间", audio_secs, buffer_secs);
    } else {
        info!("🎧 无法获取音频时长，按 {} 个 Part 估算", parts_count.max(MIN_FALLBACK_PARTS));
    }
    start_timer(total, on_expire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_listening_duration() {
        assert_eq!(listening_duration(1800.0, 4, 600), 2400);
        assert_eq!(listening_duration(1799.2, 4, 600), 2400);
        assert_eq!(listening_duration(0.0, 2, 600), 2400);
        assert_eq!(listening_duration(0.0, 6, 600), 3600);
        assert_eq!(listening_duration(f64::NAN, 0, 600), 2400);
    }

    #[test]
    fn test_countdown_expires_exactly_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), TickOutcome::Running);
        assert_eq!(countdown.tick(), TickOutcome::Expired);
        assert!(countdown.state().is_time_up);
        for _ in 0..5 {
            assert_eq!(countdown.tick(), TickOutcome::AlreadyExpired);
        }
        assert_eq!(countdown.state().time_remaining_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_invokes_callback_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = start_timer(3, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state().time_remaining_seconds, 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handle.state().is_time_up);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = start_timer(2, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
