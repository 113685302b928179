//! 音频时长预加载
//!
//! 并发获取所有 Part 的音频元数据，单个失败按 0 秒处理

use futures::future::join_all;
use tracing::{info, warn};

use crate::infrastructure::ExamApi;
use crate::models::question::Part;

/// 预加载结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreloadReport {
    /// 与有音频的 Part 一一对应的时长（秒）
    pub durations: Vec<f64>,
    /// 获取失败的数量
    pub failures: usize,
}

impl PreloadReport {
    pub fn total_seconds(&self) -> f64 {
        self.durations.iter().sum()
    }
}

/// 获取所有 Part 的音频时长
///
/// 不会因为个别音频失败而整体失败
pub async fn preload_durations(api: &dyn ExamApi, parts: &[Part]) -> PreloadReport {
    let file_ids: Vec<&str> = parts.iter().filter_map(|p| p.audio_file_id()).collect();
    if file_ids.is_empty() {
        warn!("🎧 没有任何 Part 带音频");
        return PreloadReport::default();
    }

    let results = join_all(file_ids.iter().map(|id| api.fetch_audio_meta(id))).await;

    let mut report = PreloadReport::default();
    for (file_id, result) in file_ids.iter().zip(results) {
        match result {
            Ok(meta) if meta.duration_seconds.is_finite() && meta.duration_seconds > 0.0 => {
                report.durations.push(meta.duration_seconds);
            }
            Ok(meta) => {
                warn!("🎧 音频 {} 时长无效 ({})，按 0 秒处理", file_id, meta.duration_seconds);
                report.durations.push(0.0);
                report.failures += 1;
            }
            Err(e) => {
                warn!("🎧 音频 {} 元数据获取失败，按 0 秒处理: {}", file_id, e);
                report.durations.push(0.0);
                report.failures += 1;
            }
        }
    }

    info!(
        "🎧 音频预加载完成: {} 个, 共 {:.1} 秒, 失败 {}",
        report.durations.len(),
        report.total_seconds(),
        report.failures
    );
    report
}
