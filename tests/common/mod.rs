//! 集成测试共用的内存后端

#![allow(dead_code)]

use async_trait::async_trait;
use mock_exam_engine::config::Config;
use mock_exam_engine::error::{ApiError, AppResult};
use mock_exam_engine::infrastructure::ExamApi;
use mock_exam_engine::models::{
    AudioMeta, PartMeta, ReviewRow, ScoreSummary, SubmissionTarget, SubmittedAnswer,
};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// 记录所有调用的内存后端
#[derive(Default)]
pub struct FakeExamApi {
    parts: Mutex<Vec<PartMeta>>,
    contents: Mutex<HashMap<String, JsonValue>>,
    audio: Mutex<HashMap<String, f64>>,
    unauthorized_parts: Mutex<HashSet<String>>,
    review_rows: Mutex<Vec<ReviewRow>>,
    fail_submit: AtomicBool,
    fail_recalculations: AtomicUsize,
    pub submitted: Mutex<Vec<Vec<SubmittedAnswer>>>,
    pub writing: Mutex<Vec<(String, String)>>,
    pub overrides: Mutex<Vec<(u32, bool)>>,
    pub recalculations: AtomicUsize,
}

impl FakeExamApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(self, meta: PartMeta, content: JsonValue) -> Self {
        self.contents
            .lock()
            .unwrap()
            .insert(meta.id.clone(), content);
        self.parts.lock().unwrap().push(meta);
        self
    }

    pub fn with_audio(self, file_id: &str, seconds: f64) -> Self {
        self.audio
            .lock()
            .unwrap()
            .insert(file_id.to_string(), seconds);
        self
    }

    pub fn with_unauthorized_part(self, part_id: &str) -> Self {
        self.unauthorized_parts
            .lock()
            .unwrap()
            .insert(part_id.to_string());
        self
    }

    pub fn with_review(self, rows: Vec<ReviewRow>) -> Self {
        *self.review_rows.lock().unwrap() = rows;
        self
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// 接下来的 `times` 次重新计分返回服务器错误
    pub fn fail_next_recalculations(&self, times: usize) {
        self.fail_recalculations.store(times, Ordering::SeqCst);
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn writing_calls(&self) -> usize {
        self.writing.lock().unwrap().len()
    }

    pub fn override_calls(&self) -> usize {
        self.overrides.lock().unwrap().len()
    }

    pub fn recalculate_calls(&self) -> usize {
        self.recalculations.load(Ordering::SeqCst)
    }

    fn check_submit(&self, endpoint: &str) -> AppResult<()> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                code: Some(500),
                message: Some("服务器错误".to_string()),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl ExamApi for FakeExamApi {
    async fn list_parts(&self, _section_id: &str) -> AppResult<Vec<PartMeta>> {
        Ok(self.parts.lock().unwrap().clone())
    }

    async fn fetch_part_content(&self, part_id: &str) -> AppResult<JsonValue> {
        let endpoint = format!("/api/parts/{}/content", part_id);
        if self.unauthorized_parts.lock().unwrap().contains(part_id) {
            return Err(ApiError::Unauthorized { endpoint }.into());
        }
        self.contents
            .lock()
            .unwrap()
            .get(part_id)
            .cloned()
            .ok_or_else(|| ApiError::EmptyResponse { endpoint }.into())
    }

    async fn fetch_audio_meta(&self, file_id: &str) -> AppResult<AudioMeta> {
        self.audio
            .lock()
            .unwrap()
            .get(file_id)
            .map(|secs| AudioMeta {
                duration_seconds: *secs,
            })
            .ok_or_else(|| {
                ApiError::EmptyResponse {
                    endpoint: format!("/api/files/{}/metadata", file_id),
                }
                .into()
            })
    }

    async fn submit_answers(
        &self,
        _target: &SubmissionTarget,
        answers: &[SubmittedAnswer],
    ) -> AppResult<()> {
        self.check_submit("answers")?;
        self.submitted.lock().unwrap().push(answers.to_vec());
        Ok(())
    }

    async fn submit_writing(
        &self,
        _target: &SubmissionTarget,
        task_id: &str,
        text: &str,
    ) -> AppResult<()> {
        self.check_submit("writing")?;
        self.writing
            .lock()
            .unwrap()
            .push((task_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn fetch_review(&self, _target: &SubmissionTarget) -> AppResult<Vec<ReviewRow>> {
        Ok(self.review_rows.lock().unwrap().clone())
    }

    async fn override_correctness(
        &self,
        _target: &SubmissionTarget,
        question_ord: u32,
        is_correct: bool,
    ) -> AppResult<()> {
        self.overrides
            .lock()
            .unwrap()
            .push((question_ord, is_correct));
        let mut rows = self.review_rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.question_ord == question_ord) {
            row.is_correct = Some(is_correct);
        }
        Ok(())
    }

    async fn recalculate_score(&self, _target: &SubmissionTarget) -> AppResult<ScoreSummary> {
        self.recalculations.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .fail_recalculations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ApiError::BadResponse {
                endpoint: "recalculate".to_string(),
                code: Some(500),
                message: Some("服务器错误".to_string()),
            }
            .into());
        }
        let rows = self.review_rows.lock().unwrap();
        Ok(ScoreSummary {
            correct_count: rows.iter().filter(|r| r.is_correct == Some(true)).count() as u32,
            total_questions: rows.len() as u32,
            band_score: None,
        })
    }
}

/// 测试用配置：不写任何文件
pub fn test_config() -> Config {
    Config {
        api_base_url: "https://api.example.com".to_string(),
        issue_file: None,
        section_id: "section-1".to_string(),
        mock_id: Some("mock-1".to_string()),
        ..Config::default()
    }
}

/// 把 JSON 值编码成字符串 `times` 次
pub fn stringify_times(value: &JsonValue, times: usize) -> JsonValue {
    let mut current = value.clone();
    for _ in 0..times {
        current = JsonValue::String(serde_json::to_string(&current).unwrap());
    }
    current
}
