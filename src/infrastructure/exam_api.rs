//! 模考后端客户端 - 基础设施层
//!
//! 持有唯一的 HTTP 客户端，只暴露后端接口能力

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ConfigError};
use crate::models::answer::{ReviewRow, ScoreSummary, SubmissionTarget, SubmittedAnswer};
use crate::models::meta::{AudioMeta, PartMeta};
use crate::utils::logging::truncate_text;

/// 后端成功响应码
const SUCCESS_CODE: u64 = 200;

/// 模考后端能力
///
/// 职责：
/// - 只描述后端提供什么接口
/// - 不认识考试会话状态
/// - 测试中用内存实现替换
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// 列出某一节的所有 Part 元数据
    async fn list_parts(&self, section_id: &str) -> AppResult<Vec<PartMeta>>;

    /// 获取 Part 的原始内容（可能是多层编码的字符串）
    async fn fetch_part_content(&self, part_id: &str) -> AppResult<JsonValue>;

    /// 获取音频文件元数据
    async fn fetch_audio_meta(&self, file_id: &str) -> AppResult<AudioMeta>;

    /// 批量提交听力 / 阅读答案
    async fn submit_answers(
        &self,
        target: &SubmissionTarget,
        answers: &[SubmittedAnswer],
    ) -> AppResult<()>;

    /// 保存单个写作任务
    async fn submit_writing(
        &self,
        target: &SubmissionTarget,
        task_id: &str,
        text: &str,
    ) -> AppResult<()>;

    /// 获取已提交答案及后端批改结果
    async fn fetch_review(&self, target: &SubmissionTarget) -> AppResult<Vec<ReviewRow>>;

    /// 人工修改某题的正误
    async fn override_correctness(
        &self,
        target: &SubmissionTarget,
        question_ord: u32,
        is_correct: bool,
    ) -> AppResult<()>;

    /// 重新计分
    async fn recalculate_score(&self, target: &SubmissionTarget) -> AppResult<ScoreSummary>;
}

/// 基于 reqwest 的后端客户端
pub struct HttpExamApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpExamApi {
    /// 创建新的后端客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let parsed = Url::parse(&config.api_base_url).map_err(|source| {
            ConfigError::InvalidBaseUrl {
                value: config.api_base_url.clone(),
                source,
            }
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: config.api_token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// 发送请求并取出响应中的 `data`
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> AppResult<JsonValue> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized {
                endpoint: endpoint.to_string(),
            }
            .into());
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        debug!("{} {} → {} 字节", status.as_u16(), endpoint, text.len());

        parse_body(endpoint, status.as_u16(), &text)
    }

    async fn get(&self, endpoint: &str) -> AppResult<JsonValue> {
        self.send(self.client.get(self.url(endpoint)), endpoint).await
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: &JsonValue,
    ) -> AppResult<JsonValue> {
        let request = self.client.request(method, self.url(endpoint)).json(body);
        self.send(request, endpoint).await
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn list_parts(&self, section_id: &str) -> AppResult<Vec<PartMeta>> {
        let endpoint = format!("/api/sections/{}/parts", section_id);
        let data = self.get(&endpoint).await?;
        decode(&endpoint, data)
    }

    async fn fetch_part_content(&self, part_id: &str) -> AppResult<JsonValue> {
        let endpoint = format!("/api/parts/{}/content", part_id);
        let data = self.get(&endpoint).await?;
        Ok(content_field(data))
    }

    async fn fetch_audio_meta(&self, file_id: &str) -> AppResult<AudioMeta> {
        let endpoint = format!("/api/files/{}/metadata", file_id);
        let data = self.get(&endpoint).await?;
        decode(&endpoint, data)
    }

    async fn submit_answers(
        &self,
        target: &SubmissionTarget,
        answers: &[SubmittedAnswer],
    ) -> AppResult<()> {
        let endpoint = format!(
            "/api/mocks/{}/sections/{}/answers",
            target.mock_id, target.section_id
        );
        let body = json!({ "answers": answers });
        self.send_json(reqwest::Method::POST, &endpoint, &body).await?;
        Ok(())
    }

    async fn submit_writing(
        &self,
        target: &SubmissionTarget,
        task_id: &str,
        text: &str,
    ) -> AppResult<()> {
        let endpoint = format!(
            "/api/mocks/{}/sections/{}/writing/{}",
            target.mock_id, target.section_id, task_id
        );
        let body = json!({ "text": text });
        self.send_json(reqwest::Method::PUT, &endpoint, &body).await?;
        Ok(())
    }

    async fn fetch_review(&self, target: &SubmissionTarget) -> AppResult<Vec<ReviewRow>> {
        let endpoint = format!(
            "/api/mocks/{}/sections/{}/review",
            target.mock_id, target.section_id
        );
        let data = self.get(&endpoint).await?;
        decode(&endpoint, data)
    }

    async fn override_correctness(
        &self,
        target: &SubmissionTarget,
        question_ord: u32,
        is_correct: bool,
    ) -> AppResult<()> {
        let endpoint = format!(
            "/api/mocks/{}/sections/{}/answers/{}/correctness",
            target.mock_id, target.section_id, question_ord
        );
        let body = json!({ "isCorrect": is_correct });
        self.send_json(reqwest::Method::PUT, &endpoint, &body).await?;
        Ok(())
    }

    async fn recalculate_score(&self, target: &SubmissionTarget) -> AppResult<ScoreSummary> {
        let endpoint = format!(
            "/api/mocks/{}/sections/{}/recalculate",
            target.mock_id, target.section_id
        );
        let data = self
            .send_json(reqwest::Method::POST, &endpoint, &JsonValue::Null)
            .await?;
        decode(&endpoint, data)
    }
}

/// 解析响应体；非 2xx 且不是 JSON（网关的 HTML 错误页等）时按状态码报错
pub fn parse_body(endpoint: &str, status: u16, text: &str) -> AppResult<JsonValue> {
    if text.trim().is_empty() {
        return Ok(extract_data(endpoint, status, JsonValue::Null)?);
    }

    let body = match serde_json::from_str::<JsonValue>(text) {
        Ok(body) => body,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                code: Some(u64::from(status)),
                message: Some(truncate_text(text.trim(), 200)),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(extract_data(endpoint, status, body)?)
}

/// 检查 `{code, message, data}` 响应并取出 `data`
///
/// 没有 `code` 字段的响应按裸数据处理
pub fn extract_data(endpoint: &str, status: u16, body: JsonValue) -> Result<JsonValue, ApiError> {
    let code = body.get("code").and_then(|v| v.as_u64());
    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match code {
        Some(SUCCESS_CODE) => Ok(body.get("data").cloned().unwrap_or(JsonValue::Null)),
        Some(code) => Err(ApiError::BadResponse {
            endpoint: endpoint.to_string(),
            code: Some(code),
            message,
        }),
        None if !(200..300).contains(&status) => Err(ApiError::BadResponse {
            endpoint: endpoint.to_string(),
            code: Some(u64::from(status)),
            message,
        }),
        None => Ok(body),
    }
}

/// 内容接口返回 `{content: ...}` 或直接返回内容
fn content_field(data: JsonValue) -> JsonValue {
    match data {
        JsonValue::Object(mut map) if map.contains_key("content") => {
            map.remove("content").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, data: JsonValue) -> AppResult<T> {
    if data.is_null() {
        return Err(ApiError::EmptyResponse {
            endpoint: endpoint.to_string(),
        }
        .into());
    }
    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_data_success() {
        let body = json!({"code": 200, "message": "ok", "data": [{"id": 1}]});
        assert_eq!(extract_data("/x", 200, body).unwrap(), json!([{"id": 1}]));
    }

    #[test]
    fn test_extract_data_bad_code() {
        let body = json!({"code": 500, "message": "服务器错误", "data": null});
        match extract_data("/x", 200, body) {
            Err(ApiError::BadResponse { code, message, .. }) => {
                assert_eq!(code, Some(500));
                assert_eq!(message.as_deref(), Some("服务器错误"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_extract_data_without_envelope() {
        assert_eq!(
            extract_data("/x", 200, json!({"durationSeconds": 12.5})).unwrap(),
            json!({"durationSeconds": 12.5})
        );
        assert!(matches!(
            extract_data("/x", 404, json!({"error": "not found"})),
            Err(ApiError::BadResponse { code: Some(404), .. })
        ));
    }

    #[test]
    fn test_parse_body_non_json_error_page() {
        let page = "<html><body>502 Bad Gateway</body></html>";
        match parse_body("/api/parts/1/content", 502, page) {
            Err(AppError::Api(ApiError::BadResponse { code, message, .. })) => {
                assert_eq!(code, Some(502));
                assert!(message.unwrap().contains("502 Bad Gateway"));
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            parse_body("/x", 200, "not json"),
            Err(AppError::Api(ApiError::JsonParseFailed { .. }))
        ));
        assert!(matches!(
            parse_body("/x", 500, ""),
            Err(AppError::Api(ApiError::BadResponse { code: Some(500), .. }))
        ));
        assert_eq!(
            parse_body("/x", 200, r#"{"code": 200, "data": 7}"#).unwrap(),
            json!(7)
        );
    }

    #[test]
    fn test_content_field() {
        assert_eq!(content_field(json!({"content": "\"{}\""})), json!("\"{}\""));
        assert_eq!(content_field(json!("raw")), json!("raw"));
        assert_eq!(
            content_field(json!({"admin": {}})),
            json!({"admin": {}})
        );
    }

    #[test]
    fn test_decode_null_is_empty_response() {
        let err = decode::<Vec<PartMeta>>("/api/sections/1/parts", JsonValue::Null).unwrap_err();
        assert!(matches!(
            err,
            AppError::Api(ApiError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let config = Config {
            api_base_url: "::not a url".to_string(),
            ..Config::default()
        };
        assert!(HttpExamApi::new(&config).is_err());
    }
}
