use serde::{Deserialize, Serialize};

use crate::models::lenient::{
    deserialize_optional_range, deserialize_optional_string, deserialize_optional_u32,
    deserialize_string,
};
use crate::models::question::QuestionRange;

/// 后端返回的 Part 元数据（题目内容需另行获取）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartMeta {
    #[serde(deserialize_with = "deserialize_string")]
    pub id: String,
    #[serde(default, alias = "ord", deserialize_with = "deserialize_optional_u32")]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    /// 后端对外声明的题号范围
    #[serde(default, deserialize_with = "deserialize_optional_range")]
    pub question_range: Option<QuestionRange>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub audio_file_id: Option<String>,
}

impl PartMeta {
    pub fn new(id: impl Into<String>, ordinal: u32) -> Self {
        Self {
            id: id.into(),
            ordinal: Some(ordinal),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, range: QuestionRange) -> Self {
        self.question_range = Some(range);
        self
    }

    pub fn with_audio(mut self, file_id: impl Into<String>) -> Self {
        self.audio_file_id = Some(file_id.into());
        self
    }
}

/// 音频文件元数据
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMeta {
    #[serde(alias = "duration")]
    pub duration_seconds: f64,
}
