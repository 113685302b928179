use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::lenient::{
    deserialize_optional_range, deserialize_optional_string, deserialize_optional_u32,
};
use crate::models::question::QuestionRange;

/// 后端题库中的原始题目（字段宽松，允许缺失）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawQuestion {
    #[serde(
        alias = "number",
        alias = "questionNumber",
        deserialize_with = "deserialize_optional_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u32>,
    #[serde(
        rename = "type",
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_type: Option<String>,
    #[serde(alias = "question", alias = "stem", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<JsonValue>>,
    #[serde(
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// 答案，只存在于 admin 视图
    #[serde(alias = "answer", skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<JsonValue>,
}

/// 题组：一段范围字符串加若干题目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionGroup {
    #[serde(
        rename = "type",
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_type: Option<String>,
    #[serde(
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub questions: Vec<RawQuestion>,
}

/// 一个 Part（或写作任务）的持久化内容
///
/// 题目既可以是扁平的 `questions`，也可以是带范围的 `questionGroups`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_groups: Option<Vec<QuestionGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<RawQuestion>>,
    #[serde(
        deserialize_with = "deserialize_optional_range",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_range: Option<QuestionRange>,
    #[serde(
        alias = "audioFileId",
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// 写作题目要求
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(
        deserialize_with = "deserialize_optional_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_words: Option<u32>,
}

impl PartContent {
    /// 是否带有任何答案字段
    pub fn has_answers(&self) -> bool {
        let flat = self
            .questions
            .iter()
            .flatten()
            .any(|q| q.correct_answer.is_some());
        let grouped = self
            .question_groups
            .iter()
            .flatten()
            .flat_map(|g| g.questions.iter())
            .any(|q| q.correct_answer.is_some());
        flat || grouped
    }

    /// 是否像一个 Part（用于识别没有信封的裸内容）
    pub fn looks_like_part(value: &JsonValue) -> bool {
        const KEYS: [&str; 5] = ["questions", "questionGroups", "instruction", "passage", "prompt"];
        value
            .as_object()
            .map(|map| KEYS.iter().any(|k| map.contains_key(*k)))
            .unwrap_or(false)
    }
}

/// `{admin, user}` 信封
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<PartContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PartContent>,
}

/// 带标签的内容：在解包时确定来源，下游不再猜测结构
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum TaggedContent {
    /// 含答案的管理员视图
    Admin(PartContent),
    /// 去掉答案的考生视图
    User(PartContent),
}

impl TaggedContent {
    pub fn content(&self) -> &PartContent {
        match self {
            TaggedContent::Admin(c) | TaggedContent::User(c) => c,
        }
    }

    pub fn into_content(self) -> PartContent {
        match self {
            TaggedContent::Admin(c) | TaggedContent::User(c) => c,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, TaggedContent::Admin(_))
    }
}
