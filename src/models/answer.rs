use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// 单个答案：单值或多选
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multi(Vec<String>),
}

impl AnswerValue {
    /// 宽松地从后端 JSON 值构造答案
    ///
    /// 数字和布尔值按字符串处理；`null`、空字符串、空数组视为没有答案
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(AnswerValue::Single(s.clone())),
            JsonValue::Number(n) => Some(AnswerValue::Single(n.to_string())),
            JsonValue::Bool(b) => Some(AnswerValue::Single(b.to_string())),
            JsonValue::Array(items) => {
                let values: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        JsonValue::String(s) => Some(s.clone()),
                        JsonValue::Number(n) => Some(n.to_string()),
                        JsonValue::Bool(b) => Some(b.to_string()),
                        _ => None,
                    })
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(AnswerValue::Multi(values))
                }
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Single(s) => s.trim().is_empty(),
            AnswerValue::Multi(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }

    /// 作为一段文本（写作任务使用）
    pub fn as_text(&self) -> String {
        match self {
            AnswerValue::Single(s) => s.clone(),
            AnswerValue::Multi(v) => v.join("\n"),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        AnswerValue::Multi(value)
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerValue::Single(s) => write!(f, "{}", s),
            AnswerValue::Multi(v) => write!(f, "{}", v.join(", ")),
        }
    }
}

/// 题号 → 答案
pub type AnswerMap = BTreeMap<u32, AnswerValue>;

/// 题号 → 是否正确（`None` 表示尚未批改）
pub type CorrectnessMap = BTreeMap<u32, Option<bool>>;

/// 提交给后端的单题答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_ord: u32,
    pub answer: AnswerValue,
}

/// 提交目标：哪一次模考的哪一节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTarget {
    pub mock_id: String,
    pub section_id: String,
}

impl SubmissionTarget {
    pub fn new(mock_id: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            mock_id: mock_id.into(),
            section_id: section_id.into(),
        }
    }
}

/// 批改结果中的一行（后端已计算好正误）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRow {
    pub question_ord: u32,
    #[serde(default)]
    pub answer: Option<AnswerValue>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub correct_answers: Vec<String>,
}

/// 后端重新计分后的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub correct_count: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub band_score: Option<f32>,
}
