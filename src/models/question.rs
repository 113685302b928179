use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use crate::models::answer::AnswerValue;

/// 题型
///
/// 后端历史数据中同一题型有多种写法，统一在 [`QuestionType::from_raw`] 中归一
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    MultipleChoice,
    MultipleSelect,
    FillInBlank,
    ShortAnswer,
    TrueFalseNotGiven,
    YesNoNotGiven,
    Matching,
    MatchingHeadings,
    MapLabeling,
    SentenceCompletion,
    /// 未识别的题型，保留原始写法
    Unknown(String),
}

impl QuestionType {
    /// 从后端原始字符串解析题型
    pub fn from_raw(raw: &str) -> Self {
        let key = raw
            .trim()
            .to_uppercase()
            .replace(|c: char| c == '-' || c == ' ', "_");
        match key.as_str() {
            "MULTIPLE_CHOICE" | "SINGLE_CHOICE" | "MCQ" | "CHOICE" => QuestionType::MultipleChoice,
            "MULTIPLE_SELECT" | "MULTI_SELECT" | "MULTIPLE_ANSWER" | "CHOOSE_TWO" => {
                QuestionType::MultipleSelect
            }
            "FILL_IN_BLANK" | "FILL_IN_THE_BLANK" | "GAP_FILL" | "FORM_COMPLETION"
            | "NOTE_COMPLETION" | "TABLE_COMPLETION" => QuestionType::FillInBlank,
            "SHORT_ANSWER" | "SHORT_ANSWER_QUESTION" => QuestionType::ShortAnswer,
            "TRUE_FALSE_NOT_GIVEN" | "TFNG" | "TRUE_FALSE" => QuestionType::TrueFalseNotGiven,
            "YES_NO_NOT_GIVEN" | "YNNG" => QuestionType::YesNoNotGiven,
            "MATCHING" | "MATCHING_INFORMATION" | "MATCHING_FEATURES" => QuestionType::Matching,
            "MATCHING_HEADINGS" | "HEADINGS" => QuestionType::MatchingHeadings,
            "MAP_LABELING" | "MAP_LABELLING" | "DIAGRAM_LABELING" | "PLAN_LABELING" => {
                QuestionType::MapLabeling
            }
            "SENTENCE_COMPLETION" | "SUMMARY_COMPLETION" => QuestionType::SentenceCompletion,
            _ => QuestionType::Unknown(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionType::MultipleSelect => "MULTIPLE_SELECT",
            QuestionType::FillInBlank => "FILL_IN_BLANK",
            QuestionType::ShortAnswer => "SHORT_ANSWER",
            QuestionType::TrueFalseNotGiven => "TRUE_FALSE_NOT_GIVEN",
            QuestionType::YesNoNotGiven => "YES_NO_NOT_GIVEN",
            QuestionType::Matching => "MATCHING",
            QuestionType::MatchingHeadings => "MATCHING_HEADINGS",
            QuestionType::MapLabeling => "MAP_LABELING",
            QuestionType::SentenceCompletion => "SENTENCE_COMPLETION",
            QuestionType::Unknown(raw) => raw,
        }
    }

    /// 是否为多选（答案是数组）
    pub fn is_multi_select(&self) -> bool {
        matches!(self, QuestionType::MultipleSelect)
    }
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        QuestionType::from_raw(&value)
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 闭区间题号范围，例如 `14-20`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRange {
    pub start: u32,
    pub end: u32,
}

/// 没有任何题号信息时使用的范围
pub const DEFAULT_QUESTION_RANGE: QuestionRange = QuestionRange { start: 1, end: 10 };

static RANGE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

impl QuestionRange {
    pub fn new(start: u32, end: u32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// 解析 `"14-20"` 形式的范围字符串
    pub fn parse(raw: &str) -> Option<Self> {
        Self::parse_bounds(raw).map(|(first, last)| Self::new(first, last))
    }

    /// 按书写顺序返回两端题号，不做交换（`"20-14"` → `(20, 14)`）
    pub fn parse_bounds(raw: &str) -> Option<(u32, u32)> {
        let re = RANGE_PATTERN
            .get_or_init(|| Regex::new(r"^(\d+)-(\d+)$").ok())
            .as_ref()?;
        let caps = re.captures(raw.trim())?;
        let first = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let last = caps.get(2)?.as_str().parse::<u32>().ok()?;
        Some((first, last))
    }

    /// 宽松解析：字符串、`[start, end]` 数组或 `{start, end}` 对象
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Self::parse(s),
            JsonValue::Array(items) if items.len() == 2 => {
                let start = items[0].as_u64()?;
                let end = items[1].as_u64()?;
                Some(Self::new(u32::try_from(start).ok()?, u32::try_from(end).ok()?))
            }
            JsonValue::Object(map) => {
                let start = map.get("start")?.as_u64()?;
                let end = map.get("end")?.as_u64()?;
                Some(Self::new(u32::try_from(start).ok()?, u32::try_from(end).ok()?))
            }
            _ => None,
        }
    }

    /// 由一组题号求最小/最大值
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Option<Self> {
        let mut iter = ids.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), id| (lo.min(id), hi.max(id)));
        Some(Self::new(min, max))
    }

    /// 两个范围的外包区间
    pub fn span(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// 题数；`0-4294967295` 超出 u32，所以用 u64
    pub fn len(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    pub fn contains(&self, id: u32) -> bool {
        id >= self.start && id <= self.end
    }
}

impl std::fmt::Display for QuestionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// 归一化后的题目，`id` 即绝对题号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<AnswerValue>,
}

/// 题号数据完整性问题（只记录，不阻断加载）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RangeIssue {
    /// 题组的 range 字符串无法解析，起始题号按 1 处理
    MalformedRange { group_index: usize, raw: String },
    /// 题组声明的题数与实际题数不一致
    /// 题组的 range 写反（如 `20-14`），仍按第一个数字起始编号
    ReversedRange { group_index: usize, raw: String },
    CountMismatch {
        group_index: usize,
        declared: u64,
        actual: u64,
    },
    /// 起始题号过大，后续题目无法编号而被丢弃
    NumberOverflow { start: u32, dropped: usize },
    /// 范围内缺失的题号
    Gap { from: u32, to: u32 },
    /// 重复的题号
    Overlap { id: u32 },
    /// 超出范围的题号
    OutOfRange { id: u32 },
}

impl std::fmt::Display for RangeIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeIssue::MalformedRange { group_index, raw } => {
                write!(f, "题组 {} 的范围 '{}' 无法解析，已按 1 起始编号", group_index, raw)
            }
            RangeIssue::ReversedRange { group_index, raw } => {
                write!(f, "题组 {} 的范围 '{}' 起止颠倒，按第一个数字起始编号", group_index, raw)
            }
            RangeIssue::NumberOverflow { start, dropped } => {
                write!(f, "从第 {} 题起编号溢出，丢弃 {} 题", start, dropped)
            }
            RangeIssue::CountMismatch {
                group_index,
                declared,
                actual,
            } => write!(
                f,
                "题组 {} 声明 {} 题，实际 {} 题",
                group_index, declared, actual
            ),
            RangeIssue::Gap { from, to } if from == to => write!(f, "缺少第 {} 题", from),
            RangeIssue::Gap { from, to } => write!(f, "缺少第 {}-{} 题", from, to),
            RangeIssue::Overlap { id } => write!(f, "第 {} 题重复", id),
            RangeIssue::OutOfRange { id } => write!(f, "第 {} 题超出范围", id),
        }
    }
}

/// 音频引用：文件 ID 与可下载地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioRef {
    pub file_id: Option<String>,
    pub url: Option<String>,
}

/// 听力 / 阅读的一个 Part
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: String,
    pub ordinal: u32,
    pub title: String,
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioRef>,
    pub question_range: QuestionRange,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<RangeIssue>,
}

impl Part {
    pub fn question(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn audio_file_id(&self) -> Option<&str> {
        self.audio.as_ref().and_then(|a| a.file_id.as_deref())
    }
}

/// 写作任务
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingTask {
    pub id: String,
    pub ordinal: u32,
    pub title: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub min_words: u32,
}
