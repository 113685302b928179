//! 信封拆分 - 业务能力层
//!
//! 把解包后的 `{admin, user}` 信封转换为带标签的 [`TaggedContent`]

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::ContentError;
use crate::models::content::{ContentEnvelope, PartContent, TaggedContent};
use crate::services::json_unwrap::unwrap_json;
use crate::utils::logging::truncate_text;

/// 信封内单个分支允许的额外解包轮数
const BRANCH_MAX_DEPTH: usize = 2;

/// 需要的视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentView {
    /// 含答案（预览、批改）
    Admin,
    /// 不含答案（考生作答）
    User,
}

impl ContentView {
    pub fn name(self) -> &'static str {
        match self {
            ContentView::Admin => "admin",
            ContentView::User => "user",
        }
    }
}

impl ContentEnvelope {
    /// 由管理员内容创建信封，考生视图总是由其派生
    pub fn from_admin(admin: PartContent) -> Self {
        let user = strip_answers(&admin);
        Self {
            admin: Some(admin),
            user: Some(user),
        }
    }

    /// 从解包后的 JSON 构造信封
    ///
    /// 没有 `admin`/`user` 键但看起来像 Part 的对象按管理员内容处理
    pub fn from_value(value: JsonValue) -> Result<Self, ContentError> {
        let mut map = match value {
            JsonValue::Object(map) => map,
            other => {
                return Err(ContentError::InvalidShape {
                    reason: format!("期望对象，实际为 {}", json_kind(&other)),
                })
            }
        };

        if !map.contains_key("admin") && !map.contains_key("user") {
            let bare = JsonValue::Object(map);
            if !PartContent::looks_like_part(&bare) {
                return Err(ContentError::InvalidShape {
                    reason: "对象中既没有 admin/user 也没有题目字段".to_string(),
                });
            }
            debug!("内容没有信封，按 admin 内容处理");
            let admin = parse_branch(bare)?;
            return Ok(Self::from_admin(admin));
        }

        let admin = map
            .remove("admin")
            .filter(|v| !v.is_null())
            .map(parse_branch)
            .transpose()?;
        let user = map
            .remove("user")
            .filter(|v| !v.is_null())
            .map(parse_branch)
            .transpose()?;

        match admin {
            Some(admin) => Ok(Self::from_admin(admin)),
            None => Ok(Self { admin: None, user }),
        }
    }

    /// 选择视图
    ///
    /// - `Admin`：优先管理员内容，没有时退回考生内容（标签会如实反映）
    /// - `User`：总是返回去掉答案的内容
    pub fn select(&self, view: ContentView) -> Option<TaggedContent> {
        match view {
            ContentView::Admin => self
                .admin
                .clone()
                .map(TaggedContent::Admin)
                .or_else(|| self.user.as_ref().map(|u| TaggedContent::User(strip_answers(u)))),
            ContentView::User => self
                .admin
                .as_ref()
                .or(self.user.as_ref())
                .map(|c| TaggedContent::User(strip_answers(c))),
        }
    }
}

/// 去掉所有答案字段
pub fn strip_answers(content: &PartContent) -> PartContent {
    let mut stripped = content.clone();
    for question in stripped.questions.iter_mut().flatten() {
        question.correct_answer = None;
    }
    for group in stripped.question_groups.iter_mut().flatten() {
        for question in group.questions.iter_mut() {
            question.correct_answer = None;
        }
    }
    stripped
}

/// 原始内容 → 解包 → 信封 → 带标签内容
///
/// # 参数
/// - `raw`: 后端返回的原始内容
/// - `view`: 需要的视图
/// - `max_depth`: 最大解包轮数
pub fn load_tagged(
    raw: JsonValue,
    view: ContentView,
    max_depth: usize,
) -> Result<TaggedContent, ContentError> {
    let value = unwrap_json(raw, max_depth).map_err(|fallback| {
        warn!(
            "内容解包 {} 轮后仍无法解析: {}",
            fallback.rounds,
            truncate_text(&fallback.text, 80)
        );
        ContentError::Unparseable {
            preview: truncate_text(&fallback.text, 80),
            rounds: fallback.rounds,
        }
    })?;

    let envelope = ContentEnvelope::from_value(value)?;
    envelope.select(view).ok_or(ContentError::MissingView { view: view.name() })
}

fn parse_branch(value: JsonValue) -> Result<PartContent, ContentError> {
    // 分支本身也可能被再次编码成字符串
    let value = unwrap_json(value, BRANCH_MAX_DEPTH).map_err(|fallback| {
        ContentError::Unparseable {
            preview: truncate_text(&fallback.text, 80),
            rounds: fallback.rounds,
        }
    })?;
    serde_json::from_value(value).map_err(|source| ContentError::Deserialize { source })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "布尔值",
        JsonValue::Number(_) => "数字",
        JsonValue::String(_) => "字符串",
        JsonValue::Array(_) => "数组",
        JsonValue::Object(_) => "对象",
    }
}
