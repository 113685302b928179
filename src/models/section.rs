use serde::{Deserialize, Serialize};

/// 考试科目（IELTS 的三个笔试部分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// 听力
    #[serde(alias = "LISTENING", alias = "Listening")]
    Listening,
    /// 阅读
    #[serde(alias = "READING", alias = "Reading")]
    Reading,
    /// 写作
    #[serde(alias = "WRITING", alias = "Writing")]
    Writing,
}

impl Section {
    /// 后端使用的科目代码
    pub fn code(self) -> &'static str {
        match self {
            Section::Listening => "LISTENING",
            Section::Reading => "READING",
            Section::Writing => "WRITING",
        }
    }

    /// 获取中文名称（用于日志）
    pub fn name(self) -> &'static str {
        match self {
            Section::Listening => "听力",
            Section::Reading => "阅读",
            Section::Writing => "写作",
        }
    }

    /// 是否按"题号 → 答案"作答（写作按任务作答）
    pub fn is_numbered(self) -> bool {
        !matches!(self, Section::Writing)
    }

    /// 尝试从字符串解析科目（忽略大小写，兼容中文名称）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "listening" | "听力" => Some(Section::Listening),
            "reading" | "阅读" => Some(Section::Reading),
            "writing" | "写作" => Some(Section::Writing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
