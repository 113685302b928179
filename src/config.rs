use serde::Deserialize;
use std::path::Path;

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::section::Section;

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "mock_exam.toml";
/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_VAR: &str = "MOCK_EXAM_CONFIG";

/// 运行模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 只加载并检查题目内容
    Inspect,
    /// 考试：计时、作答、交卷
    Session,
    /// 查看已提交答案及批改结果
    Review,
}

impl RunMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inspect" => Some(RunMode::Inspect),
            "session" | "exam" => Some(RunMode::Session),
            "review" | "preview" => Some(RunMode::Review),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 后端 ---
    pub api_base_url: String,
    pub api_token: Option<String>,
    /// 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 同时加载的 Part 数量
    pub max_concurrent_requests: usize,
    // --- 考试 ---
    pub section: Section,
    pub section_id: String,
    /// 提交 / 批改需要的模考 ID
    pub mock_id: Option<String>,
    pub mode: RunMode,
    /// 加载含答案的 admin 视图
    pub admin_view: bool,
    /// 内容最大解包轮数
    pub unwrap_max_depth: usize,
    pub listening_buffer_secs: u64,
    pub reading_duration_secs: u64,
    pub writing_duration_secs: u64,
    pub autosave_interval_secs: u64,
    /// 预先填入的答案（JSON: 题号 → 答案）
    pub answers_file: Option<String>,
    // --- 输出 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 题号数据问题输出文件，`None` 时不写
    pub issue_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            api_token: None,
            request_timeout_secs: 30,
            max_concurrent_requests: 4,
            section: Section::Listening,
            section_id: String::new(),
            mock_id: None,
            mode: RunMode::Inspect,
            admin_view: false,
            unwrap_max_depth: 5,
            listening_buffer_secs: 600,
            reading_duration_secs: 3600,
            writing_duration_secs: 3600,
            autosave_interval_secs: 10,
            answers_file: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            issue_file: Some("content_issues.txt".to_string()),
        }
    }
}

impl Config {
    /// 默认值 → 配置文件（存在时）→ 环境变量
    pub fn load() -> AppResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        base.with_overrides(|name| std::env::var(name).ok())
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AppError::file_failed(path, e))?;
        Self::from_toml_str(&text, path)
    }

    pub fn from_toml_str(text: &str, path: &str) -> AppResult<Self> {
        let config = toml::from_str(text).map_err(|source| ConfigError::FileParseFailed {
            path: path.to_string(),
            source,
        })?;
        Ok(config)
    }

    /// 用 `lookup` 提供的变量覆盖配置
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let env = EnvLookup { lookup };

        if let Some(v) = env.string("MOCK_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = env.string("MOCK_API_TOKEN") {
            self.api_token = Some(v);
        }
        if let Some(v) = env.parse("REQUEST_TIMEOUT_SECS", "u64")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env.parse("MAX_CONCURRENT_REQUESTS", "usize")? {
            self.max_concurrent_requests = v;
        }
        if let Some(v) = env.string("EXAM_SECTION") {
            self.section = Section::from_str(&v).ok_or_else(|| ConfigError::EnvVarParseFailed {
                var_name: "EXAM_SECTION".to_string(),
                value: v.clone(),
                expected_type: "listening | reading | writing".to_string(),
            })?;
        }
        if let Some(v) = env.string("SECTION_ID") {
            self.section_id = v;
        }
        if let Some(v) = env.string("MOCK_ID") {
            self.mock_id = Some(v);
        }
        if let Some(v) = env.string("RUN_MODE") {
            self.mode = RunMode::from_str(&v).ok_or_else(|| ConfigError::EnvVarParseFailed {
                var_name: "RUN_MODE".to_string(),
                value: v.clone(),
                expected_type: "inspect | session | review".to_string(),
            })?;
        }
        if let Some(v) = env.parse("ADMIN_VIEW", "bool")? {
            self.admin_view = v;
        }
        if let Some(v) = env.parse("UNWRAP_MAX_DEPTH", "usize")? {
            self.unwrap_max_depth = v;
        }
        if let Some(v) = env.parse("LISTENING_BUFFER_SECS", "u64")? {
            self.listening_buffer_secs = v;
        }
        if let Some(v) = env.parse("READING_DURATION_SECS", "u64")? {
            self.reading_duration_secs = v;
        }
        if let Some(v) = env.parse("WRITING_DURATION_SECS", "u64")? {
            self.writing_duration_secs = v;
        }
        if let Some(v) = env.parse("AUTOSAVE_INTERVAL_SECS", "u64")? {
            self.autosave_interval_secs = v;
        }
        if let Some(v) = env.string("ANSWERS_FILE") {
            self.answers_file = Some(v);
        }
        if let Some(v) = env.parse("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        if let Some(v) = env.string("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        if let Some(v) = env.string("ISSUE_FILE") {
            self.issue_file = Some(v).filter(|p| !p.trim().is_empty());
        }

        Ok(self)
    }

    /// 本节考试时长（听力另行按音频计算）
    pub fn fixed_duration_secs(&self) -> Option<u64> {
        match self.section {
            Section::Listening => None,
            Section::Reading => Some(self.reading_duration_secs),
            Section::Writing => Some(self.writing_duration_secs),
        }
    }
}

struct EnvLookup<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvLookup<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: std::str::FromStr>(
        &self,
        name: &str,
        expected_type: &str,
    ) -> Result<Option<T>, ConfigError> {
        match self.string(name) {
            None => Ok(None),
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
                ConfigError::EnvVarParseFailed {
                    var_name: name.to_string(),
                    value,
                    expected_type: expected_type.to_string(),
                }
            }),
        }
    }
}
