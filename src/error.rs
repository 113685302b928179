use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 后端 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 题目内容解析错误
    #[error("内容错误: {0}")]
    Content(#[from] ContentError),
    /// 考试会话状态错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): code={code:?}, message={message:?}")]
    BadResponse {
        endpoint: String,
        code: Option<u64>,
        message: Option<String>,
    },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
    /// 登录凭证失效（HTTP 401）
    #[error("登录已失效 ({endpoint})，需要重新登录")]
    Unauthorized { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: serde_json::Error,
    },
}

/// 题目内容错误
#[derive(Debug, Error)]
pub enum ContentError {
    /// 多层解包后仍然是无法解析的字符串
    #[error("内容无法解析为 JSON (已解包 {rounds} 层): {preview}")]
    Unparseable { preview: String, rounds: usize },
    /// 解包结果不是对象
    #[error("内容结构不正确: {reason}")]
    InvalidShape { reason: String },
    /// 信封中没有可用的视图
    #[error("内容中缺少 {view} 视图")]
    MissingView { view: &'static str },
    /// 反序列化为题目结构失败
    #[error("题目结构反序列化失败: {source}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
    },
}

/// 考试会话错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 预览模式下禁止修改
    #[error("预览模式为只读，不能执行 {action}")]
    PreviewReadOnly { action: &'static str },
    /// 非法的状态迁移
    #[error("当前状态 {from} 下不能执行 {action}")]
    InvalidTransition { from: String, action: &'static str },
    /// 已经提交过
    #[error("本节已提交，不能重复提交")]
    AlreadySubmitted,
    /// 只有预览模式可以加载批改结果
    #[error("只有预览模式可以加载已提交答案")]
    NotInPreview,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 后端地址不合法
    #[error("后端地址不合法 '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed { source: err })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.path().to_string()).unwrap_or_default();
        AppError::api_request_failed(endpoint, err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File {
            path: String::new(),
            source: err,
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(ConfigError::InvalidBaseUrl {
            value: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读写错误
    pub fn file_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }

    /// 是否为登录失效（调用方需要清理会话并重新登录）
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Api(ApiError::Unauthorized { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
