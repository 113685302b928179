//! 媒体地址归一化 - 业务能力层
//!
//! 把 `imageId`、相对路径以及开发期泄漏的 localhost 地址统一成可下载的绝对地址

use url::{Host, Url};

use crate::error::{AppResult, ConfigError};

/// 媒体地址解析器
#[derive(Debug, Clone)]
pub struct MediaResolver {
    /// 不带结尾 `/` 的后端根地址
    base: String,
}

impl MediaResolver {
    /// 创建解析器
    ///
    /// # 参数
    /// - `base_url`: 后端根地址，例如 `https://api.example.com`
    pub fn new(base_url: &str) -> AppResult<Self> {
        let parsed = Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            value: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// 文件下载地址
    pub fn file_download_url(&self, file_id: &str) -> String {
        format!("{}/api/files/{}/download", self.base, file_id.trim())
    }

    /// 解析图片：优先使用 `imageUrl`，否则用 `imageId` 拼下载地址
    pub fn resolve_image(&self, image_id: Option<&str>, image_url: Option<&str>) -> Option<String> {
        image_url
            .and_then(|url| self.resolve_url(url))
            .or_else(|| {
                image_id
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| self.file_download_url(id))
            })
    }

    /// 归一化任意媒体地址
    ///
    /// - 绝对地址且主机为 localhost / 127.0.0.1 → 换成后端根地址
    /// - 其他绝对地址（含 `data:`）→ 原样返回
    /// - `/` 开头的路径 → 拼接到根地址
    /// - 不含 `/` 的裸值 → 视为文件 ID
    pub fn resolve_url(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        match Url::parse(raw) {
            Ok(url) if is_local_host(&url) => {
                let mut path = url.path().to_string();
                if let Some(query) = url.query() {
                    path.push('?');
                    path.push_str(query);
                }
                Some(format!("{}{}", self.base, path))
            }
            Ok(_) => Some(raw.to_string()),
            Err(_) if raw.starts_with('/') => Some(format!("{}{}", self.base, raw)),
            Err(_) if !raw.contains('/') && !raw.contains('.') => {
                Some(self.file_download_url(raw))
            }
            Err(_) => Some(format!("{}/{}", self.base, raw)),
        }
    }
}

fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
