//! 多层 JSON 解包 - 业务能力层
//!
//! 历史数据中部分内容被 `JSON.stringify` 了两次甚至三次，这里按有限轮数逐层解包

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::utils::logging::truncate_text;

/// 默认最大解包轮数
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// 解包失败时保留的原始文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFallback {
    /// 最后一次成功得到的字符串
    pub text: String,
    /// 已成功解包的轮数
    pub rounds: usize,
}

/// 解包结果：结构化值，或退化为原始字符串
pub type Unwrapped = Result<JsonValue, RawFallback>;

/// 逐层解包
///
/// 每一轮：
/// 1. 字符串形如 JSON 对象/数组 → 解析
/// 2. 字符串带外层引号 → 去掉引号后继续
/// 3. 否则停止
///
/// 任何一轮解析失败都只会停止解包，返回上一次的结果，不会报错
///
/// # 参数
/// - `value`: 后端返回的原始值
/// - `max_depth`: 最大解包轮数
///
/// # 返回
/// 非字符串的结构化值，或仍是字符串时的 [`RawFallback`]
pub fn unwrap_json(value: JsonValue, max_depth: usize) -> Unwrapped {
    let mut current = value;
    let mut rounds = 0;

    while rounds < max_depth {
        let JsonValue::String(text) = &current else {
            break;
        };
        let trimmed = text.trim();

        let next = if looks_like_container(trimmed) || is_quoted(trimmed) {
            match serde_json::from_str::<JsonValue>(trimmed) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(
                        "第 {} 轮解包失败，停止解包: {} ({})",
                        rounds + 1,
                        e,
                        truncate_text(trimmed, 60)
                    );
                    break;
                }
            }
        } else {
            break;
        };

        current = next;
        rounds += 1;
    }

    match current {
        JsonValue::String(text) => Err(RawFallback { text, rounds }),
        other => Ok(other),
    }
}

/// 解包字符串形式的内容
pub fn unwrap_str(raw: &str, max_depth: usize) -> Unwrapped {
    unwrap_json(JsonValue::String(raw.to_string()), max_depth)
}

fn looks_like_container(s: &str) -> bool {
    (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'))
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}
