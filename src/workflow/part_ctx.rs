//! Part 处理上下文
//!
//! 封装"我正在处理哪一节的第几个 Part"这一信息

use std::fmt::Display;

use crate::models::section::Section;

/// Part 处理上下文
#[derive(Debug, Clone)]
pub struct PartCtx {
    /// 所属科目
    pub section: Section,

    /// 后端 Part ID
    pub part_id: String,

    /// Part 序号（从1开始）
    pub ordinal: u32,
}

impl PartCtx {
    pub fn new(section: Section, part_id: impl Into<String>, ordinal: u32) -> Self {
        Self {
            section,
            part_id: part_id.into(),
            ordinal,
        }
    }
}

impl Display for PartCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} Part#{} ID#{}]",
            self.section, self.ordinal, self.part_id
        )
    }
}
