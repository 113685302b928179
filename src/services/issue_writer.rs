//! 数据问题写入服务 - 业务能力层
//!
//! 只负责"写 content_issues.txt"能力，不关心流程

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::question::RangeIssue;
use crate::workflow::PartCtx;

/// 默认输出文件
pub const DEFAULT_ISSUE_FILE: &str = "content_issues.txt";

/// 数据问题写入服务
///
/// 职责：
/// - 把题号缺失、重复、范围格式错误等问题追加写入文件
/// - 只处理单个 Part 的问题
/// - 不阻断加载流程
pub struct IssueWriter {
    issue_file_path: String,
}

impl IssueWriter {
    pub fn new() -> Self {
        Self::with_path(DEFAULT_ISSUE_FILE)
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            issue_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.issue_file_path
    }

    /// 追加写入一个 Part 的全部问题
    ///
    /// 没有问题时不写文件
    pub async fn write(&self, ctx: &PartCtx, issues: &[RangeIssue]) -> AppResult<()> {
        if issues.is_empty() {
            return Ok(());
        }

        debug!("{} 写入 {} 条数据问题", ctx, issues.len());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.issue_file_path)
            .await
            .map_err(|e| AppError::file_failed(&self.issue_file_path, e))?;

        let mut lines = String::new();
        for issue in issues {
            lines.push_str(&format!("{} | {}\n", ctx, issue));
        }

        file.write_all(lines.as_bytes())
            .await
            .map_err(|e| AppError::file_failed(&self.issue_file_path, e))?;

        Ok(())
    }
}

impl Default for IssueWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::section::Section;

    #[tokio::test]
    async fn test_write_appends_one_line_per_issue() {
        let path = std::env::temp_dir().join(format!(
            "mock_exam_issues_{}.txt",
            std::process::id()
        ));
        let path_str = path.to_string_lossy().to_string();
        let _ = tokio::fs::remove_file(&path).await;

        let writer = IssueWriter::with_path(&path_str);
        let ctx = PartCtx::new(Section::Reading, "part-2", 2);
        writer
            .write(
                &ctx,
                &[RangeIssue::Gap { from: 3, to: 4 }, RangeIssue::Overlap { id: 7 }],
            )
            .await
            .unwrap();
        writer.write(&ctx, &[]).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("缺少第 3-4 题"));
        assert!(written.contains("part-2"));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
