//! 内容转换 - 业务能力层
//!
//! 把 `questions` / `questionGroups` 两种形态的原始内容转换为连续编号的题目列表

use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use tracing::warn;

use crate::models::answer::AnswerValue;
use crate::models::content::{PartContent, QuestionGroup, RawQuestion};
use crate::models::meta::PartMeta;
use crate::models::question::{
    AudioRef, Part, Question, QuestionRange, QuestionType, RangeIssue, WritingTask,
    DEFAULT_QUESTION_RANGE,
};
use crate::services::media::MediaResolver;

/// Task 1 默认最少字数
const TASK1_MIN_WORDS: u32 = 150;
/// Task 2 默认最少字数
const TASK2_MIN_WORDS: u32 = 250;

/// 内容转换器
///
/// 职责：
/// - 只处理单个 Part 的内容
/// - 不发网络请求
/// - 不关心考试会话状态
pub struct ContentTransformer {
    media: MediaResolver,
}

impl ContentTransformer {
    pub fn new(media: MediaResolver) -> Self {
        Self { media }
    }

    /// 转换听力 / 阅读 Part
    ///
    /// # 参数
    /// - `content`: 已选定视图的 Part 内容
    /// - `ordinal`: Part 序号（从 1 开始）
    /// - `meta`: 后端 Part 元数据（提供 ID、标题、对外声明的题号范围）
    ///
    /// # 返回
    /// 题号连续的 [`Part`]，数据问题记录在 `issues` 中
    pub fn transform_part(&self, content: &PartContent, ordinal: u32, meta: &PartMeta) -> Part {
        let advertised = meta.question_range.or(content.question_range);
        let groups = content.question_groups.as_deref().unwrap_or(&[]);
        let flat = content.questions.as_deref().filter(|q| !q.is_empty());

        let (questions, question_range, mut issues) = match flat {
            Some(raw) => self.flatten_questions(raw, groups, advertised),
            None => self.flatten_groups(groups, advertised),
        };
        issues.extend(check_numbering(question_range, &questions));

        let audio_file_id = meta.audio_file_id.clone().or_else(|| content.audio_id.clone());
        let audio_url = content
            .audio_url
            .as_deref()
            .and_then(|url| self.media.resolve_url(url))
            .or_else(|| audio_file_id.as_deref().map(|id| self.media.file_download_url(id)));
        let audio = if audio_file_id.is_some() || audio_url.is_some() {
            Some(AudioRef {
                file_id: audio_file_id,
                url: audio_url,
            })
        } else {
            None
        };

        Part {
            id: meta.id.clone(),
            ordinal,
            title: resolve_title(meta, content, || format!("Part {}", ordinal)),
            instruction: content.instruction.clone().unwrap_or_default(),
            passage: content.passage.clone().filter(|p| !p.trim().is_empty()),
            audio,
            question_range,
            questions,
            issues,
        }
    }

    /// 转换写作任务
    pub fn transform_writing_task(
        &self,
        content: &PartContent,
        ordinal: u32,
        meta: &PartMeta,
    ) -> WritingTask {
        let body = content.prompt.as_ref().or(content.passage.as_ref());
        let prompt = [content.instruction.as_ref(), body]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let default_min_words = if ordinal == 1 {
            TASK1_MIN_WORDS
        } else {
            TASK2_MIN_WORDS
        };

        WritingTask {
            id: meta.id.clone(),
            ordinal,
            title: resolve_title(meta, content, || format!("Task {}", ordinal)),
            prompt,
            image_url: self
                .media
                .resolve_image(content.image_id.as_deref(), content.image_url.as_deref()),
            min_words: content.min_words.unwrap_or(default_min_words),
        }
    }

    /// 扁平 `questions`：没有题号的题目按范围起点依次编号
    fn flatten_questions(
        &self,
        raw: &[RawQuestion],
        groups: &[QuestionGroup],
        advertised: Option<QuestionRange>,
    ) -> (Vec<Question>, QuestionRange, Vec<RangeIssue>) {
        let range = declared_group_range(groups)
            .or_else(|| QuestionRange::from_ids(raw.iter().filter_map(|q| q.id)))
            .or(advertised)
            .unwrap_or(DEFAULT_QUESTION_RANGE);

        let mut questions = Vec::with_capacity(raw.len());
        let mut dropped = 0;
        for (index, q) in raw.iter().enumerate() {
            match q.id.or_else(|| offset_id(range.start, index)) {
                Some(id) => questions.push(self.build_question(q, id, None, None)),
                None => dropped += 1,
            }
        }

        let mut issues = Vec::new();
        record_overflow(&mut issues, range.start, dropped);
        (questions, range, issues)
    }

    /// 题组：按 `range` 起点为组内题目连续编号
    fn flatten_groups(
        &self,
        groups: &[QuestionGroup],
        advertised: Option<QuestionRange>,
    ) -> (Vec<Question>, QuestionRange, Vec<RangeIssue>) {
        let mut questions = Vec::new();
        let mut issues = Vec::new();
        let mut declared: Option<QuestionRange> = None;

        for (group_index, group) in groups.iter().enumerate() {
            let bounds = group.range.as_deref().and_then(QuestionRange::parse_bounds);
            let start = match bounds {
                Some((first, last)) => {
                    let range = QuestionRange::new(first, last);
                    declared = Some(declared.map_or(range, |d| d.span(range)));
                    if first > last {
                        let raw = group.range.clone().unwrap_or_default();
                        warn!(
                            "⚠️ 题组 {} 的范围 '{}' 起止颠倒，按第 {} 题起始编号",
                            group_index, raw, first
                        );
                        issues.push(RangeIssue::ReversedRange { group_index, raw });
                    }
                    let actual = group.questions.len() as u64;
                    if range.len() != actual {
                        issues.push(RangeIssue::CountMismatch {
                            group_index,
                            declared: range.len(),
                            actual,
                        });
                    }
                    first
                }
                None => {
                    let raw = group.range.clone().unwrap_or_default();
                    warn!(
                        "⚠️ 题组 {} 的范围 '{}' 无法解析，按第 1 题起始编号",
                        group_index, raw
                    );
                    issues.push(RangeIssue::MalformedRange { group_index, raw });
                    1
                }
            };

            let mut dropped = 0;
            for (index, raw_question) in group.questions.iter().enumerate() {
                let Some(id) = offset_id(start, index) else {
                    dropped += 1;
                    continue;
                };
                let prefix = if index == 0 {
                    group.instruction.as_deref()
                } else {
                    None
                };
                questions.push(self.build_question(
                    raw_question,
                    id,
                    group.question_type.as_deref(),
                    prefix,
                ));
            }
            record_overflow(&mut issues, start, dropped);
        }

        let range = declared
            .or(advertised)
            .or_else(|| QuestionRange::from_ids(questions.iter().map(|q| q.id)))
            .unwrap_or(DEFAULT_QUESTION_RANGE);

        (questions, range, issues)
    }

    fn build_question(
        &self,
        raw: &RawQuestion,
        id: u32,
        group_type: Option<&str>,
        instruction: Option<&str>,
    ) -> Question {
        let text = raw.text.clone().unwrap_or_default();
        let text = match instruction.map(str::trim).filter(|s| !s.is_empty()) {
            Some(prefix) if text.trim().is_empty() => prefix.to_string(),
            Some(prefix) => format!("{}\n{}", prefix, text),
            None => text,
        };

        let options = raw
            .options
            .as_ref()
            .map(|opts| opts.iter().filter_map(option_text).collect::<Vec<_>>())
            .filter(|opts| !opts.is_empty());

        let question_type = raw
            .question_type
            .as_deref()
            .or(group_type)
            .map(QuestionType::from_raw)
            .unwrap_or_else(|| {
                if options.is_some() {
                    QuestionType::MultipleChoice
                } else {
                    QuestionType::ShortAnswer
                }
            });

        Question {
            id,
            question_type,
            text,
            options,
            image_url: self
                .media
                .resolve_image(raw.image_id.as_deref(), raw.image_url.as_deref()),
            correct_answer: raw.correct_answer.as_ref().and_then(AnswerValue::from_json),
        }
    }
}

/// 检查题号是否恰好覆盖范围：缺号、重号、越界
pub fn check_numbering(range: QuestionRange, questions: &[Question]) -> Vec<RangeIssue> {
    let mut issues = Vec::new();
    if questions.is_empty() {
        return issues;
    }

    let mut seen = BTreeSet::new();
    for question in questions {
        if !range.contains(question.id) {
            issues.push(RangeIssue::OutOfRange { id: question.id });
        }
        if !seen.insert(question.id) {
            issues.push(RangeIssue::Overlap { id: question.id });
        }
    }

    // 只遍历出现过的题号，范围再大也只走 questions.len() 步
    let mut next = u64::from(range.start);
    for &id in seen.range(range.start..=range.end) {
        if u64::from(id) > next {
            issues.push(RangeIssue::Gap {
                from: next as u32,
                to: id - 1,
            });
        }
        next = u64::from(id) + 1;
    }
    if next <= u64::from(range.end) {
        issues.push(RangeIssue::Gap {
            from: next as u32,
            to: range.end,
        });
    }

    issues
}

/// `start + index`，溢出时返回 None
fn offset_id(start: u32, index: usize) -> Option<u32> {
    u32::try_from(index).ok().and_then(|i| start.checked_add(i))
}

fn record_overflow(issues: &mut Vec<RangeIssue>, start: u32, dropped: usize) {
    if dropped > 0 {
        warn!("⚠️ 从第 {} 题起编号溢出，丢弃 {} 题", start, dropped);
        issues.push(RangeIssue::NumberOverflow { start, dropped });
    }
}

fn declared_group_range(groups: &[QuestionGroup]) -> Option<QuestionRange> {
    groups
        .iter()
        .filter_map(|g| g.range.as_deref().and_then(QuestionRange::parse))
        .reduce(QuestionRange::span)
}

fn resolve_title(
    meta: &PartMeta,
    content: &PartContent,
    fallback: impl FnOnce() -> String,
) -> String {
    meta.title
        .clone()
        .or_else(|| content.title.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(fallback)
}

fn option_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Object(map) => {
            let label = map.get("label").and_then(|v| v.as_str());
            let text = map
                .get("text")
                .or_else(|| map.get("value"))
                .and_then(|v| v.as_str());
            match (label, text) {
                (Some(label), Some(text)) => Some(format!("{}. {}", label, text)),
                (None, Some(text)) => Some(text.to_string()),
                (Some(label), None) => Some(label.to_string()),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transformer() -> ContentTransformer {
        ContentTransformer::new(MediaResolver::new("https://api.example.com").unwrap())
    }

    fn content(value: JsonValue) -> PartContent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_groups_partitioning_range_are_numbered_in_order() {
        let c = content(json!({
            "questionGroups": [
                {"type": "FILL_IN_BLANK", "range": "1-4", "questions": [
                    {"text": "q1"}, {"text": "q2"}, {"text": "q3"}, {"text": "q4"}
                ]},
                {"type": "MULTIPLE_CHOICE", "range": "5-7", "questions": [
                    {"text": "q5", "options": ["A", "B"]}, {"text": "q6"}, {"text": "q7"}
                ]},
                {"type": "MATCHING", "range": "8-10", "questions": [
                    {"text": "q8"}, {"text": "q9"}, {"text": "q10"}
                ]}
            ]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p1", 1));

        assert_eq!(part.questions.len(), 10);
        let ids: Vec<u32> = part.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        assert_eq!(part.question_range, QuestionRange::new(1, 10));
        assert!(part.issues.is_empty());
        assert_eq!(part.questions[4].question_type, QuestionType::MultipleChoice);
        assert_eq!(part.questions[9].question_type, QuestionType::Matching);
    }

    #[test]
    fn test_flat_questions_take_advertised_range() {
        let c = content(json!({
            "questions": (0..7).map(|i| json!({"text": format!("q{}", i)})).collect::<Vec<_>>()
        }));
        let meta = PartMeta::new("p2", 2).with_range(QuestionRange::new(14, 20));
        let part = transformer().transform_part(&c, 2, &meta);

        let ids: Vec<u32> = part.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, (14..=20).collect::<Vec<_>>());
        assert_eq!(part.questions[0].text, "q0");
        assert!(part.issues.is_empty());
    }

    #[test]
    fn test_flat_questions_range_from_explicit_ids() {
        let c = content(json!({
            "questions": [{"id": 21, "text": "a"}, {"id": "22", "text": "b"}, {"id": 23, "text": "c"}]
        }));
        let part = transformer().transform_part(&c, 3, &PartMeta::new("p3", 3));
        assert_eq!(part.question_range, QuestionRange::new(21, 23));
    }

    #[test]
    fn test_flat_questions_default_range() {
        let c = content(json!({"questions": [{"text": "a"}, {"text": "b"}]}));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));
        assert_eq!(part.question_range, DEFAULT_QUESTION_RANGE);
        assert_eq!(part.questions[1].id, 2);
        assert!(part.issues.contains(&RangeIssue::Gap { from: 3, to: 10 }));
    }

    #[test]
    fn test_flat_questions_prefer_group_range() {
        let c = content(json!({
            "questionGroups": [{"range": "11-12", "questions": []}],
            "questions": [{"text": "a"}, {"text": "b"}]
        }));
        let part = transformer().transform_part(&c, 2, &PartMeta::new("p", 2));
        assert_eq!(part.question_range, QuestionRange::new(11, 12));
        assert_eq!(part.questions[0].id, 11);
    }

    #[test]
    fn test_group_instruction_prefixes_first_question_only() {
        let c = content(json!({
            "questionGroups": [{
                "range": "1-2",
                "instruction": "Write NO MORE THAN TWO WORDS.",
                "questions": [{"text": "Name: ____"}, {"text": "Date: ____"}]
            }]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));
        assert_eq!(part.questions[0].text, "Write NO MORE THAN TWO WORDS.\nName: ____");
        assert_eq!(part.questions[1].text, "Date: ____");
    }

    #[test]
    fn test_malformed_range_defaults_to_one_and_is_recorded() {
        let c = content(json!({
            "questionGroups": [
                {"range": "14-15", "questions": [{"text": "a"}, {"text": "b"}]},
                {"range": "Questions 16 to 17", "questions": [{"text": "c"}, {"text": "d"}]}
            ]
        }));
        let part = transformer().transform_part(&c, 2, &PartMeta::new("p", 2));

        let ids: Vec<u32> = part.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![14, 15, 1, 2]);
        assert!(part.issues.contains(&RangeIssue::MalformedRange {
            group_index: 1,
            raw: "Questions 16 to 17".to_string()
        }));
        assert!(part.issues.contains(&RangeIssue::OutOfRange { id: 1 }));
    }

    #[test]
    fn test_reversed_range_starts_from_first_number() {
        let c = content(json!({
            "questionGroups": [{"range": "20-14", "questions": [{"text": "a"}, {"text": "b"}]}]
        }));
        let part = transformer().transform_part(&c, 2, &PartMeta::new("p", 2));

        let ids: Vec<u32> = part.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![20, 21]);
        assert_eq!(part.question_range, QuestionRange::new(14, 20));
        assert!(part.issues.contains(&RangeIssue::ReversedRange {
            group_index: 0,
            raw: "20-14".to_string()
        }));
        assert!(part.issues.contains(&RangeIssue::OutOfRange { id: 21 }));
    }

    #[test]
    fn test_huge_group_start_drops_unnumbered_questions() {
        let c = content(json!({
            "questionGroups": [{
                "range": "4294967295-4294967295",
                "questions": [{"text": "a"}, {"text": "b"}, {"text": "c"}]
            }]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));

        assert_eq!(part.questions.len(), 1);
        assert_eq!(part.questions[0].id, u32::MAX);
        assert!(part.issues.contains(&RangeIssue::NumberOverflow {
            start: u32::MAX,
            dropped: 2
        }));
    }

    #[test]
    fn test_huge_flat_range_does_not_overflow() {
        let c = content(json!({
            "questionRange": "4294967294-4294967295",
            "questions": [{"text": "a"}, {"text": "b"}, {"text": "c"}]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));

        let ids: Vec<u32> = part.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![u32::MAX - 1, u32::MAX]);
        assert!(part.issues.contains(&RangeIssue::NumberOverflow {
            start: u32::MAX - 1,
            dropped: 1
        }));
    }

    #[test]
    fn test_full_u32_range_is_checked_without_scanning() {
        let c = content(json!({
            "questionGroups": [{"range": "0-4294967295", "questions": [{"text": "a"}]}]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));

        assert_eq!(part.questions[0].id, 0);
        assert!(part.issues.contains(&RangeIssue::CountMismatch {
            group_index: 0,
            declared: 1u64 << 32,
            actual: 1
        }));
        assert!(part.issues.contains(&RangeIssue::Gap {
            from: 1,
            to: u32::MAX
        }));

        let issues = check_numbering(QuestionRange::new(1, 4_000_000_000), &[]);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_count_mismatch_and_overlap_are_reported() {
        let c = content(json!({
            "questionGroups": [
                {"range": "1-3", "questions": [{"text": "a"}, {"text": "b"}]},
                {"range": "2-3", "questions": [{"text": "c"}, {"text": "d"}]}
            ]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));
        assert!(part.issues.contains(&RangeIssue::CountMismatch {
            group_index: 0,
            declared: 3,
            actual: 2
        }));
        assert!(part.issues.contains(&RangeIssue::Overlap { id: 2 }));
    }

    #[test]
    fn test_question_fields_are_normalized() {
        let c = content(json!({
            "questions": [{
                "id": 1,
                "text": "Choose the correct letter.",
                "options": [{"label": "A", "text": "bus"}, "B. train", 3],
                "imageUrl": "http://localhost:8080/uploads/map.png",
                "correctAnswer": "A"
            }, {
                "id": 2,
                "type": "multiple_select",
                "imageId": 77,
                "answer": ["B", "D"]
            }]
        }));
        let part = transformer().transform_part(&c, 1, &PartMeta::new("p", 1));
        let q1 = &part.questions[0];
        assert_eq!(q1.question_type, QuestionType::MultipleChoice);
        assert_eq!(
            q1.options.as_deref(),
            Some(&["A. bus".to_string(), "B. train".to_string(), "3".to_string()][..])
        );
        assert_eq!(
            q1.image_url.as_deref(),
            Some("https://api.example.com/uploads/map.png")
        );
        assert_eq!(q1.correct_answer, Some(AnswerValue::Single("A".to_string())));

        let q2 = &part.questions[1];
        assert!(q2.question_type.is_multi_select());
        assert_eq!(
            q2.image_url.as_deref(),
            Some("https://api.example.com/api/files/77/download")
        );
        assert_eq!(
            q2.correct_answer,
            Some(AnswerValue::Multi(vec!["B".to_string(), "D".to_string()]))
        );
    }

    #[test]
    fn test_part_metadata_and_audio() {
        let c = content(json!({"title": "Section 1", "audioId": "a1", "questions": [{"text": "x"}]}));
        let mut meta = PartMeta::new("p9", 1);
        meta.title = Some("Part 1".to_string());
        let part = transformer().transform_part(&c, 1, &meta);
        assert_eq!(part.title, "Part 1");
        assert_eq!(part.audio_file_id(), Some("a1"));
        assert_eq!(
            part.audio.unwrap().url.as_deref(),
            Some("https://api.example.com/api/files/a1/download")
        );

        let part = transformer().transform_part(&c, 4, &PartMeta::new("p9", 4));
        assert_eq!(part.title, "Section 1");
    }

    #[test]
    fn test_writing_task() {
        let c = content(json!({
            "instruction": "You should spend about 20 minutes on this task.",
            "prompt": "The chart below shows...",
            "imageId": "chart-1"
        }));
        let task = transformer().transform_writing_task(&c, 1, &PartMeta::new("w1", 1));
        assert_eq!(
            task.prompt,
            "You should spend about 20 minutes on this task.\n\nThe chart below shows..."
        );
        assert_eq!(task.min_words, 150);
        assert_eq!(task.title, "Task 1");
        assert_eq!(
            task.image_url.as_deref(),
            Some("https://api.example.com/api/files/chart-1/download")
        );

        let task2 = transformer().transform_writing_task(
            &content(json!({"prompt": "Discuss both views.", "minWords": "260"})),
            2,
            &PartMeta::new("w2", 2),
        );
        assert_eq!(task2.min_words, 260);
    }

    #[test]
    fn test_check_numbering_gaps() {
        let q = |id| Question {
            id,
            question_type: QuestionType::ShortAnswer,
            text: String::new(),
            options: None,
            image_url: None,
            correct_answer: None,
        };
        let issues = check_numbering(QuestionRange::new(1, 6), &[q(1), q(2), q(5)]);
        assert_eq!(
            issues,
            vec![RangeIssue::Gap { from: 3, to: 4 }, RangeIssue::Gap { from: 6, to: 6 }]
        );
        assert!(check_numbering(QuestionRange::new(1, 6), &[]).is_empty());
    }
}
