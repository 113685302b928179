//! 分数换算 - 业务能力层

use crate::models::section::Section;

/// 听力：(最少答对题数, 分数)，按答对题数从高到低
const LISTENING_BANDS: [(u32, f32); 14] = [
    (39, 9.0),
    (37, 8.5),
    (35, 8.0),
    (32, 7.5),
    (30, 7.0),
    (26, 6.5),
    (23, 6.0),
    (18, 5.5),
    (16, 5.0),
    (13, 4.5),
    (10, 4.0),
    (8, 3.5),
    (6, 3.0),
    (4, 2.5),
];

/// 学术类阅读
const READING_BANDS: [(u32, f32); 14] = [
    (39, 9.0),
    (37, 8.5),
    (35, 8.0),
    (33, 7.5),
    (30, 7.0),
    (27, 6.5),
    (23, 6.0),
    (19, 5.5),
    (15, 5.0),
    (13, 4.5),
    (10, 4.0),
    (8, 3.5),
    (6, 3.0),
    (4, 2.5),
];

/// 答对 1-3 题时的分数
const MIN_BAND: f32 = 2.0;

/// 把 40 题制的答对题数换算为雅思分数
///
/// 写作由人工评分，返回 `None`
pub fn band_score(section: Section, correct: u32) -> Option<f32> {
    let table: &[(u32, f32)] = match section {
        Section::Listening => &LISTENING_BANDS,
        Section::Reading => &READING_BANDS,
        Section::Writing => return None,
    };

    if correct == 0 {
        return Some(0.0);
    }

    let band = table
        .iter()
        .find(|(min_correct, _)| correct >= *min_correct)
        .map(|(_, band)| *band)
        .unwrap_or(MIN_BAND);
    Some(band)
}
