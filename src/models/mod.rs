pub mod answer;
pub mod content;
pub mod lenient;
pub mod meta;
pub mod question;
pub mod section;

pub use answer::{
    AnswerMap, AnswerValue, CorrectnessMap, ReviewRow, ScoreSummary, SubmissionTarget,
    SubmittedAnswer,
};
pub use content::{ContentEnvelope, PartContent, QuestionGroup, RawQuestion, TaggedContent};
pub use meta::{AudioMeta, PartMeta};
pub use question::{
    AudioRef, Part, Question, QuestionRange, QuestionType, RangeIssue, WritingTask,
    DEFAULT_QUESTION_RANGE,
};
pub use section::Section;
