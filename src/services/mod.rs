pub mod envelope;
pub mod issue_writer;
pub mod json_unwrap;
pub mod media;
pub mod review;
pub mod scoring;
pub mod transformer;

pub use envelope::{load_tagged, strip_answers, ContentView};
pub use issue_writer::IssueWriter;
pub use json_unwrap::{unwrap_json, RawFallback, DEFAULT_MAX_DEPTH};
pub use media::MediaResolver;
pub use review::{MarkOutcome, ReviewBoard};
pub use scoring::band_score;
pub use transformer::ContentTransformer;
