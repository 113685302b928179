pub mod audio;
pub mod autosave;
pub mod store;
pub mod timer;

pub use audio::{preload_durations, PreloadReport};
pub use autosave::{spawn_autosave, AutoSaveHandle, DEFAULT_AUTOSAVE_INTERVAL};
pub use store::{ExamSession, SessionAction, SessionPhase, SharedSession};
pub use timer::{
    listening_duration, start_timer, start_timer_after_audio, Countdown, TickOutcome,
    TimerHandle, TimerState,
};
