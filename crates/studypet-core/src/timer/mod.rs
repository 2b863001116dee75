mod duration;
mod engine;
pub mod driver;

pub use duration::{DurationPolicy, DEFAULT_PRESETS};
pub use engine::{SessionScheduler, SessionStatus, StudySession};
