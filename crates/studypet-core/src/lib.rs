//! # Studypet Core Library
//!
//! Core logic for a study timer whose sessions grow a virtual pet. The CLI
//! binary drives everything through this crate; a GUI would be a thin layer
//! over the same types.
//!
//! ## Architecture
//!
//! - **Timer**: a tick-driven session state machine. The caller (or the
//!   tokio driver in [`timer::driver`]) invokes `tick()` once per interval
//! - **Focus**: classifier samples adjust a points multiplier
//! - **Pet**: five evolution stages behind a single-writer ledger
//! - **Progression**: turns finished sessions into points and notifies
//!   observers
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`ProgressionController`]: owns the pet's ledger and the active session
//! - [`SessionScheduler`]: session state machine
//! - [`MasteryLedger`]: the only write path for progress
//! - [`FocusAdapter`]: focus samples to multiplier
//! - [`Database`]: pet and history persistence, usable as an observer
//! - [`Config`]: engine configuration

pub mod error;
pub mod events;
pub mod focus;
pub mod pet;
pub mod progression;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, EngineError};
pub use events::Event;
pub use focus::{FocusAdapter, FocusLabel, FocusSample, FocusSettings};
pub use pet::{
    EvolutionOutcome, EvolutionRecord, EvolutionTable, MasteryLedger, Pet, PetKind, PetMood, Stage,
};
pub use progression::{
    CancelCredit, ProgressObserver, ProgressionController, ProgressionSettings, SessionOutcome,
    SessionReport, SessionResult, SharedController,
};
pub use storage::{Config, Database};
pub use timer::{DurationPolicy, SessionScheduler, SessionStatus, StudySession};
