//! proctor-core — Assessment countdown timer and backend traits.
//!
//! This crate defines the data model, the attempt backend trait, the error
//! taxonomy and the timer that keeps a local countdown in step with the
//! server's authoritative clock.

pub mod error;
pub mod model;
pub mod timer;
pub mod traits;

pub use error::BackendError;
pub use model::{format_clock, AttemptSession, TimeRemaining, TimerConfig, TimerState};
pub use timer::AssessmentTimer;
pub use traits::{AttemptBackend, NoopEvents, TimerEvents};
