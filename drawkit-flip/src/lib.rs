//! Commit-reveal coin-flip draw orchestration.
//!
//! A draw walks initialize -> fund -> commit -> reveal/settle against the
//! draw program and a randomness oracle, submitting one confirmed bundle
//! per transition, and decodes the outcome from the settle logs.

pub mod draw;
pub mod error;
pub mod observer;
pub mod oracle;
pub mod outcome;
pub mod program;
pub mod sim;

pub use draw::{DrawConfig, DrawOrchestrator, DrawState};
pub use error::{DrawStep, FlipError, Result};
pub use observer::{DrawEvent, DrawObserver, RecordingObserver, TracingObserver};
pub use oracle::RandomnessOracle;
pub use outcome::{extract, DrawOutcome, FlipResult, RESULT_MARKER};
pub use program::FlipProgram;
