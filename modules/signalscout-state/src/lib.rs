//! Pipeline state tracking for signalscout.
//!
//! Tracks which of the six pipeline stages each profile has passed, plus the
//! topic registry that drives mining, and persists everything to a single
//! JSON state file. Every stage runner opens the state, queries its work set,
//! does its work through collaborators, and marks completions back here.

pub mod persist;
pub mod stage;
pub mod state;

pub use stage::Stage;
pub use state::{PipelineState, StateSummary, TopicRecord, TopicStatus};
