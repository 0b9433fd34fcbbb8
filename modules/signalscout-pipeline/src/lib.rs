//! The six pipeline stages: mine, enrich, filter, score, classify, export.
//!
//! Each stage runner reads its work set from the state manager, does its
//! work through collaborator traits, writes the stage dataset file, and
//! marks completions back into the state. Rate pacing between external calls
//! happens here — never in the state core.

pub mod classify;
pub mod enrich;
pub mod export;
pub mod filter;
pub mod llm;
pub mod mine;
pub mod score;
pub mod store;
pub mod traits;
