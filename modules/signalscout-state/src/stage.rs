use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use signalscout_common::ScoutError;

/// One step of the fixed six-step pipeline, in dependency order.
///
/// The order encodes the usual prerequisite chain (a stage's work set is
/// typically "has the previous stage, lacks this one"), but the state
/// manager does not hard-enforce it — callers pass the prerequisite they
/// actually mean when querying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Mined,
    Enriched,
    Filtered,
    Scored,
    Classified,
    Exported,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Mined,
        Stage::Enriched,
        Stage::Filtered,
        Stage::Scored,
        Stage::Classified,
        Stage::Exported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Mined => "mined",
            Stage::Enriched => "enriched",
            Stage::Filtered => "filtered",
            Stage::Scored => "scored",
            Stage::Classified => "classified",
            Stage::Exported => "exported",
        }
    }

    /// The stage that normally precedes this one, if any.
    pub fn prerequisite(&self) -> Option<Stage> {
        match self {
            Stage::Mined => None,
            Stage::Enriched => Some(Stage::Mined),
            Stage::Filtered => Some(Stage::Enriched),
            Stage::Scored => Some(Stage::Filtered),
            Stage::Classified => Some(Stage::Scored),
            Stage::Exported => Some(Stage::Classified),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mined" => Ok(Stage::Mined),
            "enriched" => Ok(Stage::Enriched),
            "filtered" => Ok(Stage::Filtered),
            "scored" => Ok(Stage::Scored),
            "classified" => Ok(Stage::Classified),
            "exported" => Ok(Stage::Exported),
            other => Err(ScoutError::InvalidStage(other.to_string())),
        }
    }
}
