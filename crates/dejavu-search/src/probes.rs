//! Accuracy/latency knob for the VectorChord index.
//!
//! `vchordrq.probes` is the number of IVF lists scanned per query. More probes
//! means higher recall and slower queries. Each collection index is built
//! with 2000 lists.

use serde::{Deserialize, Serialize};

use dejavu_core::defaults::SEARCH_PROBES;
use dejavu_core::Error;

/// Lists per `vchordrq` index, as created by the migrations.
pub const INDEX_LISTS: u32 = 2000;

/// Recall target levels for index queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallTarget {
    /// Few lists scanned, lowest latency
    Fast,
    /// The production default
    #[default]
    Balanced,
    /// Recall-leaning
    High,
    /// Scan enough lists to approach exact search
    Exhaustive,
}

impl RecallTarget {
    /// Probes to use for this target.
    pub fn probes(&self) -> u32 {
        match self {
            RecallTarget::Fast => 4,
            RecallTarget::Balanced => SEARCH_PROBES,
            RecallTarget::High => 40,
            RecallTarget::Exhaustive => 200,
        }
    }

    /// Fraction of the index scanned per query.
    pub fn scanned_fraction(&self) -> f32 {
        self.probes() as f32 / INDEX_LISTS as f32
    }
}

impl std::str::FromStr for RecallTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(Error::Config(format!("Unknown recall target: {}", other))),
        }
    }
}
