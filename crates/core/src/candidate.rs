//! Candidates — concrete targets considered for a type-described goal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{BlockPos, Coordinate3};
use crate::goal::EntityRef;

/// What a candidate points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateTarget {
    Block { pos: BlockPos, name: String },
    Entity { entity: EntityRef },
}

/// A concrete target paired with a ranking score (lower = better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub target: CandidateTarget,

    /// Position used for distance and pursuit
    pub position: Coordinate3,

    /// Ranking score; zero until ranked
    #[serde(default)]
    pub score: f64,

    /// Order in which the world query returned this candidate
    pub discovery_index: usize,
}

impl Candidate {
    pub fn block(pos: BlockPos, name: impl Into<String>, discovery_index: usize) -> Self {
        Self {
            target: CandidateTarget::Block {
                pos,
                name: name.into(),
            },
            position: pos.as_coordinate(),
            score: 0.0,
            discovery_index,
        }
    }

    pub fn entity(entity: EntityRef, position: Coordinate3, discovery_index: usize) -> Self {
        Self {
            target: CandidateTarget::Entity { entity },
            position,
            score: 0.0,
            discovery_index,
        }
    }

    /// Name of the block type or entity.
    pub fn name(&self) -> &str {
        match &self.target {
            CandidateTarget::Block { name, .. } => name,
            CandidateTarget::Entity { entity } => &entity.name,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            CandidateTarget::Block { pos, name } => write!(f, "{name} at {pos}"),
            CandidateTarget::Entity { entity } => {
                write!(f, "{} #{} at {}", entity.name, entity.id, self.position.block())
            }
        }
    }
}
