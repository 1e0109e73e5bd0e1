//! Candidate ranking by estimated reachability cost.

use wayfarer_config::RetryConfig;
use wayfarer_core::{Candidate, Coordinate3};

/// Orders candidates so the cheapest to reach comes first.
///
/// Score is the straight-line distance plus, for candidates whose vertical
/// offset exceeds the threshold, the offset times the penalty factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateSelector {
    vertical_threshold: f64,
    vertical_factor: f64,
}

impl CandidateSelector {
    pub fn new(vertical_threshold: f64, vertical_factor: f64) -> Self {
        Self {
            vertical_threshold,
            vertical_factor,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.vertical_penalty_threshold,
            config.vertical_penalty_factor,
        )
    }

    pub fn score(&self, position: &Coordinate3, agent: &Coordinate3) -> f64 {
        let distance = agent.distance_to(position);
        let vertical = agent.vertical_offset(position);
        if vertical > self.vertical_threshold {
            distance + vertical * self.vertical_factor
        } else {
            distance
        }
    }

    /// Score and sort ascending. Equal scores keep discovery order.
    pub fn rank(&self, mut candidates: Vec<Candidate>, agent: Coordinate3) -> Vec<Candidate> {
        for candidate in &mut candidates {
            candidate.score = self.score(&candidate.position, &agent);
        }
        candidates.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.discovery_index.cmp(&b.discovery_index))
        });
        candidates
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
