//! Progress monitor — catches stalls the mover never reports.
//!
//! Samples the agent position on a fixed interval. A sample that moved less
//! than the threshold since the previous one counts as stalled; any larger
//! displacement resets the counter. The monitor fires once the counter
//! reaches `max_consecutive`.

use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use wayfarer_config::StallConfig;
use wayfarer_core::{Coordinate3, Mover};

/// Sampling state for one pursuit.
#[derive(Debug, Clone, PartialEq)]
pub struct StallState {
    last: Coordinate3,
    consecutive: u32,
    threshold: f64,
    max_consecutive: u32,
}

impl StallState {
    pub fn new(start: Coordinate3, threshold: f64, max_consecutive: u32) -> Self {
        Self {
            last: start,
            consecutive: 0,
            threshold,
            max_consecutive,
        }
    }

    /// Record a sample. Returns `true` once the agent counts as stuck.
    pub fn observe(&mut self, position: Coordinate3) -> bool {
        let displacement = self.last.distance_to(&position);
        self.last = position;
        if displacement < self.threshold {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= self.max_consecutive
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Periodic sampler bound to a single pursuit.
pub struct ProgressMonitor {
    interval: Duration,
    state: StallState,
}

impl ProgressMonitor {
    pub fn new(config: &StallConfig, start: Coordinate3) -> Self {
        Self {
            interval: config.sample_interval(),
            state: StallState::new(start, config.threshold, config.max_consecutive),
        }
    }

    /// Sample until a stall is detected, then return the number of stalled
    /// samples. Dropping the future stops sampling.
    pub async fn run(mut self, mover: &dyn Mover) -> u32 {
        // The start position is the baseline; the first sample is one
        // interval later.
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let position = mover.position();
            if self.state.observe(position) {
                debug!(%position, samples = self.state.consecutive(), "Stall detected");
                return self.state.consecutive();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_sim::Simulation;

    #[test]
    fn movement_resets_counter() {
        let mut state = StallState::new(Coordinate3::ORIGIN, 0.5, 3);
        assert!(!state.observe(Coordinate3::new(0.1, 0.0, 0.0)));
        assert!(!state.observe(Coordinate3::new(0.2, 0.0, 0.0)));
        assert_eq!(state.consecutive(), 2);
        assert!(!state.observe(Coordinate3::new(5.0, 0.0, 0.0)));
        assert_eq!(state.consecutive(), 0);
    }

    #[test]
    fn fires_on_max_consecutive() {
        let mut state = StallState::new(Coordinate3::ORIGIN, 0.5, 2);
        assert!(!state.observe(Coordinate3::ORIGIN));
        assert!(state.observe(Coordinate3::ORIGIN));
    }

    #[tokio::test(start_paused = true)]
    async fn stationary_agent_stalls_after_five_samples() {
        let sim = Simulation::new();
        let config = StallConfig::default();
        let started = Instant::now();

        let samples = ProgressMonitor::new(&config, Coordinate3::ORIGIN)
            .run(&sim)
            .await;

        assert_eq!(samples, 5);
        assert_eq!(started.elapsed(), Duration::from_millis(10_000));
    }
}
