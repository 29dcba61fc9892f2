//! Human-pacing delays between user-visible widget interactions.
//!
//! The delays are timing camouflage, not correctness: each interaction kind
//! draws from a Normal distribution with its own mean and spread, clamped to
//! a floor so a lucky sample never produces a machine-fast click. The policy
//! is pluggable so tests can run without sleeping.

use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

use rand::Rng;

/// Shortest pause ever taken, in seconds.
pub const MIN_PAUSE_SECS: f64 = 0.1;

/// Interaction kinds with distinct pacing profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Generic pacing between steps (reloads, selection clicks).
    Step,
    /// First-pass tile click on the regenerating grid.
    TileClick,
    /// Re-click during a later pass over regenerated tiles.
    TileRecheck,
    /// The long hesitation before pressing verify.
    Verify,
}

impl Pause {
    /// (mean, sigma) of the pause duration in seconds.
    pub const fn profile(self) -> (f64, f64) {
        match self {
            Pause::Step => (0.3, 0.1),
            Pause::TileClick => (0.5, 0.2),
            Pause::TileRecheck => (0.5, 0.1),
            Pause::Verify => (2.0, 0.2),
        }
    }
}

/// Pacing policy applied between user-visible actions.
pub trait Pacing {
    fn pause(&mut self, pause: Pause);
}

/// Default policy: sleep for a floor-clamped Normal sample.
#[derive(Debug, Default)]
pub struct NormalPacing;

impl Pacing for NormalPacing {
    fn pause(&mut self, pause: Pause) {
        let (mu, sigma) = pause.profile();
        thread::sleep(Duration::from_secs_f64(sample_pause_secs(mu, sigma)));
    }
}

/// No-op policy for tests and headless tuning runs.
#[derive(Debug, Default)]
pub struct NoPacing;

impl Pacing for NoPacing {
    fn pause(&mut self, _pause: Pause) {}
}

fn sample_pause_secs(mu: f64, sigma: f64) -> f64 {
    let mut rng = rand::thread_rng();
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let gaussian = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    (mu + sigma * gaussian).max(MIN_PAUSE_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_finite_and_floor_clamped() {
        for _ in 0..2000 {
            let secs = sample_pause_secs(0.3, 0.1);
            assert!(secs.is_finite());
            assert!(secs >= MIN_PAUSE_SECS);
        }
    }

    #[test]
    fn extreme_negative_mean_still_respects_the_floor() {
        for _ in 0..100 {
            assert!(sample_pause_secs(-5.0, 0.1) >= MIN_PAUSE_SECS);
        }
    }

    #[test]
    fn samples_concentrate_around_the_mean() {
        let n = 4000;
        let total: f64 = (0..n).map(|_| sample_pause_secs(2.0, 0.2)).sum();
        let mean = total / f64::from(n);
        assert!((mean - 2.0).abs() < 0.1, "sample mean drifted: {mean}");
    }

    #[test]
    fn verify_pause_is_the_longest_profile() {
        let (verify_mu, _) = Pause::Verify.profile();
        for pause in [Pause::Step, Pause::TileClick, Pause::TileRecheck] {
            assert!(pause.profile().0 < verify_mu);
        }
    }
}
