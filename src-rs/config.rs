//! Engine configuration: per-step timeouts and explicit retry bounds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable timeouts and bounds for one [`ChallengeEngine`](crate::ChallengeEngine).
///
/// Every waiting interaction with the widget is bounded by one of these
/// timeouts, and every retry loop by one of the `max_*` counters, so a run
/// always terminates with either a report or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wait for a challenge surface (iframe) to appear.
    pub frame_timeout_secs: u64,
    /// Wait for an element inside a surface to appear.
    pub element_timeout_secs: u64,
    /// Short probe for the solved indicator right after the consent click.
    pub solved_probe_timeout_secs: u64,
    /// Probe for the solved indicator after pressing verify.
    pub verify_probe_timeout_secs: u64,
    /// Reload / re-verify cycles allowed before giving up on the widget.
    pub max_solve_attempts: u32,
    /// Tile-source reads allowed while waiting for replaced tiles to load.
    pub max_refresh_polls: u32,
    /// Fetch-and-paste rounds allowed per compositing pass.
    pub max_composite_retries: u32,
    /// Select/refresh/re-detect rounds allowed on a regenerating grid.
    pub max_dynamic_rounds: u32,
    /// Pause between tile-source reads while polling for a refresh.
    pub refresh_poll_pause_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            frame_timeout_secs: 20,
            element_timeout_secs: 10,
            solved_probe_timeout_secs: 3,
            verify_probe_timeout_secs: 4,
            max_solve_attempts: 12,
            max_refresh_polls: 40,
            max_composite_retries: 5,
            max_dynamic_rounds: 20,
            refresh_poll_pause_ms: 250,
        }
    }
}

impl EngineConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn solved_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.solved_probe_timeout_secs)
    }

    pub fn verify_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_probe_timeout_secs)
    }

    pub fn refresh_poll_pause(&self) -> Duration {
        Duration::from_millis(self.refresh_poll_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_widget_wait_windows() {
        let config = EngineConfig::default();
        assert_eq!(config.frame_timeout(), Duration::from_secs(20));
        assert_eq!(config.solved_probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.verify_probe_timeout(), Duration::from_secs(4));
        assert!(config.max_solve_attempts > 0);
    }

    #[test]
    fn partial_json_fills_remaining_fields_from_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_solve_attempts": 3, "refresh_poll_pause_ms": 5}"#)
                .unwrap();
        assert_eq!(config.max_solve_attempts, 3);
        assert_eq!(config.refresh_poll_pause_ms, 5);
        assert_eq!(config.element_timeout_secs, 10);
    }
}
