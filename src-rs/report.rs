//! Solve-run summaries, serializable the same way every other payload in the
//! toolchain is.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

/// How a solve run ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveOutcome {
    /// The widget confirmed the solved indicator after verification.
    Solved,
    /// The widget self-reported solved right after the consent click,
    /// without ever showing a challenge.
    SolvedWithoutChallenge,
}

/// Summary of one completed solve run.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub outcome: SolveOutcome,
    /// Reload / re-verify cycles consumed beyond the first pass.
    pub attempts: u32,
    /// Fresh challenges requested via the reload control.
    pub reloads: u32,
    /// Variant of the challenge that ultimately verified, if any was shown.
    pub variant: Option<&'static str>,
    /// Instruction term of that challenge.
    pub target: Option<&'static str>,
    pub tiles_clicked: u32,
    pub detection_passes: u32,
    pub solved_at: String,
}

impl SolveReport {
    pub fn to_json(&self) -> Value {
        json!({
            "outcome": self.outcome,
            "attempts": self.attempts,
            "reloads": self.reloads,
            "variant": self.variant,
            "target": self.target,
            "tiles_clicked": self.tiles_clicked,
            "detection_passes": self.detection_passes,
            "solved_at": self.solved_at,
        })
    }
}

pub(crate) fn timestamp_iso() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_with_snake_case_outcome() {
        let report = SolveReport {
            outcome: SolveOutcome::SolvedWithoutChallenge,
            attempts: 0,
            reloads: 0,
            variant: None,
            target: None,
            tiles_clicked: 0,
            detection_passes: 0,
            solved_at: timestamp_iso(),
        };
        let payload = report.to_json();
        assert_eq!(payload["outcome"], "solved_without_challenge");
        assert_eq!(payload["tiles_clicked"], 0);
        assert!(payload["solved_at"].as_str().unwrap().contains('T'));
    }
}
