//! Challenge-resolution engine for grid-based image verification widgets.
//!
//! The engine drives the full "pick all tiles containing X" flow against a
//! live widget: it classifies which challenge variant is on screen, maps
//! object-detector output onto the tile grid, re-composites tiles that the
//! widget regenerates mid-challenge, and sequences a bounded retry and
//! verification loop around the whole thing.
//!
//! The browser session, the detector, and the image fetcher are
//! collaborators supplied by the caller through the traits in [`ports`];
//! this crate never creates a session, loads a model, or moves raw bytes
//! itself.
//!
//! ```no_run
//! # use grid_challenge_loop::{ChallengeEngine, EngineConfig};
//! # fn demo<B, D, F>(browser: B, detector: D, fetcher: F) -> anyhow::Result<()>
//! # where
//! #     B: grid_challenge_loop::ports::BrowserPort,
//! #     D: grid_challenge_loop::ports::Detector,
//! #     F: grid_challenge_loop::ports::ImageFetcher,
//! # {
//! let mut engine = ChallengeEngine::new(browser, detector, fetcher, EngineConfig::default());
//! let report = engine.solve()?;
//! println!("{}", report.to_json());
//! # Ok(())
//! # }
//! ```

pub mod canvas;
pub mod challenge;
pub mod config;
pub mod engine;
pub mod error;
pub mod navigator;
pub mod pacing;
pub mod ports;
pub mod report;
pub mod solver;

pub use canvas::{refresh_complete, Canvas, ImageUrlSet};
pub use challenge::{classify_instruction, Challenge, TargetClass, Variant};
pub use config::EngineConfig;
pub use engine::ChallengeEngine;
pub use error::{CanvasError, PortError, SolveError};
pub use pacing::{NoPacing, NormalPacing, Pacing, Pause};
pub use report::{SolveOutcome, SolveReport};
pub use solver::{centroid_tiles, judged_solved, overlap_tiles, solve_grid, BoundingBox, Detection};
