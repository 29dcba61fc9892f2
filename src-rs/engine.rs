//! The challenge-resolution loop: an explicit state machine sequencing
//! classify → solve → select → verify, with bounded recovery for every
//! transient condition the widget produces.

use std::collections::BTreeSet;
use std::thread;

use tracing::{debug, info, warn};

use crate::canvas::{self, Canvas, ImageUrlSet};
use crate::challenge::{classify_instruction, Challenge, Variant};
use crate::config::EngineConfig;
use crate::error::{PortError, SolveError};
use crate::navigator::{self, Surface};
use crate::pacing::{NoPacing, NormalPacing, Pacing, Pause};
use crate::ports::{BrowserPort, Detector, ImageFetcher};
use crate::report::{timestamp_iso, SolveOutcome, SolveReport};
use crate::solver::{self, centroid_tiles};

const CHECKBOX: &str = r#"//div[@class="recaptcha-checkbox-border"]"#;
const SOLVED_INDICATOR: &str = r#"//span[contains(@aria-checked, "true")]"#;
const RELOAD_BUTTON: &str = r#"//button[@id="recaptcha-reload-button"]"#;
const VERIFY_BUTTON: &str = r#"//button[@id="recaptcha-verify-button"]"#;
const INSTRUCTION_BANNER: &str = r#"//div[@id="rc-imageselect"]"#;
const INSTRUCTION_TARGET: &str = r#"//div[@id="rc-imageselect"]//strong"#;
const TILE_IMAGES: &str = r#"//div[@id="rc-imageselect-target"]//img"#;

fn tile_locator(index: u32) -> String {
    format!(r#"(//div[@id="rc-imageselect-target"]//td)[{index}]"#)
}

/// Why the engine asked the widget for a fresh challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReloadReason {
    UnrecognizedTarget,
    UnsolvableGrid,
    RefreshStalled,
    FetchFailed,
    WidgetNotReady,
}

impl ReloadReason {
    fn as_str(self) -> &'static str {
        match self {
            ReloadReason::UnrecognizedTarget => "unrecognized_target",
            ReloadReason::UnsolvableGrid => "unsolvable_grid",
            ReloadReason::RefreshStalled => "refresh_stalled",
            ReloadReason::FetchFailed => "fetch_failed",
            ReloadReason::WidgetNotReady => "widget_not_ready",
        }
    }
}

/// Outcome of one state-machine step that did not advance.
enum StepError {
    /// Give up on this challenge instance and request a fresh one.
    Reload(ReloadReason),
    /// Unrecoverable; abort the run.
    Fatal(SolveError),
}

fn step_err(err: PortError) -> StepError {
    match err {
        PortError::NotFound { .. } | PortError::Stale => {
            StepError::Reload(ReloadReason::WidgetNotReady)
        }
        PortError::Backend(inner) => StepError::Fatal(SolveError::Backend(inner)),
    }
}

/// Working data carried through one challenge instance.
struct ChallengeCycle {
    challenge: Challenge,
    canvas: Canvas,
    urls: ImageUrlSet,
    tiles: BTreeSet<u32>,
}

/// Named states of the resolution loop. Each variant owns exactly the data
/// its step needs, so no state can observe another's leftovers.
enum Phase {
    Classifying,
    Solving(ChallengeCycle),
    Selecting(ChallengeCycle),
    Verifying(Challenge),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Classifying => "classifying",
            Phase::Solving(_) => "solving",
            Phase::Selecting(_) => "selecting",
            Phase::Verifying(_) => "verifying",
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    reloads: u32,
    tiles_clicked: u32,
    detection_passes: u32,
    variant: Option<&'static str>,
    target: Option<&'static str>,
}

impl RunStats {
    fn report(&self, outcome: SolveOutcome, attempts: u32) -> SolveReport {
        SolveReport {
            outcome,
            attempts,
            reloads: self.reloads,
            variant: self.variant,
            target: self.target,
            tiles_clicked: self.tiles_clicked,
            detection_passes: self.detection_passes,
            solved_at: timestamp_iso(),
        }
    }
}

/// Drives one verification widget to a solved state.
///
/// All collaborators are injected; the engine owns only the loop, the
/// working canvas, and the retry accounting. Construction with [`new`]
/// applies the default human-pacing policy; [`with_pacing`] swaps it out.
///
/// [`new`]: ChallengeEngine::new
/// [`with_pacing`]: ChallengeEngine::with_pacing
pub struct ChallengeEngine<B, D, F, P = NormalPacing> {
    browser: B,
    detector: D,
    fetcher: F,
    pacing: P,
    config: EngineConfig,
}

impl<B, D, F> ChallengeEngine<B, D, F, NormalPacing>
where
    B: BrowserPort,
    D: Detector,
    F: ImageFetcher,
{
    pub fn new(browser: B, detector: D, fetcher: F, config: EngineConfig) -> Self {
        Self::with_pacing(browser, detector, fetcher, NormalPacing, config)
    }
}

impl<B, D, F> ChallengeEngine<B, D, F, NoPacing>
where
    B: BrowserPort,
    D: Detector,
    F: ImageFetcher,
{
    /// Engine without pacing delays, for tests and offline tuning.
    pub fn unpaced(browser: B, detector: D, fetcher: F, config: EngineConfig) -> Self {
        Self::with_pacing(browser, detector, fetcher, NoPacing, config)
    }
}

impl<B, D, F, P> ChallengeEngine<B, D, F, P>
where
    B: BrowserPort,
    D: Detector,
    F: ImageFetcher,
    P: Pacing,
{
    pub fn with_pacing(
        browser: B,
        detector: D,
        fetcher: F,
        pacing: P,
        config: EngineConfig,
    ) -> Self {
        ChallengeEngine {
            browser,
            detector,
            fetcher,
            pacing,
            config,
        }
    }

    /// Hands the browser session back once the widget is solved.
    pub fn into_browser(self) -> B {
        self.browser
    }

    /// Runs the full resolution loop against the page currently loaded in
    /// the browser session.
    ///
    /// Returns a [`SolveReport`] when the widget reports solved, or a
    /// [`SolveError`] once the surface is missing, a collaborator fails
    /// unrecoverably, or the attempt budget runs out.
    pub fn solve(&mut self) -> Result<SolveReport, SolveError> {
        let mut stats = RunStats::default();
        let mut attempts: u32 = 0;

        navigator::enter(&mut self.browser, Surface::Checkbox, self.config.frame_timeout())?;
        let checkbox = match self.browser.find(CHECKBOX, self.config.element_timeout()) {
            Ok(el) => el,
            Err(PortError::NotFound { .. }) => {
                return Err(SolveError::SurfaceMissing {
                    surface: "consent checkbox",
                    timeout: self.config.element_timeout(),
                })
            }
            Err(err) => return Err(SolveError::from_port(err)),
        };
        self.browser.click(&checkbox).map_err(SolveError::from_port)?;

        if self.solved_probe(self.config.solved_probe_timeout())? {
            info!("widget reported solved without showing a challenge");
            return Ok(stats.report(SolveOutcome::SolvedWithoutChallenge, attempts));
        }

        let mut phase = Phase::Classifying;
        loop {
            debug!(phase = phase.name(), attempts, "loop step");
            phase = match phase {
                Phase::Classifying => match self.classify_step(&mut stats) {
                    Ok(cycle) => Phase::Solving(cycle),
                    Err(step) => self.recover(step, &mut attempts, &mut stats)?,
                },
                Phase::Solving(mut cycle) => match self.solving_step(&mut cycle, &mut stats) {
                    Ok(()) => Phase::Selecting(cycle),
                    Err(step) => self.recover(step, &mut attempts, &mut stats)?,
                },
                Phase::Selecting(mut cycle) => match self.selecting_step(&mut cycle, &mut stats) {
                    Ok(()) => Phase::Verifying(cycle.challenge),
                    Err(step) => self.recover(step, &mut attempts, &mut stats)?,
                },
                Phase::Verifying(challenge) => match self.verifying_step() {
                    Ok(true) => {
                        info!(
                            variant = challenge.variant.as_str(),
                            attempts, "challenge verified"
                        );
                        return Ok(stats.report(SolveOutcome::Solved, attempts));
                    }
                    Ok(false) => {
                        self.count_attempt(&mut attempts)?;
                        debug!("verification not confirmed; expecting a replacement challenge");
                        Phase::Classifying
                    }
                    Err(step) => self.recover(step, &mut attempts, &mut stats)?,
                },
            };
        }
    }

    /// Enters the challenge frame, reads the instruction, and prepares the
    /// working canvas for the new challenge instance.
    fn classify_step(&mut self, stats: &mut RunStats) -> Result<ChallengeCycle, StepError> {
        navigator::enter(&mut self.browser, Surface::Challenge, self.config.frame_timeout())
            .map_err(StepError::Fatal)?;

        let banner_el = self.find_step(INSTRUCTION_BANNER)?;
        let banner = self.browser.text(&banner_el).map_err(step_err)?;
        let target_el = self.find_step(INSTRUCTION_TARGET)?;
        let instruction = self.browser.text(&target_el).map_err(step_err)?;

        let (target, variant) = classify_instruction(&instruction, &banner);
        let Some(target) = target else {
            debug!(instruction = instruction.as_str(), "no known term in instruction");
            return Err(StepError::Reload(ReloadReason::UnrecognizedTarget));
        };
        let challenge = Challenge { target, variant };
        info!(
            term = target.term(),
            variant = variant.as_str(),
            "classified challenge"
        );
        stats.variant = Some(variant.as_str());
        stats.target = Some(target.term());

        let urls = match self.read_tile_urls()? {
            Some(urls) => urls,
            None => return Err(StepError::Reload(ReloadReason::WidgetNotReady)),
        };
        let Some(grid_url) = urls.first() else {
            return Err(StepError::Reload(ReloadReason::WidgetNotReady));
        };
        let bytes = match self.fetcher.fetch(grid_url) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "grid image fetch failed");
                return Err(StepError::Reload(ReloadReason::FetchFailed));
            }
        };
        let canvas = match Canvas::from_bytes(&bytes) {
            Ok(canvas) => canvas,
            Err(err) => {
                warn!(error = %err, "grid image did not decode");
                return Err(StepError::Reload(ReloadReason::FetchFailed));
            }
        };
        if canvas.size() != variant.canvas_size() {
            warn!(
                got = canvas.size(),
                want = variant.canvas_size(),
                "challenge image size differs from the variant's grid"
            );
        }

        Ok(ChallengeCycle {
            challenge,
            canvas,
            urls,
            tiles: BTreeSet::new(),
        })
    }

    /// Runs the variant's grid mapper and applies the solvability floor.
    fn solving_step(
        &mut self,
        cycle: &mut ChallengeCycle,
        stats: &mut RunStats,
    ) -> Result<(), StepError> {
        let detections = self
            .detector
            .detect(cycle.canvas.image())
            .map_err(|err| StepError::Fatal(SolveError::Backend(err)))?;
        stats.detection_passes += 1;

        let tiles =
            solver::solve_grid(&detections, cycle.challenge.target, cycle.challenge.variant);
        debug!(?tiles, "grid mapped");
        if !solver::judged_solved(cycle.challenge.variant, tiles.len()) {
            return Err(StepError::Reload(ReloadReason::UnsolvableGrid));
        }
        cycle.tiles = tiles;
        Ok(())
    }

    /// Clicks the solved tile set; the dynamic variant then loops through
    /// refresh → composite → re-detect until the grid is exhausted.
    fn selecting_step(
        &mut self,
        cycle: &mut ChallengeCycle,
        stats: &mut RunStats,
    ) -> Result<(), StepError> {
        let first_pause = match cycle.challenge.variant {
            Variant::Dynamic => Pause::TileClick,
            Variant::Selection | Variant::Squares => Pause::Step,
        };
        self.click_tiles(&cycle.tiles, first_pause, stats)?;

        if cycle.challenge.variant == Variant::Dynamic {
            self.dynamic_rounds(cycle, stats)?;
        }
        Ok(())
    }

    /// The regenerating-grid inner loop. Each round waits for every selected
    /// tile's source to change, composites the replacements onto the canvas,
    /// re-detects, and clicks whatever remains. A grid still producing
    /// matches after the round budget is treated like a stalled refresh.
    fn dynamic_rounds(
        &mut self,
        cycle: &mut ChallengeCycle,
        stats: &mut RunStats,
    ) -> Result<(), StepError> {
        for _ in 0..self.config.max_dynamic_rounds {
            let before = cycle.urls.clone();
            cycle.urls = self.wait_for_refresh(&cycle.tiles, &before)?;
            self.composite_selected(cycle, &before)?;

            let detections = self
                .detector
                .detect(cycle.canvas.image())
                .map_err(|err| StepError::Fatal(SolveError::Backend(err)))?;
            stats.detection_passes += 1;

            let next = centroid_tiles(&detections, cycle.challenge.target);
            if next.is_empty() {
                debug!("no targets left on the regenerated grid");
                return Ok(());
            }
            debug!(tiles = ?next, "regenerated tiles still match");
            cycle.tiles = next;
            self.click_tiles(&cycle.tiles, Pause::TileRecheck, stats)?;
        }
        warn!(
            rounds = self.config.max_dynamic_rounds,
            "regenerating grid never exhausted"
        );
        Err(StepError::Reload(ReloadReason::RefreshStalled))
    }

    /// Polls the per-tile sources until every selected tile has been
    /// replaced, up to the configured poll budget.
    fn wait_for_refresh(
        &mut self,
        selected: &BTreeSet<u32>,
        before: &[String],
    ) -> Result<ImageUrlSet, StepError> {
        for _ in 0..self.config.max_refresh_polls {
            if let Some(current) = self.read_tile_urls()? {
                if canvas::refresh_complete(selected, before, &current) {
                    return Ok(current);
                }
            }
            thread::sleep(self.config.refresh_poll_pause());
        }
        warn!(polls = self.config.max_refresh_polls, "replaced tiles never loaded");
        Err(StepError::Reload(ReloadReason::RefreshStalled))
    }

    /// Fetches each selected tile's replacement and pastes it onto the
    /// canvas. A failed fetch or decode re-runs the refresh wait and tries
    /// again, up to the configured retry budget.
    fn composite_selected(
        &mut self,
        cycle: &mut ChallengeCycle,
        before: &[String],
    ) -> Result<(), StepError> {
        let mut retries = 0;
        loop {
            match self.try_composite(cycle) {
                Ok(()) => return Ok(()),
                Err(err) if retries < self.config.max_composite_retries => {
                    retries += 1;
                    warn!(error = %err, retries, "tile composite failed; re-reading tiles");
                    cycle.urls = self.wait_for_refresh(&cycle.tiles, before)?;
                }
                Err(err) => {
                    warn!(error = %err, "tile composite exhausted its retries");
                    return Err(StepError::Reload(ReloadReason::FetchFailed));
                }
            }
        }
    }

    fn try_composite(&mut self, cycle: &mut ChallengeCycle) -> anyhow::Result<()> {
        use anyhow::Context;
        for &index in &cycle.tiles {
            let url = cycle
                .urls
                .get((index - 1) as usize)
                .with_context(|| format!("no source for tile {index}"))?;
            let bytes = self
                .fetcher
                .fetch(url)
                .with_context(|| format!("tile {index} fetch failed"))?;
            cycle
                .canvas
                .paste_tile_bytes(index, &bytes)
                .with_context(|| format!("tile {index} paste failed"))?;
        }
        Ok(())
    }

    /// Presses verify after the long hesitation, then probes for the solved
    /// indicator. `Ok(false)` means a replacement challenge appeared.
    fn verifying_step(&mut self) -> Result<bool, StepError> {
        let verify = self.find_step(VERIFY_BUTTON)?;
        self.pacing.pause(Pause::Verify);
        self.browser.click(&verify).map_err(step_err)?;
        self.solved_probe(self.config.verify_probe_timeout())
            .map_err(StepError::Fatal)
    }

    /// Enters the checkbox surface and looks for the solved indicator.
    /// Leaves the context at the top level when the indicator is present.
    fn solved_probe(&mut self, timeout: std::time::Duration) -> Result<bool, SolveError> {
        navigator::enter(&mut self.browser, Surface::Checkbox, self.config.frame_timeout())?;
        match self.browser.find(SOLVED_INDICATOR, timeout) {
            Ok(_) => {
                self.browser
                    .switch_to_default_content()
                    .map_err(SolveError::from_port)?;
                Ok(true)
            }
            Err(PortError::NotFound { .. }) => Ok(false),
            Err(err) => Err(SolveError::from_port(err)),
        }
    }

    fn click_tiles(
        &mut self,
        tiles: &BTreeSet<u32>,
        pause: Pause,
        stats: &mut RunStats,
    ) -> Result<(), StepError> {
        for &index in tiles {
            let element = self.find_step(&tile_locator(index))?;
            self.browser.click(&element).map_err(step_err)?;
            stats.tiles_clicked += 1;
            self.pacing.pause(pause);
        }
        Ok(())
    }

    /// Reads the per-tile source identifiers. `Ok(None)` signals a stale
    /// read mid-scan: the grid re-rendered underneath us and the whole read
    /// must be retried.
    fn read_tile_urls(&mut self) -> Result<Option<ImageUrlSet>, StepError> {
        let images = self
            .browser
            .find_all(TILE_IMAGES, self.config.element_timeout())
            .map_err(step_err)?;
        let mut urls = Vec::with_capacity(images.len());
        for image in &images {
            match self.browser.attr(image, "src") {
                Ok(url) => urls.push(url.unwrap_or_default()),
                Err(PortError::Stale) => return Ok(None),
                Err(err) => return Err(step_err(err)),
            }
        }
        Ok(Some(urls))
    }

    fn find_step(&mut self, locator: &str) -> Result<B::Element, StepError> {
        self.browser
            .find(locator, self.config.element_timeout())
            .map_err(step_err)
    }

    /// Consumes one unit of the retry budget; clicking the reload control is
    /// the caller's job where a fresh challenge must be requested.
    fn count_attempt(&self, attempts: &mut u32) -> Result<(), SolveError> {
        if *attempts >= self.config.max_solve_attempts {
            return Err(SolveError::AttemptsExhausted { attempts: *attempts });
        }
        *attempts += 1;
        Ok(())
    }

    /// Central recovery: fatal errors abort, reloads consume an attempt,
    /// click the reload control, and re-enter classification.
    fn recover(
        &mut self,
        step: StepError,
        attempts: &mut u32,
        stats: &mut RunStats,
    ) -> Result<Phase, SolveError> {
        match step {
            StepError::Fatal(err) => Err(err),
            StepError::Reload(reason) => {
                self.count_attempt(attempts)?;
                stats.reloads += 1;
                info!(
                    reason = reason.as_str(),
                    attempts = *attempts,
                    "requesting a fresh challenge"
                );
                self.pacing.pause(Pause::Step);
                let reload = self
                    .browser
                    .find(RELOAD_BUTTON, self.config.element_timeout())
                    .map_err(SolveError::from_port)?;
                self.browser.click(&reload).map_err(SolveError::from_port)?;
                Ok(Phase::Classifying)
            }
        }
    }
}
