//! Navigation into the widget's nested challenge surfaces.

use std::time::Duration;

use tracing::debug;

use crate::error::{PortError, SolveError};
use crate::ports::BrowserPort;

/// The two nested surfaces the widget exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// The consent checkbox frame, which also hosts the solved indicator.
    Checkbox,
    /// The image challenge frame.
    Challenge,
}

impl Surface {
    pub(crate) const fn locator(self) -> &'static str {
        match self {
            Surface::Checkbox => r#"//iframe[@title="reCAPTCHA"]"#,
            Surface::Challenge => r#"//iframe[contains(@title, "challenge")]"#,
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Surface::Checkbox => "checkbox",
            Surface::Challenge => "challenge",
        }
    }
}

/// Switches the automation context into `surface`.
///
/// Always resets to the top-level context first so repeated entries never
/// accumulate nested frame contexts. A surface that never appears within
/// `timeout` is fatal for this challenge instance and propagates as
/// [`SolveError::SurfaceMissing`].
pub fn enter<B: BrowserPort>(
    browser: &mut B,
    surface: Surface,
    timeout: Duration,
) -> Result<(), SolveError> {
    debug!(surface = surface.name(), "entering challenge surface");
    browser
        .switch_to_default_content()
        .map_err(SolveError::from_port)?;
    let frame = match browser.find(surface.locator(), timeout) {
        Ok(frame) => frame,
        Err(PortError::NotFound { .. }) => {
            return Err(SolveError::SurfaceMissing {
                surface: surface.name(),
                timeout,
            })
        }
        Err(err) => return Err(SolveError::from_port(err)),
    };
    browser.switch_to_frame(&frame).map_err(SolveError::from_port)
}
