//! Tagged error taxonomy for the challenge-resolution engine.
//!
//! Collaborator failures arrive as [`PortError`] values and are classified at
//! the call site: transient and policy conditions are handled inside the
//! engine loop, while anything unrecoverable surfaces as a [`SolveError`].

use std::time::Duration;

use thiserror::Error;

/// Failure reported by one of the collaborator ports.
#[derive(Debug, Error)]
pub enum PortError {
    /// No element matched the locator before the timeout elapsed.
    #[error("no element matched {locator:?} within {timeout:?}")]
    NotFound { locator: String, timeout: Duration },

    /// A previously located element's node detached from the live tree.
    #[error("element reference went stale")]
    Stale,

    /// Opaque backend failure (connection dropped, protocol error, ...).
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl PortError {
    pub fn not_found(locator: impl Into<String>, timeout: Duration) -> Self {
        PortError::NotFound {
            locator: locator.into(),
            timeout,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Failure while compositing onto the working canvas.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("could not decode image bytes: {0}")]
    Decode(#[source] image::ImageError),

    #[error("canvas is {got_w}x{got_h}, expected a {want}x{want} square")]
    CanvasSize { got_w: u32, got_h: u32, want: u32 },

    #[error("tile is {got_w}x{got_h}, expected {want}x{want}")]
    TileSize { got_w: u32, got_h: u32, want: u32 },

    #[error("tile index {index} is outside the {grid}x{grid} grid")]
    IndexOutOfGrid { index: u32, grid: u32 },
}

/// Terminal outcome of a solve attempt that did not end in success.
#[derive(Debug, Error)]
pub enum SolveError {
    /// A root challenge surface never appeared; fatal for this instance.
    #[error("challenge surface {surface:?} never appeared within {timeout:?}")]
    SurfaceMissing {
        surface: &'static str,
        timeout: Duration,
    },

    /// The bounded retry budget ran out before the widget reported solved.
    #[error("gave up after {attempts} challenge attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error(transparent)]
    Canvas(#[from] CanvasError),

    /// Unrecoverable collaborator failure, propagated instead of swallowed.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl SolveError {
    /// Wraps a port failure that no policy branch claimed.
    pub(crate) fn from_port(err: PortError) -> Self {
        match err {
            PortError::Backend(inner) => SolveError::Backend(inner),
            other => SolveError::Backend(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_not_found_formats_locator_and_timeout() {
        let err = PortError::not_found("//iframe", Duration::from_secs(20));
        let text = err.to_string();
        assert!(text.contains("//iframe"));
        assert!(text.contains("20s"));
        assert!(err.is_not_found());
    }

    #[test]
    fn backend_port_errors_pass_through_unwrapped() {
        let inner = anyhow::anyhow!("socket closed");
        let err = SolveError::from_port(PortError::Backend(inner));
        assert!(matches!(err, SolveError::Backend(_)));
        assert_eq!(err.to_string(), "socket closed");
    }
}
