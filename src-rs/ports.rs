//! Capability contracts for the external collaborators.
//!
//! The engine drives a live browser surface, an object detector, and an image
//! fetcher, but owns none of them: the caller constructs each collaborator
//! and hands it in. All contracts are synchronous and blocking; waits are
//! expressed through the timeout passed to each lookup.

use std::time::Duration;

use image::RgbImage;

use crate::error::PortError;
use crate::solver::Detection;

/// Browser automation surface.
///
/// Locators are opaque XPath-equivalent selectors against a live DOM-like
/// tree. `find`/`find_all` block until a match appears or the timeout
/// elapses; presence waits are folded into that timeout rather than exposed
/// as a separate predicate wait.
pub trait BrowserPort {
    /// Handle to a located element, valid until the node detaches.
    type Element: Clone;

    fn navigate(&mut self, url: &str) -> Result<(), PortError>;

    fn find(&mut self, locator: &str, timeout: Duration) -> Result<Self::Element, PortError>;

    fn find_all(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> Result<Vec<Self::Element>, PortError>;

    fn click(&mut self, element: &Self::Element) -> Result<(), PortError>;

    fn text(&mut self, element: &Self::Element) -> Result<String, PortError>;

    /// Reads an attribute; `Ok(None)` when the attribute is absent,
    /// [`PortError::Stale`] when the node detached since it was located.
    fn attr(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>, PortError>;

    fn switch_to_frame(&mut self, element: &Self::Element) -> Result<(), PortError>;

    fn switch_to_default_content(&mut self) -> Result<(), PortError>;
}

/// Object detector over a decoded challenge image.
///
/// Deterministic given identical pixels and weights; class ids agree with
/// [`TargetClass::class_id`](crate::challenge::TargetClass::class_id). The
/// detector is constructed by the caller and injected once, never loaded
/// lazily inside the engine.
pub trait Detector {
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

/// Synchronous byte retrieval for tile and grid images. Failures are
/// recoverable at the call site and trigger a re-fetch, not an abort.
pub trait ImageFetcher {
    fn fetch(&mut self, url: &str) -> anyhow::Result<Vec<u8>>;
}
