//! The seam between the crawler/extractor and whatever renders the page.
//!
//! [`crate::chrome::ChromeDriver`] drives a live headless browser;
//! [`crate::html::HtmlPageDriver`] replays a saved markup dump. Tests script
//! their own implementations.

use std::time::Duration;

use crate::error::DriverError;

/// A rendered search-results page.
pub trait PageDriver {
    type Node: PostNode;

    /// Loads `url` and waits for the navigation to commit.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the page does not load within `timeout`.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Blocks until the page has no in-flight network activity.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Timeout`] if activity does not settle in time.
    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), DriverError>;

    /// All elements matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the selector is invalid or the page is gone.
    fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Node>, DriverError>;

    /// # Errors
    ///
    /// Returns [`DriverError`] if the page cannot be scrolled.
    fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;

    /// Current `document.body.scrollHeight`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the height cannot be measured.
    fn scroll_height(&mut self) -> Result<u64, DriverError>;

    /// # Errors
    ///
    /// Returns [`DriverError`] if the page is gone.
    fn current_url(&mut self) -> Result<String, DriverError>;

    /// Visible text of the whole page.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the page is gone.
    fn body_text(&mut self) -> Result<String, DriverError>;

    /// PNG snapshot of the viewport.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the driver cannot render one.
    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Serialized markup of the current document.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the page is gone.
    fn content(&mut self) -> Result<String, DriverError>;

    /// Blocks for `duration`.
    fn pause(&mut self, duration: Duration);
}

/// One post container on the page.
///
/// Lookups are scoped to the container. `Ok(None)` means nothing matched;
/// errors are reserved for driver faults.
pub trait PostNode {
    /// An attribute of the container element itself.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] on a driver fault.
    fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;

    /// Rendered text of the first descendant matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] on a driver fault.
    fn text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// `attribute` of the first descendant matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] on a driver fault.
    fn attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, DriverError>;

    /// Clicks the first visible descendant matching `selector`.
    ///
    /// Returns `Ok(false)` when no such element is present or visible.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the click fails or exceeds `timeout`.
    fn click(&self, selector: &str, timeout: Duration) -> Result<bool, DriverError>;
}
