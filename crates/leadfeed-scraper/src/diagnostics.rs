//! Debug artifacts written when a crawl cannot find posts.
//!
//! Each capture writes a PNG snapshot and the raw markup, both stamped with
//! the stage and local time, so selector drift can be triaged offline. Write
//! failures are logged and never abort the crawl.

use std::path::PathBuf;

use chrono::Local;

use crate::driver::PageDriver;

#[derive(Debug, Clone)]
pub struct DiagnosticsWriter {
    dir: PathBuf,
}

impl DiagnosticsWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `debug_screenshot_<stage>_<ts>.png` and
    /// `debug_page_content_<stage>_<ts>.html`, returning the paths that were
    /// actually written.
    pub fn capture<D: PageDriver>(&self, driver: &mut D, stage: &str) -> Vec<PathBuf> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut written = Vec::new();

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::error!(dir = %self.dir.display(), error = %e, "cannot create debug directory");
            return written;
        }

        match driver.current_url() {
            Ok(url) => tracing::info!(stage, url = %url, "capturing diagnostics"),
            Err(e) => tracing::info!(stage, error = %e, "capturing diagnostics; current url unknown"),
        }

        let screenshot_path = self.dir.join(format!("debug_screenshot_{stage}_{stamp}.png"));
        match driver.screenshot() {
            Ok(png) => match std::fs::write(&screenshot_path, png) {
                Ok(()) => {
                    tracing::info!(path = %screenshot_path.display(), "saved screenshot");
                    written.push(screenshot_path);
                }
                Err(e) => tracing::error!(
                    path = %screenshot_path.display(),
                    error = %e,
                    "failed to write screenshot"
                ),
            },
            Err(e) => tracing::warn!(stage, error = %e, "screenshot unavailable"),
        }

        let html_path = self.dir.join(format!("debug_page_content_{stage}_{stamp}.html"));
        match driver.content() {
            Ok(html) => match std::fs::write(&html_path, html) {
                Ok(()) => {
                    tracing::info!(path = %html_path.display(), "saved page html");
                    written.push(html_path);
                }
                Err(e) => tracing::error!(
                    path = %html_path.display(),
                    error = %e,
                    "failed to write page html"
                ),
            },
            Err(e) => tracing::warn!(stage, error = %e, "page html unavailable"),
        }

        written
    }
}
