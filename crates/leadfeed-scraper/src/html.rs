//! Offline page driver over saved markup.
//!
//! Replays a `debug_page_content_*.html` dump (or any saved feed page)
//! through the same crawler and extractor as a live browser, so selector
//! drift can be diagnosed without logging in anywhere.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::driver::{PageDriver, PostNode};
use crate::error::{DriverError, ScraperError};

pub struct HtmlPageDriver {
    markup: String,
    document: Html,
    url: String,
}

impl HtmlPageDriver {
    #[must_use]
    pub fn from_markup(markup: impl Into<String>) -> Self {
        let markup = markup.into();
        let document = Html::parse_document(&markup);
        Self {
            markup,
            document,
            url: "about:blank".to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Io`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ScraperError> {
        let markup = std::fs::read_to_string(path).map_err(|e| ScraperError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::from_markup(markup))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|_| DriverError::InvalidSelector {
        selector: selector.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    let raw = element.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl PageDriver for HtmlPageDriver {
    type Node = HtmlPostNode;

    fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.url = url.to_string();
        Ok(())
    }

    fn wait_for_network_idle(&mut self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    fn query_all(&mut self, selector: &str) -> Result<Vec<HtmlPostNode>, DriverError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .document
            .select(&selector)
            .map(HtmlPostNode::from_element)
            .collect())
    }

    fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Saved markup never grows, so the crawl stabilizes on the first reads.
    fn scroll_height(&mut self) -> Result<u64, DriverError> {
        Ok(u64::try_from(self.markup.len()).unwrap_or(u64::MAX))
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.url.clone())
    }

    fn body_text(&mut self) -> Result<String, DriverError> {
        Ok(element_text(self.document.root_element()))
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::Unsupported("screenshot"))
    }

    fn content(&mut self) -> Result<String, DriverError> {
        Ok(self.markup.clone())
    }

    fn pause(&mut self, _duration: Duration) {}
}

/// One post container cut out of saved markup.
#[derive(Debug)]
pub struct HtmlPostNode {
    attributes: HashMap<String, String>,
    fragment: Html,
}

impl HtmlPostNode {
    fn from_element(element: ElementRef<'_>) -> Self {
        let attributes = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            attributes,
            fragment: Html::parse_fragment(&element.html()),
        }
    }

    /// Parses `markup` and returns its first element as a post node.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidSelector`] if `markup` has no element.
    pub fn from_markup(markup: &str) -> Result<Self, DriverError> {
        let fragment = Html::parse_fragment(markup);
        let any = parse_selector("*")?;
        let node = fragment
            .select(&any)
            .find(|el| el.value().name() != "html")
            .map(Self::from_element);
        node.ok_or(DriverError::InvalidSelector {
            selector: "*".to_string(),
        })
    }

    fn first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, DriverError> {
        let selector = parse_selector(selector)?;
        Ok(self.fragment.select(&selector).next())
    }
}

impl PostNode for HtmlPostNode {
    fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.attributes.get(name).cloned())
    }

    fn text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        Ok(self.first(selector)?.map(element_text))
    }

    fn attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, DriverError> {
        Ok(self
            .first(selector)?
            .and_then(|el| el.value().attr(attribute).map(str::to_string)))
    }

    /// Static markup cannot be interacted with.
    fn click(&self, _selector: &str, _timeout: Duration) -> Result<bool, DriverError> {
        Ok(false)
    }
}
