//! Live page driver backed by a headless Chrome over CDP.
//!
//! Post nodes are addressed by their position in
//! `document.querySelectorAll(container)`. The feed only appends while
//! scrolling, so positions collected after the crawl stay valid.

use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use leadfeed_core::AppConfig;
use serde_json::Value;

use crate::driver::{PageDriver, PostNode};
use crate::error::DriverError;
use crate::session::SessionState;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// headless_chrome's own per-call timeout, restored after bounded clicks.
const TAB_DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Kill the browser only if nothing talks to it for this long.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub user_agent: String,
    pub window_size: (u32, u32),
}

impl BrowserOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            window_size: (1920, 1080),
        }
    }
}

pub struct ChromeDriver {
    // Dropping the browser closes the tab, so it lives as long as the driver.
    _browser: Browser,
    tab: Arc<Tab>,
}

fn browser_err(e: impl std::fmt::Display) -> DriverError {
    DriverError::Browser(format!("{e:#}"))
}

/// Quotes `s` as a JavaScript string literal.
fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn as_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl ChromeDriver {
    /// Starts a browser and opens a single tab.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Browser`] if Chrome cannot be launched.
    pub fn launch(options: &BrowserOptions) -> Result<Self, DriverError> {
        let user_agent_arg = format!("--user-agent={}", options.user_agent);
        let args = vec![
            OsStr::new(user_agent_arg.as_str()),
            OsStr::new("--disable-blink-features=AutomationControlled"),
        ];

        let browser = Browser::new(LaunchOptions {
            headless: options.headless,
            window_size: Some(options.window_size),
            idle_browser_timeout: BROWSER_IDLE_TIMEOUT,
            args,
            ..Default::default()
        })
        .map_err(browser_err)?;

        let tab = browser.new_tab().map_err(browser_err)?;
        tracing::info!(headless = options.headless, "browser launched");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Installs the saved session cookies. Returns how many were accepted;
    /// rejected cookies are logged and skipped.
    pub fn apply_session(&self, session: &SessionState) -> usize {
        let mut applied = 0;
        for cookie in &session.cookies {
            let same_site = match cookie.same_site.as_deref() {
                Some(s) if s.eq_ignore_ascii_case("strict") => Some(Network::CookieSameSite::Strict),
                Some(s) if s.eq_ignore_ascii_case("lax") => Some(Network::CookieSameSite::Lax),
                Some(s) if s.eq_ignore_ascii_case("none") => Some(Network::CookieSameSite::None),
                _ => None,
            };

            let result = self.tab.call_method(Network::SetCookie {
                name: cookie.name.clone(),
                value: cookie.value.clone(),
                url: None,
                domain: Some(cookie.domain.clone()),
                path: Some(cookie.path.clone()),
                secure: Some(cookie.secure),
                http_only: Some(cookie.http_only),
                same_site,
                expires: cookie.expiry(),
                priority: None,
                same_party: None,
                source_scheme: None,
                source_port: None,
                partition_key: None,
            });

            match result {
                Ok(_) => applied += 1,
                Err(e) => tracing::warn!(cookie = %cookie.name, error = %e, "session cookie rejected"),
            }
        }
        tracing::info!(applied, total = session.cookies.len(), "session cookies installed");
        applied
    }

    fn eval(&self, expression: &str) -> Result<Option<Value>, DriverError> {
        let object = self.tab.evaluate(expression, false).map_err(browser_err)?;
        Ok(object.value)
    }
}

impl PageDriver for ChromeDriver {
    type Node = ChromeNode;

    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| DriverError::Timeout {
                what: format!("navigation to {url} ({e})"),
                timeout_ms: millis(timeout),
            })
    }

    /// Polls until the document is complete and the resource count holds
    /// steady across one poll interval.
    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        let mut last: Option<i64> = None;

        loop {
            let probe = self.eval(
                "document.readyState === 'complete' \
                 ? performance.getEntriesByType('resource').length : -1",
            )?;
            let count = probe.and_then(|v| v.as_i64()).unwrap_or(-1);

            if count >= 0 && last == Some(count) {
                return Ok(());
            }
            last = Some(count);

            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: "network idle".to_string(),
                    timeout_ms: millis(timeout),
                });
            }
            thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    fn query_all(&mut self, selector: &str) -> Result<Vec<ChromeNode>, DriverError> {
        let count = self
            .eval(&format!(
                "document.querySelectorAll({}).length",
                js_str(selector)
            ))?
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok((0..usize::try_from(count).unwrap_or(0))
            .map(|index| ChromeNode {
                tab: Arc::clone(&self.tab),
                container: selector.to_string(),
                index,
            })
            .collect())
    }

    fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.eval("window.scrollTo(0, document.body.scrollHeight);")?;
        Ok(())
    }

    fn scroll_height(&mut self) -> Result<u64, DriverError> {
        let value = self.eval("document.body.scrollHeight")?;
        value
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| DriverError::Browser(format!("unexpected scrollHeight {value:?}")))
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.tab.get_url())
    }

    fn body_text(&mut self) -> Result<String, DriverError> {
        Ok(as_string(self.eval("document.body ? document.body.innerText : ''")?).unwrap_or_default())
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(browser_err)
    }

    fn content(&mut self) -> Result<String, DriverError> {
        self.tab.get_content().map_err(browser_err)
    }

    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// The `index`-th match of `container` in the live document.
pub struct ChromeNode {
    tab: Arc<Tab>,
    container: String,
    index: usize,
}

impl ChromeNode {
    /// Wraps `body` in a function that binds `root` to this container, or
    /// returns `null` when the container is gone.
    fn scoped(&self, body: &str) -> String {
        format!(
            "(() => {{ const root = document.querySelectorAll({})[{}]; \
             if (!root) return null; {body} }})()",
            js_str(&self.container),
            self.index
        )
    }

    fn eval(&self, expression: &str) -> Result<Option<Value>, DriverError> {
        let object = self.tab.evaluate(expression, false).map_err(browser_err)?;
        Ok(object.value)
    }
}

impl PostNode for ChromeNode {
    fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        let script = self.scoped(&format!("return root.getAttribute({});", js_str(name)));
        Ok(as_string(self.eval(&script)?))
    }

    fn text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let script = self.scoped(&format!(
            "const el = root.querySelector({}); return el ? el.innerText : null;",
            js_str(selector)
        ));
        Ok(as_string(self.eval(&script)?))
    }

    fn attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, DriverError> {
        let script = self.scoped(&format!(
            "const el = root.querySelector({}); return el ? el.getAttribute({}) : null;",
            js_str(selector),
            js_str(attribute)
        ));
        Ok(as_string(self.eval(&script)?))
    }

    fn click(&self, selector: &str, timeout: Duration) -> Result<bool, DriverError> {
        let script = self.scoped(&format!(
            "const el = root.querySelector({}); if (!el) return false; \
             const box = el.getBoundingClientRect(); const style = window.getComputedStyle(el); \
             if (box.width === 0 || box.height === 0 || style.visibility === 'hidden' \
                 || style.display === 'none') return false; \
             el.click(); return true;",
            js_str(selector)
        ));

        self.tab.set_default_timeout(timeout);
        let clicked = self.eval(&script);
        self.tab.set_default_timeout(TAB_DEFAULT_TIMEOUT);

        Ok(matches!(clicked?, Some(Value::Bool(true))))
    }
}
