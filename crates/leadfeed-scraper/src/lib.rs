pub mod chrome;
pub mod crawler;
pub mod date;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod extract;
pub mod html;
pub mod session;

pub use chrome::{BrowserOptions, ChromeDriver, ChromeNode};
pub use crawler::{CrawlOutcome, CrawlState, CrawlerConfig, PageCrawler};
pub use date::normalize_posted_date;
pub use diagnostics::DiagnosticsWriter;
pub use driver::{PageDriver, PostNode};
pub use error::{DriverError, ScraperError};
pub use extract::{ErrorRecord, ExtractedPost, ExtractorConfig, FieldExtractor};
pub use html::{HtmlPageDriver, HtmlPostNode};
pub use session::{load_session, SessionCookie, SessionState};
