//! Noticewatch Crawler
//!
//! Fetches board list pages, extracts same-day notices and filters them by
//! keyword. Nothing here touches the ledger or the notifier.

pub mod fetch;
pub mod filter;
pub mod parser;

pub use fetch::{HttpFetcher, PageFetcher, StaticFetcher};
pub use filter::KeywordFilter;
pub use parser::{parse_board, BoardExtractor, BoardPage, CompiledSchema};
