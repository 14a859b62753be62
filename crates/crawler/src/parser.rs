//! Board page parser
//!
//! Turns a board list page into same-day `Notice` records using the source's
//! `BoardSchema`. Row-level problems (missing link, unparsable date) only drop
//! or degrade that row; the rest of the page is still read.

use chrono::{DateTime, NaiveDate, Utc};
use noticewatch_common::config::{BoardSchema, SourceConfig};
use noticewatch_common::errors::{AppError, Result};
use noticewatch_common::models::{compose_notice_id, Notice, NoticeCategory};
use scraper::{ElementRef, Html, Selector};
use std::fmt::Write;
use tracing::{debug, trace};

/// `BoardSchema` with its selectors parsed
#[derive(Debug)]
pub struct CompiledSchema {
    container: Selector,
    rows: Selector,
    raw_id: Selector,
    title: Selector,
    link: Selector,
    date: Selector,
    date_format: String,
}

impl CompiledSchema {
    /// Parse every selector and check the date format; any failure is a configuration error
    pub fn compile(schema: &BoardSchema) -> Result<Self> {
        // Date-only values can't render time fields or unknown specifiers
        let mut rendered = String::new();
        if write!(rendered, "{}", NaiveDate::MIN.format(&schema.date_format)).is_err() {
            return Err(AppError::config(format!(
                "invalid date format '{}'",
                schema.date_format
            )));
        }

        Ok(Self {
            container: selector(&schema.container_selector)?,
            rows: selector(&schema.row_selector)?,
            raw_id: selector(&schema.id_selector)?,
            title: selector(&schema.title_selector)?,
            link: selector(&schema.link_selector)?,
            date: selector(&schema.date_selector)?,
            date_format: schema.date_format.clone(),
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| AppError::config(format!("invalid CSS selector '{}': {}", css, e)))
}

/// Everything needed to turn one source's rows into notices
#[derive(Debug)]
pub struct BoardExtractor {
    source_name: String,
    id_prefix: String,
    id_suffix: Option<String>,
    category: NoticeCategory,
    label: String,
    base_url: String,
    schema: CompiledSchema,
}

impl BoardExtractor {
    pub fn from_source(source: &SourceConfig) -> Result<Self> {
        let schema = CompiledSchema::compile(&source.schema).map_err(|e| match e {
            AppError::Configuration { message } => {
                AppError::config(format!("source '{}': {}", source.name, message))
            }
            other => other,
        })?;

        Ok(Self {
            source_name: source.name.clone(),
            id_prefix: source.id_prefix.clone(),
            id_suffix: source.id_suffix.clone(),
            category: source.category.clone(),
            label: source.label(),
            base_url: source.base_url().to_string(),
            schema,
        })
    }

    /// Build a notice from one row, or `None` if the row is not a same-day posting
    fn extract_row(
        &self,
        row: ElementRef<'_>,
        today_text: &str,
        observed_at: DateTime<Utc>,
    ) -> Option<Notice> {
        let date_text = first_text(row, &self.schema.date)?;
        if date_text != today_text {
            trace!(source = %self.source_name, date = %date_text, "Skipping row not posted today");
            return None;
        }

        let Some(href) = row
            .select(&self.schema.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
        else {
            debug!(source = %self.source_name, "Skipping row without detail link");
            return None;
        };

        // Fall back to the link, which is unique per posting, when the number column is blank
        let raw_id = first_text(row, &self.schema.raw_id)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| href.to_string());
        let title = first_text(row, &self.schema.title).unwrap_or_default();

        let post_date = NaiveDate::parse_from_str(&date_text, &self.schema.date_format).ok();
        if post_date.is_none() {
            debug!(source = %self.source_name, date = %date_text, "Unparsable post date");
        }

        Some(Notice {
            id: compose_notice_id(&self.id_prefix, self.id_suffix.as_deref(), &raw_id),
            category: self.category.clone(),
            label: self.label.clone(),
            title,
            url: format!("{}{}", self.base_url, href),
            post_date,
            observed_at,
        })
    }
}

/// A parsed board page
///
/// Holds the DOM, so it is not `Send`; parse and collect before awaiting.
pub struct BoardPage<'a> {
    document: Html,
    extractor: &'a BoardExtractor,
}

impl<'a> BoardPage<'a> {
    /// Parse a page; a page without the list container means the schema no longer fits the board.
    ///
    /// A container with no rows is an empty board, not an error.
    pub fn parse(html: &str, extractor: &'a BoardExtractor) -> Result<Self> {
        let page = Self {
            document: Html::parse_document(html),
            extractor,
        };

        if page.document.select(&extractor.schema.container).next().is_none() {
            return Err(AppError::Parse {
                source_name: extractor.source_name.clone(),
                message: "container selector matched nothing".to_string(),
            });
        }

        Ok(page)
    }

    pub fn row_count(&self) -> usize {
        self.document.select(&self.extractor.schema.rows).count()
    }

    /// Same-day notices in board order.
    ///
    /// Each call walks the document afresh.
    pub fn notices(
        &self,
        today: NaiveDate,
        observed_at: DateTime<Utc>,
    ) -> impl Iterator<Item = Notice> + '_ {
        let extractor: &BoardExtractor = self.extractor;
        let today_text = today.format(&extractor.schema.date_format).to_string();
        self.document
            .select(&extractor.schema.rows)
            .filter_map(move |row| extractor.extract_row(row, &today_text, observed_at))
    }
}

/// Parse `html` and collect its same-day notices
pub fn parse_board(
    html: &str,
    extractor: &BoardExtractor,
    today: NaiveDate,
    observed_at: DateTime<Utc>,
) -> Result<Vec<Notice>> {
    let page = BoardPage::parse(html, extractor)?;
    let notices: Vec<Notice> = page.notices(today, observed_at).collect();

    debug!(
        source = %extractor.source_name,
        rows = page.row_count(),
        notices = notices.len(),
        "Board parsed"
    );

    Ok(notices)
}

/// Trimmed text of the first match, inner whitespace collapsed
fn first_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector).next().map(|el| {
        el.text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    })
}
