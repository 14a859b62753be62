//! Notice record scraped from a board

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Board category a notice was scraped from
///
/// The built-in variants cover the boards the bot was first written for;
/// anything else configured by name becomes `Custom`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoticeCategory {
    SchoolGeneral,
    DeptGeneral,
    DeptScholarship,
    Custom(String),
}

impl NoticeCategory {
    /// Tag line shown at the top of a delivered notice
    pub fn default_label(&self) -> String {
        match self {
            NoticeCategory::SchoolGeneral => "[School Notice]".to_string(),
            NoticeCategory::DeptGeneral => "[Department Notice]".to_string(),
            NoticeCategory::DeptScholarship => "[Department Scholarship Notice]".to_string(),
            NoticeCategory::Custom(name) => format!("[{}]", name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NoticeCategory::SchoolGeneral => "school_general",
            NoticeCategory::DeptGeneral => "dept_general",
            NoticeCategory::DeptScholarship => "dept_scholarship",
            NoticeCategory::Custom(name) => name,
        }
    }
}

impl From<String> for NoticeCategory {
    fn from(s: String) -> Self {
        match s.as_str() {
            "school_general" => NoticeCategory::SchoolGeneral,
            "dept_general" => NoticeCategory::DeptGeneral,
            "dept_scholarship" => NoticeCategory::DeptScholarship,
            _ => NoticeCategory::Custom(s),
        }
    }
}

impl From<NoticeCategory> for String {
    fn from(category: NoticeCategory) -> Self {
        match category {
            NoticeCategory::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NoticeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the dedup key for a board entry: `{prefix}_{suffix}_{raw_id}`,
/// or `{prefix}_{raw_id}` for single-category sources.
pub fn compose_notice_id(prefix: &str, suffix: Option<&str>, raw_id: &str) -> String {
    match suffix {
        Some(suffix) if !suffix.is_empty() => format!("{}_{}_{}", prefix, suffix, raw_id),
        _ => format!("{}_{}", prefix, raw_id),
    }
}

/// One board posting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: String,
    pub category: NoticeCategory,
    /// Tag line used when rendering; the category default unless the source overrides it
    pub label: String,
    pub title: String,
    pub url: String,
    /// `None` when the board's date text could not be parsed
    pub post_date: Option<NaiveDate>,
    pub observed_at: DateTime<Utc>,
}

impl Notice {
    /// Post date formatted for humans, `unknown` when unparsed
    pub fn post_date_display(&self) -> String {
        self.post_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_notice_id() {
        assert_eq!(compose_notice_id("school", None, "1024"), "school_1024");
        assert_eq!(
            compose_notice_id("dept", Some("scholarship"), "77"),
            "dept_scholarship_77"
        );
        assert_eq!(compose_notice_id("dept", Some(""), "77"), "dept_77");
    }

    #[test]
    fn test_category_string_conversion() {
        assert_eq!(
            NoticeCategory::from("dept_general".to_string()),
            NoticeCategory::DeptGeneral
        );
        assert_eq!(
            NoticeCategory::from("library".to_string()),
            NoticeCategory::Custom("library".to_string())
        );
        assert_eq!(String::from(NoticeCategory::DeptScholarship), "dept_scholarship");
        assert_eq!(NoticeCategory::Custom("library".into()).default_label(), "[library]");
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&NoticeCategory::SchoolGeneral).unwrap();
        assert_eq!(json, "\"school_general\"");
        let parsed: NoticeCategory = serde_json::from_str("\"careers\"").unwrap();
        assert_eq!(parsed, NoticeCategory::Custom("careers".into()));
    }
}
