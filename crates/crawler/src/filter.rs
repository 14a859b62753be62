//! Keyword filter

/// True if `title` contains any keyword as an exact, case-sensitive substring
pub fn matches(title: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| title.contains(k.as_str()))
}

/// Per-source keyword list
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    pub fn matches(&self, title: &str) -> bool {
        matches(title, &self.keywords)
    }

    /// First configured keyword found in the title, for logging
    pub fn matched_keyword(&self, title: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| title.contains(k.as_str()))
            .map(String::as_str)
    }
}
