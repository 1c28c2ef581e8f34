//! Department enumeration entry.

/// One department listing to scrape: a short code and the listing page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    pub code: String,
    pub url: String,
}

impl Department {
    pub fn new(code: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            url: url.into(),
        }
    }
}
