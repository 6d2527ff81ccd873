use std::collections::HashMap;

/// Label used when a series key has no table entry.
pub const UNCLASSIFIED: &str = "Unclassified";

const BUNDLED_TABLE: &str = include_str!("../../data/lob_series.json");

/// Static form-series to business-line mapping. Loaded once, read-only, so
/// concurrent lookups need no locking.
#[derive(Debug, Clone)]
pub struct BusinessCodeTable {
    entries: HashMap<String, String>,
}

impl BusinessCodeTable {
    /// Table bundled with the crate.
    ///
    /// # Panics
    /// Only if the bundled data file is invalid JSON, which is a build
    /// defect rather than a runtime condition.
    #[must_use]
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_TABLE).expect("bundled lob_series.json must parse")
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, String> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn label(&self, series_key: &str) -> Option<&str> {
        self.entries.get(series_key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Business-line label for a raw form identifier.
    ///
    /// Empty when the identifier carries no digits before its first hyphen
    /// (no identifier visible); [`UNCLASSIFIED`] when a key is derived but
    /// unknown to the table.
    #[must_use]
    pub fn classify(&self, form_identifier: &str) -> String {
        match series_key(form_identifier) {
            None => String::new(),
            Some(key) => self
                .label(&key)
                .unwrap_or(UNCLASSIFIED)
                .to_string(),
        }
    }
}

/// Derive the series key: digits before the first hyphen, zero-padded on the
/// left to at least 3 characters. `None` when no digits precede the hyphen.
#[must_use]
pub fn series_key(form_identifier: &str) -> Option<String> {
    let head = form_identifier
        .split('-')
        .next()
        .unwrap_or(form_identifier);
    let digits: String = head.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() {
        return None;
    }
    Some(format!("{digits:0>3}"))
}
