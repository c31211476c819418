use serde::Deserialize;

const DEFAULT_ITEMS_PER_PAGE: u64 = 10;
const MAX_ITEMS_PER_PAGE: u64 = 100;

/// Paging limits shared by every data table of an application.
///
/// Missing keys fall back to their defaults, so a partial document such as
/// `{"max_items_per_page": 50}` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataTableConfig {
    /// Page size used when neither the caller nor the request specifies one
    pub default_items_per_page: u64,
    /// Upper bound for the page size
    pub max_items_per_page: u64,
}

impl Default for DataTableConfig {
    fn default() -> Self {
        Self {
            default_items_per_page: DEFAULT_ITEMS_PER_PAGE,
            max_items_per_page: MAX_ITEMS_PER_PAGE,
        }
    }
}

impl DataTableConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The page size a fresh service starts with, never above the maximum
    /// and never below 1.
    #[must_use]
    pub fn initial_items_per_page(&self) -> u64 {
        self.default_items_per_page.clamp(1, self.max_items_per_page.max(1))
    }

    /// Clamp a client supplied page size into `[1, max_items_per_page]`.
    #[must_use]
    pub fn clamp_items_per_page(&self, requested: i64) -> u64 {
        let max = self.max_items_per_page.max(1);
        u64::try_from(requested).map_or(1, |n| n.clamp(1, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DataTableConfig::default();
        assert_eq!(config.default_items_per_page, 10);
        assert_eq!(config.max_items_per_page, 100);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DataTableConfig::from_json(r#"{"max_items_per_page": 50}"#).unwrap();
        assert_eq!(config.default_items_per_page, 10);
        assert_eq!(config.max_items_per_page, 50);
    }

    #[test]
    fn test_invalid_json() {
        assert!(DataTableConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_initial_items_per_page_respects_max() {
        let config = DataTableConfig {
            default_items_per_page: 500,
            max_items_per_page: 100,
        };
        assert_eq!(config.initial_items_per_page(), 100);
    }

    #[test]
    fn test_clamp_items_per_page() {
        let config = DataTableConfig::default();
        assert_eq!(config.clamp_items_per_page(25), 25);
        assert_eq!(config.clamp_items_per_page(1000), 100);
        assert_eq!(config.clamp_items_per_page(0), 1);
        assert_eq!(config.clamp_items_per_page(-5), 1);
    }
}
