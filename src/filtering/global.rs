use serde_json::Value;

use super::ApplyFilter;
use super::search::{SearchSpec, SearchType};
use crate::query::{FilterQuery, LogicalOperator};

/// Free-text search against one column.
///
/// Every registered global filter receives the same `search` term. Defaults:
/// case-insensitive, [`SearchType::Contains`], joined with `OR`, so a list of
/// global filters reads as "any of these columns contains the term".
///
/// ```rust,ignore
/// let filters = vec![
///     GlobalFilter::new("name"),
///     GlobalFilter::new("email").with_search_type(SearchType::StartsWith),
///     GlobalFilter::new("posts.title"),
/// ];
/// ```
#[derive(Debug, Clone)]
pub struct GlobalFilter {
    spec: SearchSpec,
}

impl GlobalFilter {
    #[must_use]
    pub fn new(column_key: &str) -> Self {
        Self {
            spec: SearchSpec::new(column_key, true, SearchType::Contains, LogicalOperator::Or),
        }
    }
}

super::search_filter_builders!(GlobalFilter);

impl ApplyFilter for GlobalFilter {
    /// `data` is the search term. Anything but a string counts as empty.
    fn apply(&self, query: &mut dyn FilterQuery, data: &Value) {
        let term = match data {
            Value::String(s) => Value::String(s.clone()),
            _ => Value::String(String::new()),
        };

        let value = match self.spec.cast(term) {
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                tracing::debug!(
                    column = %self.spec.column_key,
                    "Global filter caster produced a non-scalar value, skipping"
                );
                return;
            }
            scalar => scalar,
        };

        self.spec.apply_value(query, &value);
    }
}
