use serde_json::Value;

use super::ApplyFilter;
use super::search::{SearchSpec, SearchType};
use crate::query::{FilterQuery, LogicalOperator};

/// Structured search on one column, fed from the request's `filter` object.
///
/// The filter looks up its own column key in the payload: a filter on
/// `"status"` reads `filter.status`, a filter on `"user.name"` reads
/// `filter.name` and matches it inside the `user` relation. A list value
/// means set membership.
///
/// Defaults: case-sensitive, [`SearchType::Equal`], joined with `AND`.
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    spec: SearchSpec,
}

impl ColumnFilter {
    #[must_use]
    pub fn new(column_key: &str) -> Self {
        Self {
            spec: SearchSpec::new(column_key, false, SearchType::Equal, LogicalOperator::And),
        }
    }
}

super::search_filter_builders!(ColumnFilter);

impl ApplyFilter for ColumnFilter {
    fn apply(&self, query: &mut dyn FilterQuery, data: &Value) {
        let raw = data
            .get(&self.spec.column_key)
            .cloned()
            .unwrap_or(Value::Null);
        let value = self.spec.cast(raw);
        self.spec.apply_value(query, &value);
    }
}
