use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DataTableError;
use crate::query::SortDirection;

/// One order-by clause: `{"key": "created_at", "order": "desc"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub key: String,
    pub order: SortDirection,
}

#[derive(Deserialize)]
struct RawSortEntry {
    key: Option<Value>,
    order: Option<Value>,
}

impl SortEntry {
    /// Build an entry from a column key and a direction name (`asc` / `desc`,
    /// any case).
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the key is empty or the direction is unknown.
    pub fn new(key: impl Into<String>, order: &str) -> Result<Self, DataTableError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DataTableError::invalid(
                r#"Sort array must contain "key" and "order" fields"#,
            ));
        }
        Ok(Self {
            key,
            order: order.parse()?,
        })
    }

    /// Validate a JSON sort entry such as `{"key": "name", "order": "ASC"}`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the entry is not an object with a string `key`
    /// and a string `order` naming a valid direction.
    pub fn from_json(entry: &Value) -> Result<Self, DataTableError> {
        let missing = || DataTableError::invalid(r#"Sort array must contain "key" and "order" fields"#);

        let raw: RawSortEntry = serde_json::from_value(entry.clone()).map_err(|_| missing())?;
        match (raw.key, raw.order) {
            (Some(Value::String(key)), Some(Value::String(order))) => Self::new(key, &order),
            (Some(_), Some(_)) => Err(DataTableError::invalid(
                r#"Sort "key" and "order" must be strings"#,
            )),
            _ => Err(missing()),
        }
    }

    /// Keep the valid entries of a client supplied `sortBy` list, logging and
    /// dropping the rest.
    #[must_use]
    pub fn parse_request(entries: &[Value]) -> Vec<Self> {
        entries
            .iter()
            .filter_map(|entry| match Self::from_json(entry) {
                Ok(sort) => Some(sort),
                Err(err) => {
                    tracing::warn!(entry = %entry, error = %err, "Dropping malformed sort entry");
                    None
                }
            })
            .collect()
    }
}
