use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, json::JsonString, serde_as};
use utoipa::ToSchema;

/// The data-table request payload.
///
/// Accepted as a JSON body or as query parameters. Every field is optional
/// and malformed values fall back to their defaults instead of rejecting the
/// request:
///
/// ```json
/// {
///   "page": 2,
///   "itemsPerPage": 25,
///   "sortBy": [{"key": "age", "order": "desc"}, {"key": "name", "order": "asc"}],
///   "filter": {"search": "jo", "status": ["open", "pending"], "name": "Admin"},
///   "download": false
/// }
/// ```
///
/// In a query string, `sortBy` and `filter` may be JSON-encoded strings and
/// `page`/`itemsPerPage` numeric strings.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    /// 1-based page number
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    #[schema(value_type = Option<i64>, example = 1)]
    pub page: Option<i64>,

    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    #[schema(value_type = Option<i64>, example = 10)]
    pub items_per_page: Option<i64>,

    /// Order-by entries, applied in sequence
    #[serde_as(as = "DefaultOnError<PickFirst<(_, JsonString)>>")]
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub sort_by: Vec<Value>,

    /// Filter payload: `search` feeds global filters, every other key feeds the
    /// column filter registered under the same name
    #[serde_as(as = "DefaultOnError<PickFirst<(_, JsonString)>>")]
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filter: Map<String, Value>,

    /// Return every matching row instead of one page
    #[serde(default, alias = "export", deserialize_with = "deserialize_flag")]
    pub download: bool,
}

impl RequestParams {
    /// Lenient conversion from an arbitrary JSON value. Anything but an object
    /// yields the defaults.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// The free-text term global filters search for.
    #[must_use]
    pub fn search(&self) -> Option<&Value> {
        self.filter.get("search")
    }
}

/// Interpret a loosely typed flag: `true`, non-zero numbers and any string
/// other than `""`, `"0"`, `"false"`, `"off"` and `"no"` are set.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON),
        Value::String(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "" | "0" | "false" | "off" | "no"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(is_truthy(&value))
}
