//! Matching rules shared by [`GlobalFilter`](super::GlobalFilter) and
//! [`ColumnFilter`](super::ColumnFilter).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr, sync::Arc};

use crate::errors::DataTableError;
use crate::query::{ColumnExpr, FilterQuery, LogicalOperator, Operator};

/// Transforms a raw filter value before it is matched.
pub type Caster = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    StartsWith,
    EndsWith,
    Contains,
    Equal,
}

impl SearchType {
    pub const ALL: [Self; 4] = [Self::StartsWith, Self::EndsWith, Self::Contains, Self::Equal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Contains => "contains",
            Self::Equal => "equal",
        }
    }

    /// Wrap `value` in the `LIKE` wildcards this search type needs.
    #[must_use]
    pub fn pattern(self, value: &str) -> String {
        match self {
            Self::StartsWith => format!("{value}%"),
            Self::EndsWith => format!("%{value}"),
            Self::Contains => format!("%{value}%"),
            Self::Equal => value.to_string(),
        }
    }

    fn operator(self) -> Operator {
        match self {
            Self::Equal => Operator::Eq,
            _ => Operator::Like,
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = DataTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                DataTableError::invalid(format!(
                    "Invalid search type '{s}'. Valid types are: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Split `relation.column` on the first dot only.
///
/// `"user.profile.name"` becomes `("user", "profile.name")`; a key without a
/// dot has no relation.
#[must_use]
pub fn split_column_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('.') {
        Some((relation, column)) => (Some(relation), column),
        None => (None, key),
    }
}

/// `null`, `""` and `[]` are empty. `"0"`, `0` and `false` are real values.
#[must_use]
pub fn is_empty_search_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => false,
    }
}

/// Operand for a `LOWER()`-wrapped column. `LOWER()` always yields text, so
/// numbers and booleans are bound as their text form without folding.
fn folded_operand(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(if b { "1" } else { "0" }.to_owned()),
        other => other,
    }
}

/// Configuration and algorithm common to global and column filters.
#[derive(Clone)]
pub(crate) struct SearchSpec {
    pub(crate) column_key: String,
    pub(crate) relation: Option<String>,
    pub(crate) case_insensitive: bool,
    pub(crate) search_type: SearchType,
    pub(crate) caster: Option<Caster>,
    pub(crate) logical: LogicalOperator,
}

impl fmt::Debug for SearchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSpec")
            .field("column_key", &self.column_key)
            .field("relation", &self.relation)
            .field("case_insensitive", &self.case_insensitive)
            .field("search_type", &self.search_type)
            .field("caster", &self.caster.as_ref().map(|_| "Fn"))
            .field("logical", &self.logical)
            .finish()
    }
}

impl SearchSpec {
    pub(crate) fn new(
        key: &str,
        case_insensitive: bool,
        search_type: SearchType,
        logical: LogicalOperator,
    ) -> Self {
        let (relation, column_key) = split_column_key(key);
        Self {
            column_key: column_key.to_string(),
            relation: relation.map(ToString::to_string),
            case_insensitive,
            search_type,
            caster: None,
            logical,
        }
    }

    /// Run the caster over a scalar, or over each element of a list.
    pub(crate) fn cast(&self, value: Value) -> Value {
        let Some(caster) = &self.caster else {
            return value;
        };
        match value {
            Value::Array(items) => Value::Array(items.into_iter().map(|v| caster(v)).collect()),
            other => caster(other),
        }
    }

    /// Add this filter's predicate for an already extracted and cast value.
    pub(crate) fn apply_value(&self, query: &mut dyn FilterQuery, value: &Value) {
        if is_empty_search_value(value) {
            tracing::trace!(column = %self.column_key, "Skipping filter with empty value");
            return;
        }

        match &self.relation {
            Some(relation) => {
                // One predicate inside the relation scope, nothing to combine it with
                query.add_relation_exists(relation, self.logical, &mut |inner: &mut dyn FilterQuery| {
                    self.apply_direct(inner, value, LogicalOperator::And);
                });
            }
            None => self.apply_direct(query, value, self.logical),
        }
    }

    fn search_column(&self) -> ColumnExpr {
        if self.case_insensitive {
            ColumnExpr::Lower(self.column_key.clone())
        } else {
            ColumnExpr::Plain(self.column_key.clone())
        }
    }

    fn apply_direct(&self, query: &mut dyn FilterQuery, value: &Value, combinator: LogicalOperator) {
        match value {
            Value::Array(items) => self.apply_set(query, items, combinator),
            Value::Object(_) => {
                tracing::debug!(column = %self.column_key, "Skipping unsupported object filter value");
            }
            scalar => self.apply_scalar(query, scalar, combinator),
        }
    }

    fn apply_scalar(&self, query: &mut dyn FilterQuery, value: &Value, combinator: LogicalOperator) {
        let operand = match (value, self.search_type) {
            (Value::String(s), search_type) => {
                let pattern = search_type.pattern(s);
                if self.case_insensitive {
                    Value::String(pattern.to_lowercase())
                } else {
                    Value::String(pattern)
                }
            }
            (other, SearchType::Equal) if self.case_insensitive => folded_operand(other.clone()),
            // Non-string values are compared as they are and never case folded
            (other, SearchType::Equal) => other.clone(),
            (other, search_type) => Value::String(search_type.pattern(&other.to_string())),
        };

        query.add_predicate(
            self.search_column(),
            self.search_type.operator(),
            operand,
            combinator,
        );
    }

    fn apply_set(&self, query: &mut dyn FilterQuery, items: &[Value], combinator: LogicalOperator) {
        if !self.case_insensitive {
            query.add_in_set(&self.column_key, items.to_vec(), combinator);
            return;
        }

        let lowered: Vec<Value> = items.iter().cloned().map(folded_operand).collect();
        query.add_group(combinator, &mut |group: &mut dyn FilterQuery| {
            for (i, item) in lowered.iter().enumerate() {
                let joiner = if i == 0 {
                    LogicalOperator::And
                } else {
                    LogicalOperator::Or
                };
                group.add_predicate(
                    ColumnExpr::Lower(self.column_key.clone()),
                    Operator::Eq,
                    item.clone(),
                    joiner,
                );
            }
        });
    }
}
