//! The query-mutation boundary.
//!
//! Filters never talk to a database directly. They describe predicates through
//! [`FilterQuery`], and the orchestration service finishes the job through
//! [`QueryExecutor`]. Two implementations ship with the crate:
//! [`SeaQuery`](crate::database::sea::SeaQuery) on top of Sea-ORM and
//! [`MemoryQuery`](crate::database::memory::MemoryQuery) over JSON rows.
//!
//! Predicates added to the same scope behave like a flat SQL `WHERE` clause:
//! each one carries the operator joining it to what came before, and `AND`
//! binds tighter than `OR`.

use async_trait::async_trait;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::errors::DataTableError;
use crate::pagination::{Page, PageRequest};

/// How a predicate joins the predicates added before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalOperator {
    type Err = DataTableError;

    /// Case-insensitive: `and`, `AND` and `And` all parse to [`LogicalOperator::And`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(DataTableError::invalid(format!(
                "Invalid logical operator '{other}'. Valid operators are: AND, OR"
            ))),
        }
    }
}

/// Comparison used by [`FilterQuery::add_predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Exact match (`=`)
    Eq,
    /// SQL `LIKE` pattern match, `%` and `_` are wildcards
    Like,
}

/// A column reference, optionally folded to lower case before comparison.
///
/// The column name may carry a single table qualifier (`profile.name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnExpr {
    Plain(String),
    Lower(String),
}

impl ColumnExpr {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Plain(name) | Self::Lower(name) => name,
        }
    }

    #[must_use]
    pub fn is_lowered(&self) -> bool {
        matches!(self, Self::Lower(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DataTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(DataTableError::invalid(r#"Sort order must be "asc" or "desc""#)),
        }
    }
}

/// Callback that fills a nested scope.
pub type ScopeBuilder<'a> = &'a mut dyn FnMut(&mut dyn FilterQuery);

/// Predicate mutation. Object safe so nested scopes can be handed to filters
/// as `&mut dyn FilterQuery`.
pub trait FilterQuery {
    /// `column <operator> value`, joined to the scope with `combinator`.
    fn add_predicate(
        &mut self,
        column: ColumnExpr,
        operator: Operator,
        value: Value,
        combinator: LogicalOperator,
    );

    /// A parenthesised group of predicates. Empty groups add nothing.
    fn add_group(&mut self, combinator: LogicalOperator, build: ScopeBuilder<'_>);

    /// "At least one related record of `relation` satisfies the inner scope".
    fn add_relation_exists(
        &mut self,
        relation: &str,
        combinator: LogicalOperator,
        build: ScopeBuilder<'_>,
    );

    /// `column IN (values)`.
    fn add_in_set(&mut self, column: &str, values: Vec<Value>, combinator: LogicalOperator);
}

/// The root of a query: ordering plus the two terminal operations.
#[async_trait]
pub trait QueryExecutor: FilterQuery + Send + Sized {
    type Row: Send;

    /// Append an order-by clause. Earlier clauses take precedence.
    fn add_order_by(&mut self, column: &str, direction: SortDirection);

    /// Run the query for one page and count all matching rows.
    async fn paginate(self, request: PageRequest) -> Result<Page<Self::Row>, DbErr>;

    /// Run the query without any limit.
    async fn fetch_all(self) -> Result<Vec<Self::Row>, DbErr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_operator_case_insensitive() {
        for input in ["and", "AND", "And"] {
            assert_eq!(input.parse::<LogicalOperator>().unwrap(), LogicalOperator::And);
        }
        for input in ["or", "OR", "oR"] {
            assert_eq!(input.parse::<LogicalOperator>().unwrap(), LogicalOperator::Or);
        }
    }

    #[test]
    fn test_logical_operator_rejects_unknown() {
        for input in ["xor", "", "&&", "AND OR"] {
            let err = input.parse::<LogicalOperator>().unwrap_err();
            assert!(err.is_invalid_parameter());
        }
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("ASC".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_column_expr() {
        let lowered = ColumnExpr::Lower("name".to_string());
        assert!(lowered.is_lowered());
        assert_eq!(lowered.name(), "name");
        assert!(!ColumnExpr::Plain("name".to_string()).is_lowered());
    }
}
