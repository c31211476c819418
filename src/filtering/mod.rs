//! # Filters
//!
//! Three kinds of filter can be registered on a
//! [`DataTableService`](crate::service::DataTableService):
//!
//! - **[`GlobalFilter`]**: one free-text term (`filter.search`) matched
//!   against many columns, `OR`-ed together by default.
//! - **[`ColumnFilter`]**: one value per column, looked up by column key in the
//!   request's `filter` object, `AND`-ed together by default. List values use
//!   set membership.
//! - **[`CustomFilter`]**: any procedure over the query and the raw payload.
//!
//! Global and column filters share their configuration surface:
//!
//! ```rust,ignore
//! let status = ColumnFilter::new("status")
//!     .case_insensitive(true)
//!     .with_search_type(SearchType::Equal)
//!     .with_logical_operator(LogicalOperator::And);
//!
//! // Same thing from strings, e.g. a UI-driven configuration
//! let status = ColumnFilter::new("status")
//!     .with_search_type_named("equal")?
//!     .with_logical_operator_named("and")?;
//! ```
//!
//! A dotted column key (`posts.title`) targets a relation: the predicate is
//! wrapped in "some related record matches".
//!
//! ## Empty values
//!
//! `null`, `""` and `[]` disable a filter for the request. The string `"0"`
//! does not: a foreign key of `0` or a flag sent as `"0"` is still filtered on.

use serde_json::Value;

use crate::query::FilterQuery;

/// Builder and accessor methods for filters wrapping a `SearchSpec`.
macro_rules! search_filter_builders {
    ($filter:ty) => {
        impl $filter {
            #[must_use]
            pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
                self.spec.case_insensitive = case_insensitive;
                self
            }

            #[must_use]
            pub fn with_search_type(mut self, search_type: $crate::filtering::SearchType) -> Self {
                self.spec.search_type = search_type;
                self
            }

            /// # Errors
            ///
            /// `InvalidParameter` unless `search_type` is one of `startsWith`,
            /// `endsWith`, `contains` or `equal`.
            pub fn with_search_type_named(
                self,
                search_type: &str,
            ) -> Result<Self, $crate::errors::DataTableError> {
                Ok(self.with_search_type(search_type.parse()?))
            }

            #[must_use]
            pub fn with_caster<F>(mut self, caster: F) -> Self
            where
                F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
            {
                self.spec.caster = Some(std::sync::Arc::new(caster));
                self
            }

            #[must_use]
            pub fn with_logical_operator(mut self, operator: $crate::query::LogicalOperator) -> Self {
                self.spec.logical = operator;
                self
            }

            /// # Errors
            ///
            /// `InvalidParameter` unless `operator` is `AND` or `OR` (any case).
            pub fn with_logical_operator_named(
                self,
                operator: &str,
            ) -> Result<Self, $crate::errors::DataTableError> {
                Ok(self.with_logical_operator(operator.parse()?))
            }

            #[must_use]
            pub fn column_key(&self) -> &str {
                &self.spec.column_key
            }

            #[must_use]
            pub fn relation(&self) -> Option<&str> {
                self.spec.relation.as_deref()
            }

            #[must_use]
            pub fn is_case_insensitive(&self) -> bool {
                self.spec.case_insensitive
            }

            #[must_use]
            pub fn search_type(&self) -> $crate::filtering::SearchType {
                self.spec.search_type
            }

            #[must_use]
            pub fn logical_operator(&self) -> $crate::query::LogicalOperator {
                self.spec.logical
            }

            #[must_use]
            pub fn has_caster(&self) -> bool {
                self.spec.caster.is_some()
            }
        }
    };
}

pub(crate) use search_filter_builders;

pub mod column;
pub mod custom;
pub mod global;
pub mod search;
pub mod sort;

pub use column::ColumnFilter;
pub use custom::CustomFilter;
pub use global::GlobalFilter;
pub use search::{SearchType, is_empty_search_value, split_column_key};
pub use sort::SortEntry;

/// Something that can add predicates to a query given the request data.
pub trait ApplyFilter {
    fn apply(&self, query: &mut dyn FilterQuery, data: &Value);
}

/// The closed set of filter kinds.
#[derive(Debug, Clone)]
pub enum Filter {
    Global(GlobalFilter),
    Column(ColumnFilter),
    Custom(CustomFilter),
}

impl Filter {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Global(_) => "global",
            Self::Column(_) => "column",
            Self::Custom(_) => "custom",
        }
    }
}

impl ApplyFilter for Filter {
    fn apply(&self, query: &mut dyn FilterQuery, data: &Value) {
        match self {
            Self::Global(filter) => filter.apply(query, data),
            Self::Column(filter) => filter.apply(query, data),
            Self::Custom(filter) => filter.apply(query, data),
        }
    }
}

impl From<GlobalFilter> for Filter {
    fn from(filter: GlobalFilter) -> Self {
        Self::Global(filter)
    }
}

impl From<ColumnFilter> for Filter {
    fn from(filter: ColumnFilter) -> Self {
        Self::Column(filter)
    }
}

impl From<CustomFilter> for Filter {
    fn from(filter: CustomFilter) -> Self {
        Self::Custom(filter)
    }
}
