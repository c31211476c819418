use serde_json::Value;
use std::{fmt, sync::Arc};

use super::ApplyFilter;
use crate::query::FilterQuery;

pub type Procedure = Arc<dyn Fn(&mut dyn FilterQuery, &Value) + Send + Sync>;

/// Escape hatch: an arbitrary procedure run against the query with the whole
/// request filter payload. It is always invoked, whatever the payload holds.
///
/// ```rust,ignore
/// let only_active = CustomFilter::new(|query, data| {
///     if data.get("include_inactive").is_none() {
///         query.add_predicate(
///             ColumnExpr::Plain("active".into()),
///             Operator::Eq,
///             json!(true),
///             LogicalOperator::And,
///         );
///     }
/// });
/// ```
#[derive(Clone)]
pub struct CustomFilter {
    procedure: Procedure,
}

impl CustomFilter {
    pub fn new<F>(procedure: F) -> Self
    where
        F: Fn(&mut dyn FilterQuery, &Value) + Send + Sync + 'static,
    {
        Self {
            procedure: Arc::new(procedure),
        }
    }

    #[must_use]
    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }
}

impl fmt::Debug for CustomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFilter").finish_non_exhaustive()
    }
}

impl ApplyFilter for CustomFilter {
    fn apply(&self, query: &mut dyn FilterQuery, data: &Value) {
        (self.procedure)(query, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::{MemoryQuery, QueryOp};
    use crate::query::{ColumnExpr, LogicalOperator, Operator};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_receives_full_payload() {
        let filter = CustomFilter::new(|query, data| {
            let min_age = data.get("min_age").cloned().unwrap_or(json!(18));
            query.add_predicate(
                ColumnExpr::Plain("age".into()),
                Operator::Eq,
                min_age,
                LogicalOperator::And,
            );
        });

        let mut query = MemoryQuery::default();
        filter.apply(&mut query, &json!({"min_age": 21, "search": "x"}));
        assert!(matches!(
            &query.plan()[0],
            QueryOp::Predicate { value, .. } if *value == json!(21)
        ));
    }

    #[test]
    fn test_invoked_even_with_empty_payload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let filter = CustomFilter::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut query = MemoryQuery::default();
        filter.apply(&mut query, &json!({}));
        filter.apply(&mut query, &Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(query.plan().is_empty());
    }

    #[test]
    fn test_procedure_accessor() {
        let filter = CustomFilter::new(|_, _| {});
        let cloned = filter.clone();
        assert!(Arc::ptr_eq(filter.procedure(), cloned.procedure()));
    }
}
