//! In-memory backend over JSON rows.
//!
//! Every call made through [`FilterQuery`] is recorded as a [`QueryOp`] in
//! [`MemoryQuery::plan`], and the same plan is evaluated against the rows when
//! the query runs. Useful for fixtures, tests, and small data sets that never
//! reach a database.
//!
//! Relations are read from the row itself: `posts` in
//! `{"name": "Amy", "posts": [{"title": "Hi"}]}` is a relation whose related
//! records are the objects of the array (a single object also works).

use async_trait::async_trait;
use sea_orm::DbErr;
use serde_json::Value;
use std::cmp::Ordering;

use crate::pagination::{Page, PageRequest};
use crate::query::{
    ColumnExpr, FilterQuery, LogicalOperator, Operator, QueryExecutor, ScopeBuilder, SortDirection,
};

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    Predicate {
        column: ColumnExpr,
        operator: Operator,
        value: Value,
        combinator: LogicalOperator,
    },
    Group {
        combinator: LogicalOperator,
        ops: Vec<QueryOp>,
    },
    RelationExists {
        relation: String,
        combinator: LogicalOperator,
        ops: Vec<QueryOp>,
    },
    InSet {
        column: String,
        values: Vec<Value>,
        combinator: LogicalOperator,
    },
}

impl QueryOp {
    fn combinator(&self) -> LogicalOperator {
        match self {
            Self::Predicate { combinator, .. }
            | Self::Group { combinator, .. }
            | Self::RelationExists { combinator, .. }
            | Self::InSet { combinator, .. } => *combinator,
        }
    }

    fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Predicate {
                column,
                operator,
                value,
                ..
            } => {
                let field = lookup(row, column.name());
                let field = if column.is_lowered() {
                    lower(field)
                } else {
                    field.clone()
                };
                match operator {
                    Operator::Eq => values_equal(&field, value),
                    Operator::Like => match (as_text(&field), value) {
                        (Some(text), Value::String(pattern)) => like_match(&text, pattern),
                        (Some(text), other) => as_text(other).is_some_and(|p| like_match(&text, &p)),
                        (None, _) => false,
                    },
                }
            }
            Self::Group { ops, .. } => matches_scope(ops, row),
            Self::RelationExists { relation, ops, .. } => match row.get(relation) {
                Some(Value::Array(related)) => related
                    .iter()
                    .any(|record| record.is_object() && matches_scope(ops, record)),
                Some(record @ Value::Object(_)) => matches_scope(ops, record),
                _ => false,
            },
            Self::InSet { column, values, .. } => {
                let field = lookup(row, column);
                values.iter().any(|candidate| values_equal(field, candidate))
            }
        }
    }
}

/// Evaluate a flat list of ops the way SQL reads `a AND b OR c AND d`: runs
/// of `AND` are grouped first, then the runs are `OR`-ed. An empty scope
/// matches everything.
fn matches_scope(ops: &[QueryOp], row: &Value) -> bool {
    let mut run = true;
    for (i, op) in ops.iter().enumerate() {
        if i > 0 && op.combinator() == LogicalOperator::Or {
            if run {
                return true;
            }
            run = true;
        }
        run = run && op.matches(row);
    }
    run
}

static NULL: Value = Value::Null;

/// Exact key first, then a dotted path into nested objects.
fn lookup<'a>(row: &'a Value, column: &str) -> &'a Value {
    if let Some(value) = row.get(column) {
        return value;
    }
    column
        .split('.')
        .try_fold(row, |current, segment| current.get(segment))
        .unwrap_or(&NULL)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lower(value: &Value) -> Value {
    as_text(value).map_or(Value::Null, |text| Value::String(text.to_lowercase()))
}

/// `NULL` equals nothing. Numbers compare numerically, and a number compared
/// with a string compares by its text.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => a == b,
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
            n.as_i64() == Some(i64::from(*b))
        }
        _ => left == right,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting. `NULL` sorts first, like SQLite.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one, and `\`
/// escapes the next character. Case-sensitive.
#[must_use]
pub fn like_match(value: &str, pattern: &str) -> bool {
    enum Token {
        Any,
        One,
        Literal(char),
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            other => Token::Literal(other),
        });
    }

    let text: Vec<char> = value.chars().collect();
    // matched[j]: the tokens seen so far match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in &tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            Token::Any => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= matched[j];
                    next[j] = reachable;
                }
            }
            Token::One => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            Token::Literal(c) => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

/// A query over a vector of JSON rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    rows: Vec<Value>,
    plan: Vec<QueryOp>,
    order_by: Vec<(String, SortDirection)>,
}

impl MemoryQuery {
    #[must_use]
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Every filtering call made so far, in order.
    #[must_use]
    pub fn plan(&self) -> &[QueryOp] {
        &self.plan
    }

    #[must_use]
    pub fn order_by(&self) -> &[(String, SortDirection)] {
        &self.order_by
    }

    fn record_scope(build: ScopeBuilder<'_>) -> Vec<QueryOp> {
        let mut inner = Self::default();
        build(&mut inner);
        inner.plan
    }

    /// Filter then sort, without paging.
    fn evaluate(self) -> Vec<Value> {
        let Self {
            rows,
            plan,
            order_by,
        } = self;

        let mut selected: Vec<Value> = rows
            .into_iter()
            .filter(|row| matches_scope(&plan, row))
            .collect();

        if !order_by.is_empty() {
            selected.sort_by(|a, b| {
                order_by
                    .iter()
                    .map(|(column, direction)| {
                        let ordering = compare_values(lookup(a, column), lookup(b, column));
                        match direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        selected
    }
}

impl FilterQuery for MemoryQuery {
    fn add_predicate(
        &mut self,
        column: ColumnExpr,
        operator: Operator,
        value: Value,
        combinator: LogicalOperator,
    ) {
        self.plan.push(QueryOp::Predicate {
            column,
            operator,
            value,
            combinator,
        });
    }

    fn add_group(&mut self, combinator: LogicalOperator, build: ScopeBuilder<'_>) {
        let ops = Self::record_scope(build);
        if !ops.is_empty() {
            self.plan.push(QueryOp::Group { combinator, ops });
        }
    }

    fn add_relation_exists(
        &mut self,
        relation: &str,
        combinator: LogicalOperator,
        build: ScopeBuilder<'_>,
    ) {
        // An empty scope still means "has at least one related record"
        let ops = Self::record_scope(build);
        self.plan.push(QueryOp::RelationExists {
            relation: relation.to_string(),
            combinator,
            ops,
        });
    }

    fn add_in_set(&mut self, column: &str, values: Vec<Value>, combinator: LogicalOperator) {
        self.plan.push(QueryOp::InSet {
            column: column.to_string(),
            values,
            combinator,
        });
    }
}

#[async_trait]
impl QueryExecutor for MemoryQuery {
    type Row = Value;

    fn add_order_by(&mut self, column: &str, direction: SortDirection) {
        self.order_by.push((column.to_string(), direction));
    }

    async fn paginate(self, request: PageRequest) -> Result<Page<Value>, DbErr> {
        let selected = self.evaluate();
        let total = selected.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let per_page = usize::try_from(request.per_page).unwrap_or(usize::MAX);
        let data: Vec<Value> = selected.into_iter().skip(offset).take(per_page).collect();
        tracing::trace!(total, returned = data.len(), "In-memory page evaluated");
        Ok(Page::new(data, total, &request))
    }

    async fn fetch_all(self) -> Result<Vec<Value>, DbErr> {
        Ok(self.evaluate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "John", "age": 30, "role": "admin",
                   "posts": [{"title": "Rust tips", "published": true}]}),
            json!({"id": 2, "name": "jose", "age": 25, "role": "editor", "posts": []}),
            json!({"id": 3, "name": "Amy", "age": 30, "role": null,
                   "posts": [{"title": "Draft", "published": false}]}),
        ]
    }

    fn ids(rows: &[Value]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    fn eq(column: &str, value: Value, combinator: LogicalOperator) -> QueryOp {
        QueryOp::Predicate {
            column: ColumnExpr::Plain(column.into()),
            operator: Operator::Eq,
            value,
            combinator,
        }
    }

    // ===== LIKE =====

    #[test]
    fn test_like_wildcards() {
        assert!(like_match("John", "Jo%"));
        assert!(like_match("John", "%hn"));
        assert!(like_match("John", "%oh%"));
        assert!(like_match("John", "J_hn"));
        assert!(like_match("", "%"));
        assert!(!like_match("John", "jo%"));
        assert!(!like_match("John", "J_n"));
        assert!(!like_match("Jo", "Jo_"));
    }

    #[test]
    fn test_like_escape() {
        assert!(like_match("100%", "100\\%"));
        assert!(!like_match("1000", "100\\%"));
        assert!(like_match("a_b", "a\\_b"));
        assert!(!like_match("axb", "a\\_b"));
    }

    // ===== Scope evaluation =====

    #[test]
    fn test_and_binds_tighter_than_or() {
        // role = admin OR age = 25 AND name = Amy
        let ops = vec![
            eq("role", json!("admin"), LogicalOperator::And),
            eq("age", json!(25), LogicalOperator::Or),
            eq("name", json!("Amy"), LogicalOperator::And),
        ];
        let matched: Vec<Value> = users().into_iter().filter(|r| matches_scope(&ops, r)).collect();
        assert_eq!(ids(&matched), vec![1]);
    }

    #[test]
    fn test_first_combinator_is_ignored() {
        let ops = vec![eq("name", json!("Amy"), LogicalOperator::Or)];
        let matched: Vec<Value> = users().into_iter().filter(|r| matches_scope(&ops, r)).collect();
        assert_eq!(ids(&matched), vec![3]);
    }

    #[test]
    fn test_null_never_equals() {
        assert!(!values_equal(&Value::Null, &Value::Null));
        assert!(values_equal(&json!(30), &json!(30.0)));
        assert!(values_equal(&json!(30), &json!("30")));
        assert!(!values_equal(&json!("30"), &json!("30.0")));
    }

    #[test]
    fn test_lower_stringifies_numbers() {
        assert_eq!(lower(&json!("AbC")), json!("abc"));
        assert_eq!(lower(&json!(12)), json!("12"));
        assert_eq!(lower(&Value::Null), Value::Null);
    }

    #[test]
    fn test_lookup_nested_path() {
        let row = json!({"profile": {"city": "Lyon"}, "a.b": 1});
        assert_eq!(lookup(&row, "profile.city"), &json!("Lyon"));
        assert_eq!(lookup(&row, "a.b"), &json!(1));
        assert_eq!(lookup(&row, "profile.zip"), &Value::Null);
    }

    // ===== Recording =====

    #[test]
    fn test_empty_group_is_not_recorded() {
        let mut query = MemoryQuery::default();
        query.add_group(LogicalOperator::And, &mut |_: &mut dyn FilterQuery| {});
        assert!(query.plan().is_empty());
    }

    #[test]
    fn test_nested_group_recorded() {
        let mut query = MemoryQuery::default();
        query.add_group(LogicalOperator::And, &mut |group: &mut dyn FilterQuery| {
            group.add_in_set("id", vec![json!(1)], LogicalOperator::And);
        });
        assert_eq!(
            query.plan(),
            &[QueryOp::Group {
                combinator: LogicalOperator::And,
                ops: vec![QueryOp::InSet {
                    column: "id".into(),
                    values: vec![json!(1)],
                    combinator: LogicalOperator::And,
                }],
            }]
        );
    }

    // ===== Execution =====

    #[tokio::test]
    async fn test_relation_exists_over_array() {
        let mut query = MemoryQuery::new(users());
        query.add_relation_exists("posts", LogicalOperator::And, &mut |inner: &mut dyn FilterQuery| {
            inner.add_predicate(
                ColumnExpr::Plain("published".into()),
                Operator::Eq,
                json!(true),
                LogicalOperator::And,
            );
        });
        let rows = query.fetch_all().await.unwrap();
        assert_eq!(ids(&rows), vec![1]);
    }

    #[tokio::test]
    async fn test_in_set_and_lowered_like() {
        let mut query = MemoryQuery::new(users());
        query.add_in_set("id", vec![json!(1), json!(2)], LogicalOperator::And);
        query.add_predicate(
            ColumnExpr::Lower("name".into()),
            Operator::Like,
            json!("jo%"),
            LogicalOperator::And,
        );
        let rows = query.fetch_all().await.unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_multi_key_sort() {
        let mut query = MemoryQuery::new(users());
        query.add_order_by("age", SortDirection::Desc);
        query.add_order_by("name", SortDirection::Asc);
        assert_eq!(query.order_by().len(), 2);

        let rows = query.fetch_all().await.unwrap();
        // Amy sorts before John; jose is younger
        assert_eq!(ids(&rows), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_paginate_slices_and_counts() {
        let mut query = MemoryQuery::new(users());
        query.add_order_by("id", SortDirection::Asc);
        let page = query.paginate(PageRequest::new(2, 2, "/users")).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        assert_eq!(ids(&page.data), vec![3]);
        assert_eq!(page.from, Some(3));
        assert_eq!(page.to, Some(3));
    }

    #[tokio::test]
    async fn test_paginate_past_end_is_empty() {
        let page = MemoryQuery::new(users())
            .paginate(PageRequest::new(9, 10, "/"))
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.from, None);
    }
}
