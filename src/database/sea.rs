//! Sea-ORM backend.
//!
//! [`SeaQuery`] wraps a `Select<E>` and translates filter calls into
//! `sea_query` conditions. Columns are addressed by name and qualified with
//! the table of the scope they are added to, so the same column name can be
//! used inside and outside a relation scope.
//!
//! Relations are not discovered from the entity: register each one with
//! [`SeaQuery::with_relation`].
//!
//! ```rust,ignore
//! let query = SeaQuery::<users::Entity>::new(db.clone())
//!     .with_relation("posts", RelationSpec::new("posts", "user_id", "id"))
//!     .with_relation("role", RelationSpec::new("roles", "id", "role_id"));
//! ```

use async_trait::async_trait;
use sea_orm::{
    Condition, DatabaseConnection, DbErr, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Select,
    sea_query::{Alias, ConditionExpression, Expr, Func, Query, SimpleExpr},
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

use crate::pagination::{Page, PageRequest};
use crate::query::{
    ColumnExpr, FilterQuery, LogicalOperator, Operator, QueryExecutor, ScopeBuilder, SortDirection,
};

/// How a named relation joins its parent table.
///
/// `RelationSpec::new("posts", "user_id", "id")` on `users` reads as
/// `posts.user_id = users.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub table: String,
    pub related_column: String,
    pub parent_column: String,
}

impl RelationSpec {
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        related_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            related_column: related_column.into(),
            parent_column: parent_column.into(),
        }
    }
}

type Relations = Arc<HashMap<String, RelationSpec>>;

/// Convert a JSON filter value into a bound SQL value.
fn to_sql_value(value: &Value) -> sea_orm::Value {
    match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else if let Some(u) = n.as_u64() {
                u.into()
            } else {
                n.as_f64().unwrap_or_default().into()
            }
        }
        Value::String(s) => s.clone().into(),
        other => other.to_string().into(),
    }
}

/// A flat list of conditions, each tagged with the operator joining it to the
/// previous one.
struct ConditionScope {
    table: String,
    relations: Relations,
    clauses: Vec<(LogicalOperator, ConditionExpression)>,
    unknown_relations: Vec<String>,
}

impl ConditionScope {
    fn new(table: impl Into<String>, relations: Relations) -> Self {
        Self {
            table: table.into(),
            relations,
            clauses: Vec::new(),
            unknown_relations: Vec::new(),
        }
    }

    fn column(&self, name: &str) -> Expr {
        let (table, column) = name.split_once('.').unwrap_or((self.table.as_str(), name));
        Expr::col((Alias::new(table), Alias::new(column)))
    }

    fn push(&mut self, combinator: LogicalOperator, clause: impl Into<ConditionExpression>) {
        self.clauses.push((combinator, clause.into()));
    }

    fn nested(&self, table: &str, build: ScopeBuilder<'_>) -> Self {
        let mut inner = Self::new(table, Arc::clone(&self.relations));
        build(&mut inner);
        inner
    }

    fn absorb(&mut self, inner: &mut Self) -> Condition {
        self.unknown_relations.append(&mut inner.unknown_relations);
        std::mem::take(&mut inner.clauses)
            .into_iter()
            .collect::<ClauseList>()
            .into_condition()
    }

    fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn into_condition(self) -> Condition {
        self.clauses.into_iter().collect::<ClauseList>().into_condition()
    }
}

/// Clauses folded with SQL precedence: `AND` runs first, then `OR` between runs.
struct ClauseList(Vec<Condition>);

impl FromIterator<(LogicalOperator, ConditionExpression)> for ClauseList {
    fn from_iter<I: IntoIterator<Item = (LogicalOperator, ConditionExpression)>>(iter: I) -> Self {
        let mut runs = Vec::new();
        let mut current: Option<Condition> = None;
        for (combinator, clause) in iter {
            current = Some(match (current.take(), combinator) {
                (Some(run), LogicalOperator::Or) => {
                    runs.push(run);
                    Condition::all().add(clause)
                }
                (Some(run), LogicalOperator::And) => run.add(clause),
                (None, _) => Condition::all().add(clause),
            });
        }
        runs.extend(current);
        Self(runs)
    }
}

impl ClauseList {
    fn into_condition(self) -> Condition {
        let mut runs = self.0;
        match runs.len() {
            0 => Condition::all(),
            1 => runs.remove(0),
            _ => runs.into_iter().fold(Condition::any(), Condition::add),
        }
    }
}

impl FilterQuery for ConditionScope {
    fn add_predicate(
        &mut self,
        column: ColumnExpr,
        operator: Operator,
        value: Value,
        combinator: LogicalOperator,
    ) {
        let target = match &column {
            ColumnExpr::Plain(name) => self.column(name),
            ColumnExpr::Lower(name) => Expr::expr(Func::lower(self.column(name))),
        };
        let expr: SimpleExpr = match (operator, &value) {
            (Operator::Like, Value::String(pattern)) => target.like(pattern.as_str()),
            (Operator::Like, other) => target.like(other.to_string()),
            (Operator::Eq, other) => target.eq(to_sql_value(other)),
        };
        self.push(combinator, expr);
    }

    fn add_group(&mut self, combinator: LogicalOperator, build: ScopeBuilder<'_>) {
        let table = self.table.clone();
        let mut inner = self.nested(&table, build);
        if inner.is_empty() {
            self.unknown_relations.append(&mut inner.unknown_relations);
            return;
        }
        let condition = self.absorb(&mut inner);
        self.push(combinator, condition);
    }

    fn add_relation_exists(
        &mut self,
        relation: &str,
        combinator: LogicalOperator,
        build: ScopeBuilder<'_>,
    ) {
        let Some(spec) = self.relations.get(relation).cloned() else {
            tracing::warn!(relation, table = %self.table, "Relation is not registered");
            self.unknown_relations.push(relation.to_string());
            return;
        };

        let mut inner = self.nested(&spec.table, build);
        let has_inner = !inner.is_empty();
        let inner_condition = self.absorb(&mut inner);

        let mut correlated = Condition::all().add(
            Expr::col((Alias::new(&spec.table), Alias::new(&spec.related_column)))
                .equals((Alias::new(&self.table), Alias::new(&spec.parent_column))),
        );
        if has_inner {
            correlated = correlated.add(inner_condition);
        }

        let mut subquery = Query::select();
        subquery
            .expr(Expr::val(1))
            .from(Alias::new(&spec.table))
            .cond_where(correlated);
        self.push(combinator, Expr::exists(subquery));
    }

    fn add_in_set(&mut self, column: &str, values: Vec<Value>, combinator: LogicalOperator) {
        let expr = self
            .column(column)
            .is_in(values.iter().map(to_sql_value).collect::<Vec<_>>());
        self.push(combinator, expr);
    }
}

/// A Sea-ORM `Select<E>` under construction.
pub struct SeaQuery<E: EntityTrait> {
    db: DatabaseConnection,
    select: Select<E>,
    scope: ConditionScope,
    order_by: Vec<(String, SortDirection)>,
}

impl<E: EntityTrait> SeaQuery<E> {
    /// Start from `E::find()`.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::from_select(db, E::find())
    }

    /// Start from an existing select, e.g. one with a base filter already
    /// applied.
    #[must_use]
    pub fn from_select(db: DatabaseConnection, select: Select<E>) -> Self {
        let table = E::default().table_name().to_string();
        Self {
            db,
            select,
            scope: ConditionScope::new(table, Arc::new(HashMap::new())),
            order_by: Vec::new(),
        }
    }

    /// Register a relation usable from dotted column keys and
    /// [`FilterQuery::add_relation_exists`].
    #[must_use]
    pub fn with_relation(mut self, name: impl Into<String>, spec: RelationSpec) -> Self {
        Arc::make_mut(&mut self.scope.relations).insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.scope.table
    }

    /// Apply the collected conditions and ordering to the select.
    ///
    /// # Errors
    ///
    /// `DbErr::Custom` if a filter referenced a relation that was never
    /// registered.
    pub fn into_select(self) -> Result<Select<E>, DbErr> {
        if !self.scope.unknown_relations.is_empty() {
            return Err(DbErr::Custom(format!(
                "Unknown relation(s) on '{}': {}",
                self.scope.table,
                self.scope.unknown_relations.join(", ")
            )));
        }

        let table = self.scope.table.clone();
        let mut select = self.select;
        if !self.scope.is_empty() {
            select = select.filter(self.scope.into_condition());
        }
        for (column, direction) in self.order_by {
            let (table, column) = column
                .split_once('.')
                .unwrap_or((table.as_str(), column.as_str()));
            let order = match direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            select = select.order_by(
                SimpleExpr::from(Expr::col((Alias::new(table), Alias::new(column)))),
                order,
            );
        }
        Ok(select)
    }
}

impl<E: EntityTrait> FilterQuery for SeaQuery<E> {
    fn add_predicate(
        &mut self,
        column: ColumnExpr,
        operator: Operator,
        value: Value,
        combinator: LogicalOperator,
    ) {
        self.scope.add_predicate(column, operator, value, combinator);
    }

    fn add_group(&mut self, combinator: LogicalOperator, build: ScopeBuilder<'_>) {
        self.scope.add_group(combinator, build);
    }

    fn add_relation_exists(
        &mut self,
        relation: &str,
        combinator: LogicalOperator,
        build: ScopeBuilder<'_>,
    ) {
        self.scope.add_relation_exists(relation, combinator, build);
    }

    fn add_in_set(&mut self, column: &str, values: Vec<Value>, combinator: LogicalOperator) {
        self.scope.add_in_set(column, values, combinator);
    }
}

#[async_trait]
impl<E> QueryExecutor for SeaQuery<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    type Row = E::Model;

    fn add_order_by(&mut self, column: &str, direction: SortDirection) {
        self.order_by.push((column.to_string(), direction));
    }

    async fn paginate(self, request: PageRequest) -> Result<Page<E::Model>, DbErr> {
        let db = self.db.clone();
        let paginator = self.into_select()?.paginate(&db, request.per_page);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(request.page - 1).await?;
        tracing::debug!(total, page = request.page, per_page = request.per_page, "Fetched page");
        Ok(Page::new(data, total, &request))
    }

    async fn fetch_all(self) -> Result<Vec<E::Model>, DbErr> {
        let db = self.db.clone();
        let rows = self.into_select()?.all(&db).await?;
        tracing::debug!(rows = rows.len(), "Fetched all rows");
        Ok(rows)
    }
}
