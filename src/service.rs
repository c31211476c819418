//! # Data table orchestration
//!
//! [`DataTableService`] is built once per request around a query, configured
//! through its setters, fed the request payload and rendered exactly once:
//!
//! ```rust,ignore
//! async fn list_users(
//!     State(db): State<DatabaseConnection>,
//!     Json(params): Json<RequestParams>,
//! ) -> Result<Rendered<users::Model>, DataTableError> {
//!     let mut table = DataTableService::new(SeaQuery::<users::Entity>::new(db))
//!         .with_path("/users");
//!     table
//!         .set_global_filters([GlobalFilter::new("name"), GlobalFilter::new("email")])?
//!         .set_column_filters([ColumnFilter::new("role_id")])?
//!         .set_download_columns(["id", "name", "email"]);
//!     table.ingest_request(&params);
//!     table.render().await
//! }
//! ```
//!
//! Filters are applied in a fixed order during [`DataTableService::ingest_request`]:
//! global filters (only when `filter.search` is set), column filters, custom
//! filters, then sorting. Global and column filters each sit in their own
//! parenthesised group so their `OR`s cannot leak into the rest of the query.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::DataTableConfig;
use crate::errors::DataTableError;
use crate::filtering::{
    ApplyFilter, ColumnFilter, CustomFilter, Filter, GlobalFilter, SortEntry,
    is_empty_search_value,
};
use crate::models::RequestParams;
use crate::pagination::{Page, PageRequest};
use crate::query::{FilterQuery, LogicalOperator, QueryExecutor};
use crate::resource::ResourceRegistry;

type RowMapper<R> = Box<dyn Fn(R) -> R + Send + Sync>;

/// What [`DataTableService::render`] produced.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Rendered<R> {
    /// Every matching row, after the download mapper
    Export(Vec<R>),
    /// One page of raw rows
    Page(Page<R>),
    /// One page reshaped by a resource mapper
    Resource(Page<Value>),
}

impl<R> Rendered<R> {
    #[must_use]
    pub fn is_export(&self) -> bool {
        matches!(self, Self::Export(_))
    }
}

impl<R: Serialize> IntoResponse for Rendered<R> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub struct DataTableService<Q: QueryExecutor> {
    query: Q,
    config: DataTableConfig,
    page: u64,
    items_per_page: u64,
    sort_by: Vec<SortEntry>,
    resource_mapper: Option<String>,
    resources: Option<Arc<ResourceRegistry<Q::Row>>>,
    global_filters: Vec<GlobalFilter>,
    column_filters: Vec<ColumnFilter>,
    custom_filters: Vec<CustomFilter>,
    request_filter: Map<String, Value>,
    download_columns: Vec<String>,
    download_mapper: Option<RowMapper<Q::Row>>,
    download_requested: bool,
    path: String,
}

impl<Q: QueryExecutor> std::fmt::Debug for DataTableService<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTableService")
            .field("page", &self.page)
            .field("items_per_page", &self.items_per_page)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Collect `filters`, failing on the first one of the wrong kind.
fn collect_kind<T>(
    filters: impl IntoIterator<Item = impl Into<Filter>>,
    expected: &str,
    pick: impl Fn(Filter) -> Option<T>,
) -> Result<Vec<T>, DataTableError> {
    filters
        .into_iter()
        .map(|filter| {
            let filter = filter.into();
            let kind = filter.kind();
            pick(filter).ok_or_else(|| {
                DataTableError::invalid(format!("Expected a {expected}, got a {kind} filter"))
            })
        })
        .collect()
}

impl<Q: QueryExecutor> DataTableService<Q> {
    #[must_use]
    pub fn new(query: Q) -> Self {
        Self::with_config(query, DataTableConfig::default())
    }

    #[must_use]
    pub fn with_config(query: Q, config: DataTableConfig) -> Self {
        Self {
            query,
            page: 1,
            items_per_page: config.initial_items_per_page(),
            config,
            sort_by: Vec::new(),
            resource_mapper: None,
            resources: None,
            global_filters: Vec::new(),
            column_filters: Vec::new(),
            custom_filters: Vec::new(),
            request_filter: Map::new(),
            download_columns: Vec::new(),
            download_mapper: None,
            download_requested: false,
            path: "/".to_string(),
        }
    }

    /// Base path used to build page URLs.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Resource mappers [`set_resource_mapper`](Self::set_resource_mapper) can pick from.
    #[must_use]
    pub fn with_resources(mut self, resources: Arc<ResourceRegistry<Q::Row>>) -> Self {
        self.resources = Some(resources);
        self
    }

    // ===== Setters =====

    /// # Errors
    ///
    /// `InvalidParameter` if `page` is below 1.
    pub fn set_page(&mut self, page: i64) -> Result<&mut Self, DataTableError> {
        match u64::try_from(page) {
            Ok(page) if page >= 1 => {
                self.page = page;
                Ok(self)
            }
            _ => Err(DataTableError::invalid("Page number must be greater than 0")),
        }
    }

    /// # Errors
    ///
    /// `InvalidParameter` unless `1 <= items_per_page <= max_items_per_page`.
    pub fn set_items_per_page(&mut self, items_per_page: i64) -> Result<&mut Self, DataTableError> {
        let max = self.config.max_items_per_page;
        match u64::try_from(items_per_page) {
            Ok(n) if (1..=max).contains(&n) => {
                self.items_per_page = n;
                Ok(self)
            }
            _ => Err(DataTableError::invalid(format!(
                "Items per page must be between 1 and {max}"
            ))),
        }
    }

    /// Replace the sort order with `entries`, each `{"key": .., "order": "asc"|"desc"}`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if any entry is malformed; the previous order is kept.
    pub fn set_sort_by(&mut self, entries: &[Value]) -> Result<&mut Self, DataTableError> {
        self.sort_by = entries
            .iter()
            .map(SortEntry::from_json)
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// `InvalidParameter` if no registry was attached with
    /// [`with_resources`](Self::with_resources) or `name` is not registered.
    pub fn set_resource_mapper(&mut self, name: &str) -> Result<&mut Self, DataTableError> {
        let known = self
            .resources
            .as_ref()
            .is_some_and(|registry| registry.contains(name));
        if !known {
            return Err(DataTableError::invalid(format!(
                "Resource mapper '{name}' is not registered"
            )));
        }
        self.resource_mapper = Some(name.to_string());
        Ok(self)
    }

    /// # Errors
    ///
    /// `InvalidParameter` if any element is not a [`GlobalFilter`].
    pub fn set_global_filters(
        &mut self,
        filters: impl IntoIterator<Item = impl Into<Filter>>,
    ) -> Result<&mut Self, DataTableError> {
        self.global_filters = collect_kind(filters, "GlobalFilter", |filter| match filter {
            Filter::Global(filter) => Some(filter),
            _ => None,
        })?;
        Ok(self)
    }

    /// # Errors
    ///
    /// `InvalidParameter` if any element is not a [`ColumnFilter`].
    pub fn set_column_filters(
        &mut self,
        filters: impl IntoIterator<Item = impl Into<Filter>>,
    ) -> Result<&mut Self, DataTableError> {
        self.column_filters = collect_kind(filters, "ColumnFilter", |filter| match filter {
            Filter::Column(filter) => Some(filter),
            _ => None,
        })?;
        Ok(self)
    }

    /// # Errors
    ///
    /// `InvalidParameter` if any element is not a [`CustomFilter`].
    pub fn set_custom_filters(
        &mut self,
        filters: impl IntoIterator<Item = impl Into<Filter>>,
    ) -> Result<&mut Self, DataTableError> {
        self.custom_filters = collect_kind(filters, "CustomFilter", |filter| match filter {
            Filter::Custom(filter) => Some(filter),
            _ => None,
        })?;
        Ok(self)
    }

    pub fn set_download_columns(
        &mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.download_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Transform applied to each row of an export.
    pub fn set_download_mapper<F>(&mut self, mapper: F) -> &mut Self
    where
        F: Fn(Q::Row) -> Q::Row + Send + Sync + 'static,
    {
        self.download_mapper = Some(Box::new(mapper));
        self
    }

    // ===== Request ingestion =====

    /// Read paging, sorting, filter and export settings from the request and
    /// apply every registered filter to the query.
    ///
    /// Never fails: out of range paging values are clamped and malformed sort
    /// entries are dropped.
    pub fn ingest_request(&mut self, params: &RequestParams) -> &mut Self {
        self.page = match params.page {
            Some(page) if page >= 1 => u64::try_from(page).unwrap_or(1),
            Some(page) => {
                tracing::warn!(page, "Page below 1 requested, using page 1");
                1
            }
            None => 1,
        };

        if let Some(requested) = params.items_per_page {
            let clamped = self.config.clamp_items_per_page(requested);
            if i64::try_from(clamped).ok() != Some(requested) {
                tracing::warn!(requested, clamped, "Items per page out of range, clamping");
            }
            self.items_per_page = clamped;
        }

        self.sort_by = SortEntry::parse_request(&params.sort_by);
        self.request_filter = params.filter.clone();
        self.download_requested = params.download;

        self.apply_filters();
        self
    }

    fn apply_filters(&mut self) {
        let Self {
            query,
            global_filters,
            column_filters,
            custom_filters,
            request_filter,
            sort_by,
            ..
        } = self;

        if let Some(search) = request_filter
            .get("search")
            .filter(|search| !is_empty_search_value(search))
        {
            tracing::debug!(count = global_filters.len(), "Applying global filters");
            query.add_group(LogicalOperator::And, &mut |group: &mut dyn FilterQuery| {
                for filter in global_filters.iter() {
                    filter.apply(group, search);
                }
            });
        }

        let payload = Value::Object(request_filter.clone());

        tracing::debug!(count = column_filters.len(), "Applying column filters");
        query.add_group(LogicalOperator::And, &mut |group: &mut dyn FilterQuery| {
            for filter in column_filters.iter() {
                filter.apply(group, &payload);
            }
        });

        tracing::debug!(count = custom_filters.len(), "Applying custom filters");
        for filter in custom_filters.iter() {
            filter.apply(query, &payload);
        }

        for entry in sort_by.iter() {
            query.add_order_by(&entry.key, entry.order);
        }
    }

    // ===== Output =====

    /// True when the request asked for a download and there are columns to
    /// export.
    #[must_use]
    pub fn expects_export(&self) -> bool {
        self.download_requested && !self.download_columns.is_empty()
    }

    /// Fetch the current page.
    ///
    /// # Errors
    ///
    /// `DataTableError::Query` if the query engine fails.
    pub async fn apply_pagination(self) -> Result<Page<Q::Row>, DataTableError> {
        let request = PageRequest::new(self.page, self.items_per_page, self.path);
        Ok(self.query.paginate(request).await?)
    }

    /// Run the query: every row for an export, one page otherwise.
    ///
    /// # Errors
    ///
    /// `DataTableError::Query` if the query engine fails.
    pub async fn render(self) -> Result<Rendered<Q::Row>, DataTableError> {
        if self.expects_export() {
            tracing::debug!(columns = ?self.download_columns, "Rendering export");
            let mapper = self.download_mapper;
            let rows = self.query.fetch_all().await?;
            let rows = match mapper {
                Some(mapper) => rows.into_iter().map(mapper).collect(),
                None => rows,
            };
            return Ok(Rendered::Export(rows));
        }

        let resource = self
            .resource_mapper
            .as_deref()
            .zip(self.resources.as_ref())
            .and_then(|(name, registry)| registry.resolve(name));
        tracing::debug!(
            page = self.page,
            per_page = self.items_per_page,
            resource = ?self.resource_mapper,
            "Rendering page"
        );

        let request = PageRequest::new(self.page, self.items_per_page, self.path);
        let page = self.query.paginate(request).await?;
        Ok(match resource {
            Some(resource) => Rendered::Resource(page.map(|rows| resource.collection(rows))),
            None => Rendered::Page(page),
        })
    }

    // ===== Accessors =====

    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn items_per_page(&self) -> u64 {
        self.items_per_page
    }

    #[must_use]
    pub fn sort_by(&self) -> &[SortEntry] {
        &self.sort_by
    }

    #[must_use]
    pub fn resource_mapper(&self) -> Option<&str> {
        self.resource_mapper.as_deref()
    }

    #[must_use]
    pub fn global_filters(&self) -> &[GlobalFilter] {
        &self.global_filters
    }

    #[must_use]
    pub fn column_filters(&self) -> &[ColumnFilter] {
        &self.column_filters
    }

    #[must_use]
    pub fn custom_filters(&self) -> &[CustomFilter] {
        &self.custom_filters
    }

    #[must_use]
    pub fn request_filter(&self) -> &Map<String, Value> {
        &self.request_filter
    }

    #[must_use]
    pub fn download_columns(&self) -> &[String] {
        &self.download_columns
    }

    #[must_use]
    pub fn download_requested(&self) -> bool {
        self.download_requested
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn config(&self) -> &DataTableConfig {
        &self.config
    }

    #[must_use]
    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Q {
        &mut self.query
    }
}
