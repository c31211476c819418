//! # datatable
//!
//! Declarative filtering, sorting and pagination for data-table endpoints.
//!
//! Register [`GlobalFilter`]s, [`ColumnFilter`]s and [`CustomFilter`]s on a
//! [`DataTableService`], feed it the request payload ([`RequestParams`]) and
//! render either one [`Page`] or, for downloads, every matching row. Filters
//! only talk to the [`FilterQuery`] boundary, so the same configuration runs
//! on Sea-ORM ([`SeaQuery`]) or on in-memory JSON rows ([`MemoryQuery`]).
//!
//! ```rust,ignore
//! let query = SeaQuery::<users::Entity>::new(db)
//!     .with_relation("posts", RelationSpec::new("posts", "user_id", "id"));
//!
//! let mut table = DataTableService::new(query).with_path("/users");
//! table
//!     .set_global_filters([GlobalFilter::new("name"), GlobalFilter::new("posts.title")])?
//!     .set_column_filters([ColumnFilter::new("role_id")])?;
//! table.ingest_request(&params);
//! let rendered = table.render().await?;
//! ```

pub mod config;
pub mod database;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod pagination;
pub mod query;
pub mod resource;
pub mod service;

pub use config::DataTableConfig;
pub use database::{MemoryQuery, RelationSpec, SeaQuery};
pub use errors::DataTableError;
pub use filtering::{ApplyFilter, ColumnFilter, CustomFilter, Filter, GlobalFilter, SearchType, SortEntry};
pub use models::RequestParams;
pub use pagination::{Page, PageRequest};
pub use query::{ColumnExpr, FilterQuery, LogicalOperator, Operator, QueryExecutor, SortDirection};
pub use resource::{Resource, ResourceRegistry};
pub use service::{DataTableService, Rendered};
