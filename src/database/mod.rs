// Query backends implementing `FilterQuery` and `QueryExecutor`

pub mod memory;
pub mod sea;

pub use memory::{MemoryQuery, QueryOp};
pub use sea::{RelationSpec, SeaQuery};
