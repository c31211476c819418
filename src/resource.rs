//! Output shaping for paginated results.
//!
//! A [`Resource`] turns a row into the JSON a client should see (hiding
//! columns, renaming fields, adding computed values). Resources are
//! registered by name in a [`ResourceRegistry`] so a data table can pick one
//! with [`DataTableService::set_resource_mapper`](crate::service::DataTableService::set_resource_mapper).

use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};

pub trait Resource<R>: Send + Sync {
    fn to_resource(&self, row: &R) -> Value;

    fn collection(&self, rows: Vec<R>) -> Vec<Value> {
        rows.iter().map(|row| self.to_resource(row)).collect()
    }
}

impl<R, F> Resource<R> for F
where
    F: Fn(&R) -> Value + Send + Sync,
{
    fn to_resource(&self, row: &R) -> Value {
        self(row)
    }
}

pub struct ResourceRegistry<R> {
    mappers: HashMap<String, Arc<dyn Resource<R>>>,
}

impl<R> Default for ResourceRegistry<R> {
    fn default() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }
}

impl<R> fmt::Debug for ResourceRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.mappers.keys().collect();
        names.sort();
        f.debug_struct("ResourceRegistry").field("names", &names).finish()
    }
}

impl<R> ResourceRegistry<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource` under `name`, replacing any previous one.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, resource: impl Resource<R> + 'static) -> Self {
        self.mappers.insert(name.into(), Arc::new(resource));
        self
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Resource<R>>> {
        self.mappers.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct UpperName;

    impl Resource<(u32, &'static str)> for UpperName {
        fn to_resource(&self, row: &(u32, &'static str)) -> Value {
            json!({"id": row.0, "name": row.1.to_uppercase()})
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ResourceRegistry::new()
            .register("upper", UpperName)
            .register("id_only", |row: &(u32, &'static str)| json!({"id": row.0}));

        assert!(registry.contains("upper"));
        assert!(registry.resolve("missing").is_none());

        let upper = registry.resolve("upper").unwrap();
        assert_eq!(
            upper.collection(vec![(1, "amy")]),
            vec![json!({"id": 1, "name": "AMY"})]
        );

        let id_only = registry.resolve("id_only").unwrap();
        assert_eq!(id_only.to_resource(&(7, "x")), json!({"id": 7}));
    }

    #[test]
    fn test_debug_lists_names() {
        let registry: ResourceRegistry<u32> = ResourceRegistry::new()
            .register("b", |_: &u32| Value::Null)
            .register("a", |_: &u32| Value::Null);
        assert_eq!(format!("{registry:?}"), r#"ResourceRegistry { names: ["a", "b"] }"#);
    }
}
