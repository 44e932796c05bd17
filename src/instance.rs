//! Type-erased values produced by provider methods.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;

use crate::types::TypeKey;

/// A produced value together with the concrete type it was produced as.
#[derive(Clone)]
pub struct Instance {
    ty: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            value: Arc::new(value),
        }
    }

    /// Concrete type of the wrapped value.
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Both handles point at the same cached value.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("type", &self.ty).finish_non_exhaustive()
    }
}

/// Resolved arguments of one provider method call, keyed by parameter name.
#[derive(Debug, Default, Clone)]
pub struct Dependencies {
    values: HashMap<String, Instance>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, parameter: impl Into<String>, instance: Instance) {
        self.values.insert(parameter.into(), instance);
    }

    pub fn instance(&self, parameter: &str) -> Option<&Instance> {
        self.values.get(parameter)
    }

    /// Typed access for use inside provider methods: `deps.get::<i32>("b")?`.
    pub fn get<T: Any + Send + Sync>(&self, parameter: &str) -> anyhow::Result<Arc<T>> {
        let instance = self
            .values
            .get(parameter)
            .ok_or_else(|| anyhow!("no dependency named '{}'", parameter))?;
        instance.downcast::<T>().ok_or_else(|| {
            anyhow!(
                "dependency '{}' holds a {}, not a {}",
                parameter,
                instance.type_key(),
                TypeKey::of::<T>()
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_downcast() {
        let instance = Instance::new(10_i32);
        assert_eq!(instance.type_key(), TypeKey::of::<i32>());
        assert_eq!(*instance.downcast::<i32>().unwrap(), 10);
        assert!(instance.downcast::<String>().is_none());
        assert!(instance.ptr_eq(&instance.clone()));
        assert!(!instance.ptr_eq(&Instance::new(10_i32)));
    }

    #[test]
    fn test_dependencies_typed_access() {
        let mut deps = Dependencies::new();
        deps.insert("b", Instance::new(10_i32));

        assert_eq!(*deps.get::<i32>("b").unwrap(), 10);
        let wrong_type = deps.get::<String>("b").unwrap_err();
        assert!(wrong_type.to_string().contains("not a String"));
        assert!(deps.get::<i32>("missing").is_err());
    }
}
