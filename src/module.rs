//! 模块注册表
//!
//! 模块是一组具名的模块资源，构造完成后即冻结；唯一可变的是默认提供者槽位。

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::errors::{DefinitionError, DefinitionResult};
use crate::provider::{BaseProvider, Provider};
use crate::resource::{Binding, ModuleRef, Resource, ResourceKind, ResourceSpec};
use crate::types::TypeHierarchy;

struct ModuleInner {
    handle: ModuleRef,
    types: Arc<TypeHierarchy>,
    resources: Vec<Resource>,
    by_name: HashMap<String, usize>,
    default_provider: RwLock<Option<Provider>>,
}

/// A frozen, uniquely identified set of module resources.
#[derive(Clone)]
pub struct Module(Arc<ModuleInner>);

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        self.0.handle.name()
    }

    pub fn id(&self) -> Uuid {
        self.0.handle.id()
    }

    pub fn handle(&self) -> &ModuleRef {
        &self.0.handle
    }

    /// Type hierarchy shared by this module and its providers.
    pub fn types(&self) -> &Arc<TypeHierarchy> {
        &self.0.types
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.0.by_name.get(name).map(|&idx| &self.0.resources[idx])
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.0.by_name.contains_key(name)
    }

    pub fn contains(&self, resource: &Resource) -> bool {
        resource
            .name()
            .and_then(|name| self.get(name))
            .is_some_and(|own| own == resource)
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.0.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.0.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.resources.is_empty()
    }

    pub fn default_provider(&self) -> Option<Provider> {
        self.0.default_provider.read().clone()
    }

    /// Sets the provider used when this module is registered without one.
    ///
    /// The candidate is taken as `Any` so that misuse (a non-provider value,
    /// the [`BaseProvider`] placeholder) is reported as a definition error
    /// instead of being impossible to express.
    pub fn set_default_provider<C: Any>(&self, candidate: &C) -> DefinitionResult<()> {
        let candidate_any = candidate as &dyn Any;
        if candidate_any.is::<BaseProvider>() {
            return Err(DefinitionError::IsBaseProviderPlaceholder {
                module: self.name().to_string(),
            });
        }
        let provider = candidate_any.downcast_ref::<Provider>().ok_or_else(|| {
            DefinitionError::NotAProvider {
                module: self.name().to_string(),
                candidate: std::any::type_name::<C>(),
            }
        })?;
        if provider.module() != self {
            return Err(DefinitionError::ProvidesForAnotherModule {
                module: self.name().to_string(),
                provider: provider.name().to_string(),
                provider_module: provider.module().name().to_string(),
            });
        }

        tracing::debug!(module = %self.name(), provider = %provider.name(), "default provider set");
        *self.0.default_provider.write() = Some(provider.clone());
        Ok(())
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.0.handle == other.0.handle
    }
}

impl Eq for Module {}

impl Index<&str> for Module {
    type Output = Resource;

    fn index(&self, name: &str) -> &Resource {
        match self.get(name) {
            Some(resource) => resource,
            None => panic!("module {} has no resource named '{}'", self.name(), name),
        }
    }
}

impl<'a> IntoIterator for &'a Module {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.resources.iter()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("resources", &self.0.resources)
            .finish()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collects resource declarations; `build` validates and freezes them.
pub struct ModuleBuilder {
    name: String,
    types: Arc<TypeHierarchy>,
    specs: Vec<(String, ResourceSpec)>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Arc::new(TypeHierarchy::new()),
            specs: Vec::new(),
        }
    }

    pub fn types(mut self, types: Arc<TypeHierarchy>) -> Self {
        self.types = types;
        self
    }

    pub fn resource(mut self, name: impl Into<String>, spec: impl Into<ResourceSpec>) -> Self {
        self.specs.push((name.into(), spec.into()));
        self
    }

    pub fn build(self) -> DefinitionResult<Module> {
        // 先完整校验，再绑定；失败时不会有资源被消耗
        let mut seen = HashSet::new();
        for (name, spec) in &self.specs {
            if !seen.insert(name.as_str()) {
                return Err(DefinitionError::DuplicateResourceName {
                    owner: self.name.clone(),
                    name: name.clone(),
                });
            }
            if let ResourceSpec::Declared(resource) = spec {
                if resource.kind() != ResourceKind::Module {
                    return Err(DefinitionError::InvalidResourceKindInModule {
                        module: self.name.clone(),
                        name: name.clone(),
                        kind: resource.kind(),
                    });
                }
                if resource.is_bound() {
                    return Err(DefinitionError::AlreadyBound {
                        resource: resource.clone(),
                        name: name.clone(),
                        owner: self.name.clone(),
                    });
                }
            }
        }

        let handle = ModuleRef {
            id: Uuid::new_v4(),
            name: Arc::from(self.name.as_str()),
        };

        let mut resources = Vec::with_capacity(self.specs.len());
        let mut by_name = HashMap::with_capacity(self.specs.len());
        for (name, spec) in self.specs {
            let binding = Binding::in_module(name.clone(), handle.clone());
            let resource = match spec {
                ResourceSpec::Type(ty) => Resource::declare(ResourceKind::Module, ty, binding)?,
                ResourceSpec::Declared(resource) => {
                    resource.bind(binding)?;
                    resource
                }
            };
            by_name.insert(name, resources.len());
            resources.push(resource);
        }

        tracing::debug!(module = %handle.name(), resources = resources.len(), "module defined");

        Ok(Module(Arc::new(ModuleInner {
            handle,
            types: self.types,
            resources,
            by_name,
            default_provider: RwLock::new(None),
        })))
    }
}
