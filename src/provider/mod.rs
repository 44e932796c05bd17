//! 提供者
//!
//! 提供者为一个模块的全部资源给出生产方法。构造时经过完整校验
//! （见 [`validation`]），之后只读。

mod definition;
mod validation;

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{DefinitionResult, ResolutionError, ResolutionResult};
use crate::instance::{Dependencies, Instance};
use crate::module::Module;
use crate::resource::{ProviderRef, Resource, ResourceKind, ResourceSpec};

pub use definition::{Annotation, Base, BaseProvider, Member, Parameter, ProducerFn, ProducerSpec};
pub use validation::{producer_name, RESERVED_NAMES};

/// A validated provider method: the producer for one resource and the
/// resources its parameters resolve to.
#[derive(Clone)]
pub struct ProviderMethod {
    provider: ProviderRef,
    resource: Resource,
    target: Resource,
    name: String,
    producer: ProducerSpec,
    dependencies: Vec<(String, Resource)>,
}

impl ProviderMethod {
    pub fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    /// The resource this method is looked up by. For an overridden module
    /// resource this is the module resource, not the override.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The resource whose type the method's return type was checked against.
    pub fn target(&self) -> &Resource {
        &self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn producer(&self) -> &ProducerSpec {
        &self.producer
    }

    /// Parameter name -> resource, in parameter order.
    pub fn dependencies(&self) -> &[(String, Resource)] {
        &self.dependencies
    }

    pub fn dependency(&self, parameter: &str) -> Option<&Resource> {
        self.dependencies
            .iter()
            .find(|(name, _)| name == parameter)
            .map(|(_, resource)| resource)
    }

    pub(crate) fn invoke(&self, deps: &Dependencies) -> anyhow::Result<Instance> {
        self.producer.call(deps)
    }
}

impl fmt::Debug for ProviderMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMethod")
            .field("provider", &self.provider.name())
            .field("name", &self.name)
            .field("resource", &self.resource)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

struct ProviderInner {
    handle: ProviderRef,
    module: Module,
    base: Option<Provider>,
    resources: Vec<Resource>,
    resources_by_name: HashMap<String, usize>,
    methods: Vec<ProviderMethod>,
    method_index: HashMap<Uuid, usize>,
}

/// A validated, immutable table of provider methods for one module.
#[derive(Clone)]
pub struct Provider(Arc<ProviderInner>);

impl Provider {
    pub fn builder(name: impl Into<String>, module: &Module) -> ProviderBuilder {
        ProviderBuilder::new(name, module)
    }

    /// Starts a provider that extends `base` and provides for the same module.
    pub fn subclass(name: impl Into<String>, base: &Provider) -> ProviderBuilder {
        ProviderBuilder::new(name, base.module()).extends(base)
    }

    pub fn name(&self) -> &str {
        self.0.handle.name()
    }

    pub fn id(&self) -> Uuid {
        self.0.handle.id()
    }

    pub fn handle(&self) -> &ProviderRef {
        &self.0.handle
    }

    pub fn module(&self) -> &Module {
        &self.0.module
    }

    pub fn base(&self) -> Option<&Provider> {
        self.0.base.as_ref()
    }

    /// This provider followed by its bases, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &Provider> {
        std::iter::successors(Some(self), |provider| provider.base())
    }

    pub fn extends(&self, other: &Provider) -> bool {
        self.lineage().skip(1).any(|ancestor| ancestor == other)
    }

    /// Own private and overriding resources, inherited ones included.
    /// Module resources are not part of this view.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.0.resources.iter()
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.0
            .resources_by_name
            .get(name)
            .map(|&idx| &self.0.resources[idx])
    }

    /// Looks up the provider method for `resource`.
    pub fn method(&self, resource: &Resource) -> ResolutionResult<&ProviderMethod> {
        let provider = || self.name().to_string();
        if !resource.is_bound() {
            return Err(ResolutionError::UnknownResource {
                provider: provider(),
                resource: resource.clone(),
            });
        }
        match resource.kind() {
            ResourceKind::Module => {
                if !resource.is_in_module(self.module().handle()) {
                    return Err(ResolutionError::ResourceModuleMismatch {
                        provider: provider(),
                        resource: resource.clone(),
                    });
                }
            }
            ResourceKind::Private | ResourceKind::Overriding => {
                if !resource.is_owned_by_provider(self.handle()) {
                    return Err(ResolutionError::ResourceFromDifferentProvider {
                        provider: provider(),
                        resource: resource.clone(),
                    });
                }
            }
        }

        self.0
            .method_index
            .get(&resource.id())
            .map(|&idx| &self.0.methods[idx])
            .ok_or_else(|| ResolutionError::UnknownResource {
                provider: provider(),
                resource: resource.clone(),
            })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProviderMethod> {
        self.0.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.0.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.methods.is_empty()
    }
}

impl PartialEq for Provider {
    fn eq(&self, other: &Self) -> bool {
        self.0.handle == other.0.handle
    }
}

impl Eq for Provider {}

impl Index<&str> for Provider {
    type Output = Resource;

    fn index(&self, name: &str) -> &Resource {
        match self.resource(name) {
            Some(resource) => resource,
            None => panic!("provider {} has no resource named '{}'", self.name(), name),
        }
    }
}

impl<'a> IntoIterator for &'a Provider {
    type Item = &'a ProviderMethod;
    type IntoIter = std::slice::Iter<'a, ProviderMethod>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("module", &self.module().name())
            .field("base", &self.base().map(Provider::name))
            .field("resources", &self.0.resources)
            .finish()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider definition as data; `build` runs the validation pipeline.
pub struct ProviderBuilder {
    pub(crate) name: String,
    pub(crate) module: Module,
    pub(crate) bases: Vec<Base>,
    pub(crate) members: Vec<(String, Member)>,
}

impl ProviderBuilder {
    pub fn new(name: impl Into<String>, module: &Module) -> Self {
        Self {
            name: name.into(),
            module: module.clone(),
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Adds a base. More than one base is rejected when building.
    pub fn extends(mut self, base: impl Into<Base>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn resource(mut self, name: impl Into<String>, spec: impl Into<ResourceSpec>) -> Self {
        self.members.push((name.into(), Member::Resource(spec.into())));
        self
    }

    /// Registers a provider method under its own name, e.g. `provide_a`.
    pub fn producer(mut self, name: impl Into<String>, producer: ProducerSpec) -> Self {
        self.members.push((name.into(), Member::Producer(producer)));
        self
    }

    /// Registers the provider method for resource `resource_name`.
    pub fn provides(self, resource_name: &str, producer: ProducerSpec) -> Self {
        self.producer(producer_name(resource_name), producer)
    }

    /// Any other provider-level value. Providers are closed surfaces, so this
    /// only exists to be rejected with a precise error.
    pub fn attribute(mut self, name: impl Into<String>, value: impl fmt::Debug) -> Self {
        self.members
            .push((name.into(), Member::Value(format!("{value:?}"))));
        self
    }

    pub fn member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.push((name.into(), member));
        self
    }

    pub fn build(self) -> DefinitionResult<Provider> {
        validation::define(self)
    }
}
