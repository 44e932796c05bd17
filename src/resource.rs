//! Resources: typed, named, owned slots.
//!
//! A `Resource` is a cheap handle (`Arc`) with identity semantics. It starts
//! unbound and is bound exactly once, to a module or to a provider, when its
//! owner is constructed. The transition is one-way; binding a resource a
//! second time fails with [`DefinitionError::AlreadyBound`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::errors::DefinitionError;
use crate::types::TypeKey;

/// Variant tag of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Declared by a module, produced by whichever provider is registered for it.
    Module,
    /// Internal to one provider.
    Private,
    /// Provider-local narrowing of a module resource.
    Overriding,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Module => f.write_str("module resource"),
            ResourceKind::Private => f.write_str("private resource"),
            ResourceKind::Overriding => f.write_str("overriding resource"),
        }
    }
}

/// Lightweight identity of a module, held by resources bound to it.
#[derive(Debug, Clone)]
pub struct ModuleRef {
    pub(crate) id: Uuid,
    pub(crate) name: Arc<str>,
}

impl ModuleRef {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleRef {}

/// Lightweight identity of a provider, held by resources bound to it.
#[derive(Debug, Clone)]
pub struct ProviderRef {
    pub(crate) id: Uuid,
    pub(crate) name: Arc<str>,
}

impl ProviderRef {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ProviderRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProviderRef {}

/// Where a bound resource lives.
#[derive(Debug, Clone)]
pub struct Binding {
    pub(crate) name: String,
    pub(crate) module: ModuleRef,
    pub(crate) provider: Option<ProviderRef>,
    pub(crate) overrides: Option<Resource>,
}

struct ResourceInner {
    id: Uuid,
    ty: TypeKey,
    kind: ResourceKind,
    binding: OnceLock<Binding>,
}

#[derive(Clone)]
pub struct Resource(Arc<ResourceInner>);

impl Resource {
    fn unbound(kind: ResourceKind, ty: TypeKey) -> Self {
        Self(Arc::new(ResourceInner {
            id: Uuid::new_v4(),
            ty,
            kind,
            binding: OnceLock::new(),
        }))
    }

    /// An unbound module resource, to be handed to a module builder.
    pub fn module(ty: TypeKey) -> Self {
        Self::unbound(ResourceKind::Module, ty)
    }

    /// An unbound private resource, to be handed to a provider builder.
    pub fn private(ty: TypeKey) -> Self {
        Self::unbound(ResourceKind::Private, ty)
    }

    /// An unbound overriding resource. It is matched by name against the
    /// provider's module when the provider is built.
    pub fn overriding(ty: TypeKey) -> Self {
        Self::unbound(ResourceKind::Overriding, ty)
    }

    /// Creates a resource that is bound from the start.
    pub(crate) fn declare(
        kind: ResourceKind,
        ty: TypeKey,
        binding: Binding,
    ) -> Result<Self, DefinitionError> {
        let resource = Self::unbound(kind, ty);
        resource.bind(binding)?;
        Ok(resource)
    }

    /// unbound -> bound. There is no way back.
    pub(crate) fn bind(&self, binding: Binding) -> Result<(), DefinitionError> {
        let owner = binding.owner_name().to_string();
        let name = binding.name.clone();
        self.0
            .binding
            .set(binding)
            .map_err(|_| DefinitionError::AlreadyBound {
                resource: self.clone(),
                name,
                owner,
            })
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn type_key(&self) -> TypeKey {
        self.0.ty
    }

    pub fn kind(&self) -> ResourceKind {
        self.0.kind
    }

    pub fn is_bound(&self) -> bool {
        self.0.binding.get().is_some()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.0.binding.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.binding().map(|b| b.name.as_str())
    }

    /// Module this resource belongs to. Provider resources report their
    /// provider's module.
    pub fn module_ref(&self) -> Option<&ModuleRef> {
        self.binding().map(|b| &b.module)
    }

    pub fn provider_ref(&self) -> Option<&ProviderRef> {
        self.binding().and_then(|b| b.provider.as_ref())
    }

    /// The module resource an overriding resource stands in for.
    pub fn overrides(&self) -> Option<&Resource> {
        self.binding().and_then(|b| b.overrides.as_ref())
    }

    pub(crate) fn is_owned_by_provider(&self, provider: &ProviderRef) -> bool {
        self.provider_ref() == Some(provider)
    }

    pub(crate) fn is_in_module(&self, module: &ModuleRef) -> bool {
        self.module_ref() == Some(module)
    }
}

impl Binding {
    pub(crate) fn in_module(name: impl Into<String>, module: ModuleRef) -> Self {
        Self {
            name: name.into(),
            module,
            provider: None,
            overrides: None,
        }
    }

    pub(crate) fn in_provider(
        name: impl Into<String>,
        module: ModuleRef,
        provider: ProviderRef,
        overrides: Option<Resource>,
    ) -> Self {
        Self {
            name: name.into(),
            module,
            provider: Some(provider),
            overrides,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    pub fn provider(&self) -> Option<&ProviderRef> {
        self.provider.as_ref()
    }

    fn owner_name(&self) -> &str {
        match &self.provider {
            Some(provider) => provider.name(),
            None => self.module.name(),
        }
    }
}

/// A resource declaration handed to a module or provider builder: either a
/// bare type (the owner synthesizes the resource) or an explicit resource.
#[derive(Debug, Clone)]
pub enum ResourceSpec {
    Type(TypeKey),
    Declared(Resource),
}

impl From<TypeKey> for ResourceSpec {
    fn from(ty: TypeKey) -> Self {
        ResourceSpec::Type(ty)
    }
}

impl From<Resource> for ResourceSpec {
    fn from(resource: Resource) -> Self {
        ResourceSpec::Declared(resource)
    }
}

impl From<&Resource> for ResourceSpec {
    fn from(resource: &Resource) -> Self {
        ResourceSpec::Declared(resource.clone())
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binding() {
            Some(binding) => write!(
                f,
                "{}.{}: {}",
                binding.owner_name(),
                binding.name,
                self.0.ty
            ),
            None => write!(f, "<unbound {}>: {}", self.0.kind, self.0.ty),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.0.kind)
            .field("name", &self.name())
            .field("type", &self.0.ty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_ref(name: &str) -> ModuleRef {
        ModuleRef {
            id: Uuid::new_v4(),
            name: Arc::from(name),
        }
    }

    #[test]
    fn test_resource_binds_once() {
        let resource = Resource::module(TypeKey::of::<i32>());
        assert!(!resource.is_bound());
        assert_eq!(resource.name(), None);

        resource
            .bind(Binding::in_module("a", module_ref("Some")))
            .unwrap();
        assert!(resource.is_bound());
        assert_eq!(resource.name(), Some("a"));
        assert_eq!(resource.to_string(), "Some.a: i32");

        let err = resource
            .bind(Binding::in_module("b", module_ref("Another")))
            .unwrap_err();
        match err {
            DefinitionError::AlreadyBound { name, owner, .. } => {
                assert_eq!(name, "b");
                assert_eq!(owner, "Another");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // 第一次绑定保持不变
        assert_eq!(resource.name(), Some("a"));
        assert_eq!(resource.module_ref().unwrap().name(), "Some");
    }

    #[test]
    fn test_resource_identity() {
        let a = Resource::private(TypeKey::of::<i32>());
        let b = Resource::private(TypeKey::of::<i32>());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_provider_binding_reports_provider_as_owner() {
        let module = module_ref("Some");
        let provider = ProviderRef {
            id: Uuid::new_v4(),
            name: Arc::from("SomeProvider"),
        };
        let resource = Resource::declare(
            ResourceKind::Private,
            TypeKey::of::<String>(),
            Binding::in_provider("secret", module.clone(), provider.clone(), None),
        )
        .unwrap();

        assert!(resource.is_owned_by_provider(&provider));
        assert!(resource.is_in_module(&module));
        assert_eq!(resource.to_string(), "SomeProvider.secret: String");
    }
}
