//! Declarative inputs of a provider definition.
//!
//! A provider is described as plain data: named members (resources, provider
//! methods, or anything else), plus an optional base. The validation pipeline
//! in [`super::validation`] turns that description into a [`super::Provider`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::instance::{Dependencies, Instance};
use crate::resource::{Resource, ResourceSpec};
use crate::types::TypeKey;

use super::Provider;

/// Body of a provider method.
pub type ProducerFn = Arc<dyn Fn(&Dependencies) -> anyhow::Result<Instance> + Send + Sync>;

/// What a parameter declares as its type.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// A type, matched against visible resources by type, then by name.
    Type(TypeKey),
    /// A direct reference to a resource.
    Resource(Resource),
    /// Something that is not a type at all.
    Invalid(String),
}

impl From<TypeKey> for Annotation {
    fn from(ty: TypeKey) -> Self {
        Annotation::Type(ty)
    }
}

impl From<Resource> for Annotation {
    fn from(resource: Resource) -> Self {
        Annotation::Resource(resource)
    }
}

impl From<&Resource> for Annotation {
    fn from(resource: &Resource) -> Self {
        Annotation::Resource(resource.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) annotation: Option<Annotation>,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }
}

/// A provider method: return type, parameters and body.
#[derive(Clone)]
pub struct ProducerSpec {
    pub(crate) returns: Option<TypeKey>,
    pub(crate) params: Vec<Parameter>,
    pub(crate) body: ProducerFn,
}

impl ProducerSpec {
    /// 声明返回类型为 `T` 的提供者方法
    pub fn returning<T, F>(body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Dependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            returns: Some(TypeKey::of::<T>()),
            params: Vec::new(),
            body: Arc::new(move |deps| body(deps).map(Instance::new)),
        }
    }

    /// A method without a declared return type. Always rejected at
    /// definition time; exists so that the mistake can be expressed.
    pub fn without_return_type<F>(body: F) -> Self
    where
        F: Fn(&Dependencies) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        Self {
            returns: None,
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, name: impl Into<String>, annotation: impl Into<Annotation>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            annotation: Some(annotation.into()),
        });
        self
    }

    pub fn untyped_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            annotation: None,
        });
        self
    }

    pub fn returns(&self) -> Option<TypeKey> {
        self.returns
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub(crate) fn call(&self, deps: &Dependencies) -> anyhow::Result<Instance> {
        (self.body)(deps)
    }
}

impl fmt::Debug for ProducerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerSpec")
            .field("returns", &self.returns)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// One named entry of a provider definition.
#[derive(Debug, Clone)]
pub enum Member {
    Resource(ResourceSpec),
    Producer(ProducerSpec),
    /// Any other value, kept as its debug rendering.
    Value(String),
}

/// The abstract root of all providers. It is never a usable provider itself:
/// extending it means "no base", and it cannot serve as a default provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseProvider;

/// Candidate base of a provider definition.
#[derive(Debug, Clone)]
pub enum Base {
    Provider(Provider),
    Placeholder,
    /// A base that is not a provider at all.
    Foreign(TypeKey),
}

impl Base {
    pub fn foreign<T: Any + ?Sized>() -> Self {
        Base::Foreign(TypeKey::of::<T>())
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Base::Provider(provider) => provider.name().to_string(),
            Base::Placeholder => "BaseProvider".to_string(),
            Base::Foreign(ty) => ty.to_string(),
        }
    }
}

impl From<Provider> for Base {
    fn from(provider: Provider) -> Self {
        Base::Provider(provider)
    }
}

impl From<&Provider> for Base {
    fn from(provider: &Provider) -> Self {
        Base::Provider(provider.clone())
    }
}

impl From<BaseProvider> for Base {
    fn from(_: BaseProvider) -> Self {
        Base::Placeholder
    }
}
