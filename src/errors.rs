use thiserror::Error;

use crate::resource::{Resource, ResourceKind};
use crate::types::TypeKey;

/// Umbrella error for callers that do not care which phase failed.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Raised while constructing a module or a provider. Construction is aborted;
/// nothing partially built is returned.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("resource {resource} is already bound and cannot be reused as '{name}' in {owner}")]
    AlreadyBound {
        resource: Resource,
        name: String,
        owner: String,
    },

    #[error("{owner} declares resource '{name}' more than once")]
    DuplicateResourceName { owner: String, name: String },

    #[error("module {module} cannot declare '{name}' as a {kind}")]
    InvalidResourceKindInModule {
        module: String,
        name: String,
        kind: ResourceKind,
    },

    #[error("default provider for {module} must be a provider, got {candidate}")]
    NotAProvider {
        module: String,
        candidate: &'static str,
    },

    #[error("the base provider placeholder cannot be the default provider of {module}")]
    IsBaseProviderPlaceholder { module: String },

    #[error("{provider} provides for {provider_module}, so it cannot be the default provider of {module}")]
    ProvidesForAnotherModule {
        module: String,
        provider: String,
        provider_module: String,
    },

    #[error("provider {provider} has more than one base: {bases:?}")]
    MultipleInheritanceUnsupported {
        provider: String,
        bases: Vec<String>,
    },

    #[error("provider {provider} must extend a provider, not {base}")]
    BaseNotAProvider { provider: String, base: TypeKey },

    #[error("provider {provider} provides for {module} but its base {base} provides for {base_module}")]
    BaseProvidesFromDifferentModule {
        provider: String,
        base: String,
        base_module: String,
        module: String,
    },

    #[error("'{name}' is a reserved name on provider {provider}")]
    ReservedAttributeName { provider: String, name: String },

    #[error("provider {provider} declares '{name}' more than once")]
    DuplicateAttribute { provider: String, name: String },

    #[error("provider {provider} attribute '{name}' = {value} is neither a resource nor a provider method")]
    InvalidProviderAttribute {
        provider: String,
        name: String,
        value: String,
    },

    #[error("provider {provider} cannot define module resource '{name}: {ty}'")]
    PublicResourceInProvider {
        provider: String,
        name: String,
        ty: TypeKey,
    },

    #[error("private resource '{name}' of {provider} occludes module resource {module_resource}")]
    PrivateOccludesModuleResource {
        provider: String,
        name: String,
        module_resource: Resource,
    },

    #[error("provider {provider} overrides '{name}: {ty}' but {module} has no resource with that name")]
    NameMismatch {
        provider: String,
        module: String,
        name: String,
        ty: TypeKey,
    },

    #[error("provider {provider} overrides {overrides} with '{name}: {ty}', which is not a strict subtype")]
    IncompatibleOverrideType {
        provider: String,
        name: String,
        ty: TypeKey,
        overrides: Resource,
    },

    #[error("provider {provider} redeclares '{name}: {ty}', incompatible with '{name}: {inherited}' from {base}")]
    IncompatibleInheritedResourceType {
        provider: String,
        name: String,
        ty: TypeKey,
        inherited: TypeKey,
        base: String,
    },

    #[error("provider {provider} is missing a provider method for {resource}")]
    MissingProducer { provider: String, resource: Resource },

    #[error("{provider}.provide_{name} = {value} looks like the provider method for {resource} but it is not callable", name = .resource.name().unwrap_or_default())]
    ProducerNotCallable {
        provider: String,
        resource: Resource,
        value: String,
    },

    #[error("the provider method of {provider} for {resource} has no return type")]
    MissingReturnType { provider: String, resource: Resource },

    #[error("the provider method of {provider} for {resource} returns {returned}, which is not compatible")]
    ReturnTypeMismatch {
        provider: String,
        resource: Resource,
        returned: TypeKey,
    },

    #[error("parameter '{parameter}' of the provider method for {resource} in {provider} has no type")]
    ParameterMissingType {
        provider: String,
        resource: Resource,
        parameter: String,
    },

    #[error("parameter '{parameter}' of the provider method for {resource} in {provider} has an invalid type: {annotation}")]
    InvalidParameterType {
        provider: String,
        resource: Resource,
        parameter: String,
        annotation: String,
    },

    #[error("parameter '{parameter}: {declared}' of the provider method for {resource} in {provider} names {refers_to} but the types are not compatible")]
    ParameterTypeMismatchesNamedResource {
        provider: String,
        resource: Resource,
        parameter: String,
        declared: TypeKey,
        refers_to: Resource,
    },

    #[error("parameter '{parameter}: {declared}' of the provider method for {resource} in {provider} does not refer to any resource")]
    UnrelatedParameterName {
        provider: String,
        resource: Resource,
        parameter: String,
        declared: TypeKey,
    },

    #[error("parameter '{parameter}: {declared}' of the provider method for {resource} in {provider} matches several resources: {candidates:?}")]
    AmbiguousParameterType {
        provider: String,
        resource: Resource,
        parameter: String,
        declared: TypeKey,
        candidates: Vec<Resource>,
    },

    #[error("parameter '{parameter}' of the provider method for {resource} in {provider} depends on {dependency}, owned by another provider")]
    CannotDependOnAnotherProvidersResource {
        provider: String,
        resource: Resource,
        parameter: String,
        dependency: Resource,
    },
}

/// Raised by `Container` while modules are being registered or closed.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("provider {provider} provides for {provider_module}, not {module}")]
    ModuleMismatch {
        module: String,
        provider: String,
        provider_module: String,
    },

    #[error("module {module} is already registered")]
    ModuleAlreadyRegistered { module: String },

    #[error("container registrations are closed")]
    ContainerClosed,

    #[error("module {module} was registered without a provider and has no usable default provider")]
    NoDefaultProvider { module: String },
}

/// Raised per `provide` call. The container stays usable afterwards.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("container registrations must be closed before resources can be provided")]
    ContainerNotReady,

    #[error("resource {resource} was never bound to a module or provider")]
    UnboundResource { resource: Resource },

    #[error("no provider registered for module {module} (needed for {resource}); registered: {registered:?}")]
    NoProviderForModule {
        resource: Resource,
        module: String,
        registered: Vec<String>,
    },

    #[error("provider {provider} has no provider method for {resource}")]
    UnknownResource { provider: String, resource: Resource },

    #[error("provider {provider} cannot provide {resource}, which belongs to another provider")]
    ResourceFromDifferentProvider { provider: String, resource: Resource },

    #[error("provider {provider} cannot provide {resource}, which belongs to another module")]
    ResourceModuleMismatch { provider: String, resource: Resource },

    #[error("provider resources cannot be requested from this container: {resource}")]
    ProviderResourcesNotAllowed { resource: Resource },

    #[error("{resource} belongs to a provider other than {registered}, the one registered for its module")]
    ProviderNotRegisteredForModule {
        resource: Resource,
        registered: String,
    },

    #[error("circular dependency detected: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<Resource> },

    #[error("{resource} holds a {actual}, which cannot be read as {expected}")]
    TypeMismatch {
        resource: Resource,
        expected: TypeKey,
        actual: TypeKey,
    },

    #[error("provider method for {resource} failed: {source}")]
    ProducerFailed {
        resource: Resource,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML container configuration: {0}")]
    TomlParse(#[source] toml::de::Error),
    #[error("Failed to serialize container configuration: {0}")]
    TomlSerialize(#[source] toml::ser::Error),
}

fn format_cycle(cycle: &[Resource]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type DefinitionResult<T> = Result<T, DefinitionError>;
pub type ResolutionResult<T> = Result<T, ResolutionError>;
