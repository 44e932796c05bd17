pub mod config;
pub mod container;
pub mod errors;
pub mod instance;
pub mod logging;
pub mod module;
pub mod provider;
pub mod resource;
pub mod types;

// Re-export commonly used items for convenience
pub use config::ContainerConfig;
pub use container::{Container, ContainerStats};
pub use errors::{
    ConfigError, DefinitionError, RegistrationError, ResolutionError, WiringError,
};
pub use instance::{Dependencies, Instance};
pub use module::{Module, ModuleBuilder};
pub use provider::{
    Annotation, Base, BaseProvider, Member, ProducerSpec, Provider, ProviderBuilder,
    ProviderMethod,
};
pub use resource::{Resource, ResourceKind, ResourceSpec};
pub use types::{TypeHierarchy, TypeKey};
