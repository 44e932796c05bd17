pub mod container_config;
pub mod loader;

pub use container_config::{ContainerConfig, PartialContainerConfig};
pub use loader::ConfigLoader;
