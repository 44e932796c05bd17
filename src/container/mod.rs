//! 依赖注入容器
//!
//! 注册阶段（`&mut self`）把模块绑定到提供者；`close_registrations` 之后
//! 绑定表冻结，容器可以被克隆并在多个任务间并发 `provide`，所有克隆共享同一个缓存。

mod graph;

use std::any::Any;
use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::errors::{RegistrationError, ResolutionError, ResolutionResult};
use crate::instance::Instance;
use crate::module::Module;
use crate::provider::Provider;
use crate::resource::Resource;
use crate::types::TypeKey;

pub use graph::ContainerStats;
use graph::ResolutionGraph;

/// One registration: a module and, unless it is left to the module's default,
/// the provider bound to it.
#[derive(Clone)]
struct Registration {
    module: Module,
    provider: Option<Provider>,
}

#[derive(Clone)]
pub struct Container {
    config: ContainerConfig,
    registrations: Vec<Registration>,
    graph: Option<Arc<ResolutionGraph>>,
}

impl Container {
    /// 创建空容器，使用默认配置
    pub fn empty() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            config,
            registrations: Vec::new(),
            graph: None,
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Binds `module` to `provider`.
    pub fn register(&mut self, module: &Module, provider: &Provider) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        if provider.module() != module {
            return Err(RegistrationError::ModuleMismatch {
                module: module.name().to_string(),
                provider: provider.name().to_string(),
                provider_module: provider.module().name().to_string(),
            });
        }
        self.ensure_not_registered(module)?;

        tracing::debug!(module = %module.name(), provider = %provider.name(), "module registered");
        self.registrations.push(Registration {
            module: module.clone(),
            provider: Some(provider.clone()),
        });
        Ok(())
    }

    /// Declares `module` without a provider; it is bound to its default
    /// provider when registrations are closed.
    pub fn register_module(&mut self, module: &Module) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        self.ensure_not_registered(module)?;

        tracing::debug!(module = %module.name(), "module declared, provider deferred to default");
        self.registrations.push(Registration {
            module: module.clone(),
            provider: None,
        });
        Ok(())
    }

    /// Ends the registration phase. On failure the container stays open.
    pub fn close_registrations(&mut self) -> Result<(), RegistrationError> {
        self.ensure_open()?;

        let mut bindings = Vec::with_capacity(self.registrations.len());
        for registration in &self.registrations {
            let provider = match &registration.provider {
                Some(provider) => provider.clone(),
                None => self.default_provider_for(&registration.module)?,
            };
            bindings.push((registration.module.clone(), provider));
        }

        tracing::info!(modules = bindings.len(), "container registrations closed");
        self.graph = Some(Arc::new(ResolutionGraph::new(self.config, bindings)));
        Ok(())
    }

    fn default_provider_for(&self, module: &Module) -> Result<Provider, RegistrationError> {
        let default = if self.config.use_default_providers {
            module.default_provider()
        } else {
            None
        };
        default.ok_or_else(|| RegistrationError::NoDefaultProvider {
            module: module.name().to_string(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.graph.is_some()
    }

    pub fn is_registered(&self, module: &Module) -> bool {
        self.registrations.iter().any(|r| r.module == *module)
    }

    /// The provider bound to `module`. Before close, a module declared through
    /// [`Container::register_module`] has none yet.
    pub fn provider_for(&self, module: &Module) -> Option<Provider> {
        if let Some(graph) = &self.graph {
            return graph.provider_for_module(module).cloned();
        }
        self.registrations
            .iter()
            .find(|r| r.module == *module)
            .and_then(|r| r.provider.clone())
    }

    /// Modules in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.registrations.iter().map(|r| &r.module)
    }

    /// Resolves `resource`, building and caching it and everything it depends
    /// on as needed.
    pub async fn provide(&self, resource: &Resource) -> ResolutionResult<Instance> {
        let graph = self.graph.as_ref().ok_or(ResolutionError::ContainerNotReady)?;
        graph.provide(resource).await
    }

    /// Typed variant of [`Container::provide`]. `T` must be the concrete type
    /// the provider method produced.
    pub async fn provide_as<T: Any + Send + Sync>(&self, resource: &Resource) -> ResolutionResult<Arc<T>> {
        let instance = self.provide(resource).await?;
        instance
            .downcast::<T>()
            .ok_or_else(|| ResolutionError::TypeMismatch {
                resource: resource.clone(),
                expected: TypeKey::of::<T>(),
                actual: instance.type_key(),
            })
    }

    /// 获取容器统计信息；注册阶段全为零
    pub fn stats(&self) -> ContainerStats {
        self.graph
            .as_ref()
            .map(|graph| graph.stats())
            .unwrap_or_default()
    }

    /// Number of resources with a cached value.
    pub fn cached(&self) -> usize {
        self.graph.as_ref().map_or(0, |graph| graph.cached())
    }

    fn ensure_open(&self) -> Result<(), RegistrationError> {
        if self.is_closed() {
            return Err(RegistrationError::ContainerClosed);
        }
        Ok(())
    }

    fn ensure_not_registered(&self, module: &Module) -> Result<(), RegistrationError> {
        if self.is_registered(module) {
            return Err(RegistrationError::ModuleAlreadyRegistered {
                module: module.name().to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("config", &self.config)
            .field(
                "modules",
                &self.modules().map(Module::name).collect::<Vec<_>>(),
            )
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProducerSpec;

    fn module_with_provider() -> (Module, Provider) {
        let module = Module::builder("SomeModule")
            .resource("a", TypeKey::of::<i32>())
            .build()
            .unwrap();
        let provider = Provider::builder("SomeProvider", &module)
            .provides("a", ProducerSpec::returning(|_| Ok(10_i32)))
            .build()
            .unwrap();
        (module, provider)
    }

    #[tokio::test]
    async fn test_provide_requires_close() {
        let (module, provider) = module_with_provider();
        let mut container = Container::empty();
        container.register(&module, &provider).unwrap();

        let err = container.provide(&module["a"]).await.unwrap_err();
        assert!(matches!(err, ResolutionError::ContainerNotReady));

        container.close_registrations().unwrap();
        assert_eq!(*container.provide_as::<i32>(&module["a"]).await.unwrap(), 10);
    }

    #[test]
    fn test_close_twice() {
        let mut container = Container::empty();
        container.close_registrations().unwrap();
        assert!(matches!(
            container.close_registrations(),
            Err(RegistrationError::ContainerClosed)
        ));
    }

    #[test]
    fn test_failed_close_keeps_container_open() {
        let (module, provider) = module_with_provider();
        let mut container = Container::empty();
        container.register_module(&module).unwrap();

        assert!(matches!(
            container.close_registrations(),
            Err(RegistrationError::NoDefaultProvider { .. })
        ));
        assert!(!container.is_closed());

        module.set_default_provider(&provider).unwrap();
        container.close_registrations().unwrap();
        assert_eq!(container.provider_for(&module), Some(provider));
    }

    #[tokio::test]
    async fn test_provide_as_wrong_type() {
        let (module, provider) = module_with_provider();
        let mut container = Container::empty();
        container.register(&module, &provider).unwrap();
        container.close_registrations().unwrap();

        let err = container.provide_as::<String>(&module["a"]).await.unwrap_err();
        match err {
            ResolutionError::TypeMismatch { expected, actual, .. } => {
                assert_eq!(expected, TypeKey::of::<String>());
                assert_eq!(actual, TypeKey::of::<i32>());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
