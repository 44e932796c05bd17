//! 解析引擎
//!
//! 已关闭容器的只读绑定表加上按资源划分的单例缓存。
//! 依赖总是在进入资源自己的 `OnceCell` 之前解析完成，因此一个 cell
//! 只会在生产方法执行期间被占用，并发解析不会互相等待成环。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::ContainerConfig;
use crate::errors::{ResolutionError, ResolutionResult};
use crate::instance::{Dependencies, Instance};
use crate::module::Module;
use crate::provider::Provider;
use crate::resource::{Resource, ResourceKind};

/// 内部统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    producer_invocations: AtomicUsize,
}

/// Snapshot of a container's resolution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// Every resource visited, requested or pulled in as a dependency.
    pub total_resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// 实际执行生产方法的次数
    pub producer_invocations: usize,
}

impl ContainerStats {
    pub fn total(&self) -> usize {
        self.total_resolutions
    }

    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total() as f64
        }
    }
}

pub(crate) struct ResolutionGraph {
    config: ContainerConfig,
    /// module id -> provider
    providers: HashMap<Uuid, Provider>,
    /// 注册顺序的模块名，用于错误信息
    module_names: Vec<String>,
    /// resource id -> cached value
    cache: DashMap<Uuid, Arc<OnceCell<Instance>>>,
    stats: InnerStats,
}

impl ResolutionGraph {
    pub(crate) fn new(config: ContainerConfig, bindings: Vec<(Module, Provider)>) -> Self {
        let module_names = bindings
            .iter()
            .map(|(module, _)| module.name().to_string())
            .collect();
        let providers = bindings
            .into_iter()
            .map(|(module, provider)| (module.id(), provider))
            .collect();

        Self {
            config,
            providers,
            module_names,
            cache: DashMap::new(),
            stats: InnerStats::default(),
        }
    }

    pub(crate) fn provider_for_module(&self, module: &Module) -> Option<&Provider> {
        self.providers.get(&module.id())
    }

    /// Entry point of `provide`: the module must be registered, then access
    /// rules for provider resources, then the recursive resolution.
    pub(crate) async fn provide(&self, resource: &Resource) -> ResolutionResult<Instance> {
        if !resource.is_bound() {
            return Err(ResolutionError::UnboundResource {
                resource: resource.clone(),
            });
        }

        let registered = self.provider_for(resource)?;
        if resource.kind() != ResourceKind::Module {
            if !self.config.allow_provider_resources {
                return Err(ResolutionError::ProviderResourcesNotAllowed {
                    resource: resource.clone(),
                });
            }
            if !resource.is_owned_by_provider(registered.handle()) {
                return Err(ResolutionError::ProviderNotRegisteredForModule {
                    resource: resource.clone(),
                    registered: registered.name().to_string(),
                });
            }
        }

        self.resolve(resource.clone(), Vec::new()).await
    }

    fn provider_for(&self, resource: &Resource) -> ResolutionResult<&Provider> {
        let module = resource
            .module_ref()
            .ok_or_else(|| ResolutionError::UnboundResource {
                resource: resource.clone(),
            })?;
        self.providers
            .get(&module.id())
            .ok_or_else(|| ResolutionError::NoProviderForModule {
                resource: resource.clone(),
                module: module.name().to_string(),
                registered: self.module_names.clone(),
            })
    }

    /// 递归解析；`chain` 是本次调用链上正在解析的资源
    fn resolve<'a>(
        &'a self,
        resource: Resource,
        chain: Vec<Resource>,
    ) -> BoxFuture<'a, ResolutionResult<Instance>> {
        async move {
            self.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);

            // 覆盖资源与它覆盖的模块资源共享同一个缓存槽
            let key = resource.overrides().cloned().unwrap_or(resource);

            let cached = self
                .cache
                .get(&key.id())
                .and_then(|cell| cell.value().get().cloned());
            if let Some(instance) = cached {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(resource = %key, "cache hit");
                return Ok(instance);
            }
            self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

            if let Some(start) = chain.iter().position(|r| *r == key) {
                let mut cycle = chain[start..].to_vec();
                cycle.push(key);
                tracing::warn!(
                    cycle = ?cycle.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "circular dependency"
                );
                return Err(ResolutionError::CyclicDependency { cycle });
            }

            let provider = self.provider_for(&key)?;
            let method = provider.method(&key)?;

            let mut chain = chain;
            chain.push(key.clone());
            let mut deps = Dependencies::new();
            for (parameter, dependency) in method.dependencies() {
                let value = self.resolve(dependency.clone(), chain.clone()).await?;
                deps.insert(parameter.clone(), value);
            }

            let cell = self
                .cache
                .entry(key.id())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();

            let instance = cell
                .get_or_try_init(|| async {
                    self.stats.producer_invocations.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        resource = %key,
                        provider = %provider.name(),
                        method = %method.name(),
                        "invoking provider method"
                    );
                    method
                        .invoke(&deps)
                        .map_err(|source| ResolutionError::ProducerFailed {
                            resource: key.clone(),
                            source,
                        })
                })
                .await?;

            Ok(instance.clone())
        }
        .boxed()
    }

    pub(crate) fn stats(&self) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            producer_invocations: self.stats.producer_invocations.load(Ordering::Relaxed),
        }
    }

    /// Number of resources with a cached value.
    pub(crate) fn cached(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }
}
