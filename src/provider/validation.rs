//! Provider definition pipeline.
//!
//! 按顺序执行，遇到第一个错误即中止：
//! 继承检查 -> 成员名检查 -> 资源收集与绑定 -> 非法成员值 ->
//! 生产方法完整性 -> 返回类型 -> 参数解析

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{DefinitionError, DefinitionResult};
use crate::module::Module;
use crate::resource::{Binding, ProviderRef, Resource, ResourceKind, ResourceSpec};
use crate::types::{TypeHierarchy, TypeKey};

use super::definition::{Annotation, Base, Member, Parameter, ProducerSpec};
use super::{Provider, ProviderBuilder, ProviderInner, ProviderMethod};

/// Member names a provider definition may not use.
pub const RESERVED_NAMES: [&str; 2] = ["module", "resources"];

const PRODUCER_PREFIX: &str = "provide_";

/// Name of the provider method responsible for `resource_name`.
pub fn producer_name(resource_name: &str) -> String {
    format!("{PRODUCER_PREFIX}{resource_name}")
}

struct Context<'a> {
    provider: &'a str,
    module: &'a Module,
    types: &'a TypeHierarchy,
}

impl Context<'_> {
    fn provider(&self) -> String {
        self.provider.to_string()
    }
}

/// A provider resource before it is bound.
struct Declared {
    name: String,
    kind: ResourceKind,
    ty: TypeKey,
    supplied: Option<Resource>,
    overrides: Option<Resource>,
}

/// A resource the provider must have a method for.
struct Target {
    /// Lookup key: the module resource, or the private resource itself.
    key: Resource,
    /// Type bound: the override when there is one, otherwise `key`.
    bound: Resource,
}

impl Target {
    fn method_name(&self) -> String {
        producer_name(self.bound.name().unwrap_or_default())
    }

    fn is(&self, resource: &Resource) -> bool {
        self.key == *resource || self.bound == *resource
    }
}

/// What a parameter of one provider method can see.
struct Scope<'a> {
    handle: &'a ProviderRef,
    base: Option<&'a Provider>,
    own: &'a [Resource],
    visible: &'a [Resource],
}

pub(super) fn define(builder: ProviderBuilder) -> DefinitionResult<Provider> {
    let ProviderBuilder {
        name,
        module,
        bases,
        members,
    } = builder;
    let types = Arc::clone(module.types());
    let cx = Context {
        provider: &name,
        module: &module,
        types: &types,
    };

    let base = check_inheritance(&cx, bases)?;
    check_member_names(&cx, &members)?;

    let mut resource_specs = Vec::new();
    let mut own_producers = Vec::new();
    let mut values = Vec::new();
    for (member_name, member) in members {
        match member {
            Member::Resource(spec) => resource_specs.push((member_name, spec)),
            Member::Producer(producer) => own_producers.push((member_name, producer)),
            Member::Value(value) => values.push((member_name, value)),
        }
    }

    let declarations = collect_resources(&cx, base.as_ref(), resource_specs)?;
    let handle = ProviderRef {
        id: Uuid::new_v4(),
        name: Arc::from(name.as_str()),
    };
    let resources = bind_resources(&cx, &handle, declarations)?;

    let targets = collect_targets(&module, &resources);
    let producers = effective_producers(base.as_ref(), own_producers, &values);
    check_values(&cx, &targets, &values)?;
    check_orphan_producers(&cx, &targets, &producers)?;

    let visible = visible_resources(&module, &resources);
    let scope = Scope {
        handle: &handle,
        base: base.as_ref(),
        own: &resources,
        visible: &visible,
    };

    let mut methods = Vec::with_capacity(targets.len());
    for target in &targets {
        let method_name = target.method_name();
        let producer = producers
            .iter()
            .find(|(candidate, _)| *candidate == method_name)
            .map(|(_, producer)| producer)
            .ok_or_else(|| DefinitionError::MissingProducer {
                provider: cx.provider(),
                resource: target.bound.clone(),
            })?;
        check_return_type(&cx, target, producer)?;

        let dependencies = producer
            .params()
            .iter()
            .map(|param| {
                resolve_parameter(&cx, &scope, target, param)
                    .map(|resource| (param.name().to_string(), resource))
            })
            .collect::<DefinitionResult<Vec<_>>>()?;

        methods.push(ProviderMethod {
            provider: handle.clone(),
            resource: target.key.clone(),
            target: target.bound.clone(),
            name: method_name,
            producer: producer.clone(),
            dependencies,
        });
    }

    let mut method_index = HashMap::with_capacity(methods.len() * 2);
    for (idx, method) in methods.iter().enumerate() {
        method_index.insert(method.resource.id(), idx);
        method_index.insert(method.target.id(), idx);
    }
    let resources_by_name = resources
        .iter()
        .enumerate()
        .filter_map(|(idx, resource)| resource.name().map(|name| (name.to_string(), idx)))
        .collect();

    tracing::debug!(
        provider = %name,
        module = %module.name(),
        base = ?base.as_ref().map(Provider::name),
        methods = methods.len(),
        "provider defined"
    );

    Ok(Provider(Arc::new(ProviderInner {
        handle,
        module: module.clone(),
        base,
        resources,
        resources_by_name,
        methods,
        method_index,
    })))
}

fn check_inheritance(cx: &Context<'_>, bases: Vec<Base>) -> DefinitionResult<Option<Provider>> {
    if bases.len() > 1 {
        return Err(DefinitionError::MultipleInheritanceUnsupported {
            provider: cx.provider(),
            bases: bases.iter().map(Base::describe).collect(),
        });
    }

    match bases.into_iter().next() {
        None | Some(Base::Placeholder) => Ok(None),
        Some(Base::Foreign(ty)) => Err(DefinitionError::BaseNotAProvider {
            provider: cx.provider(),
            base: ty,
        }),
        Some(Base::Provider(base)) => {
            if base.module() != cx.module {
                return Err(DefinitionError::BaseProvidesFromDifferentModule {
                    provider: cx.provider(),
                    base: base.name().to_string(),
                    base_module: base.module().name().to_string(),
                    module: cx.module.name().to_string(),
                });
            }
            Ok(Some(base))
        }
    }
}

fn check_member_names(cx: &Context<'_>, members: &[(String, Member)]) -> DefinitionResult<()> {
    let mut seen = HashSet::with_capacity(members.len());
    for (name, _) in members {
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(DefinitionError::ReservedAttributeName {
                provider: cx.provider(),
                name: name.clone(),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(DefinitionError::DuplicateAttribute {
                provider: cx.provider(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// Inherited declarations first, in the base's order, with own redeclarations
/// replacing them in place; new own declarations follow.
fn collect_resources(
    cx: &Context<'_>,
    base: Option<&Provider>,
    specs: Vec<(String, ResourceSpec)>,
) -> DefinitionResult<Vec<Declared>> {
    let mut declarations: Vec<Declared> = base
        .into_iter()
        .flat_map(Provider::resources)
        .map(|inherited| Declared {
            name: inherited.name().unwrap_or_default().to_string(),
            kind: inherited.kind(),
            ty: inherited.type_key(),
            supplied: None,
            overrides: inherited.overrides().cloned(),
        })
        .collect();

    for (name, spec) in specs {
        let declared = classify(cx, name, spec)?;
        match declarations.iter_mut().find(|d| d.name == declared.name) {
            Some(inherited) => {
                if !cx.types.is_compatible(&inherited.ty, &declared.ty) {
                    return Err(DefinitionError::IncompatibleInheritedResourceType {
                        provider: cx.provider(),
                        name: declared.name,
                        ty: declared.ty,
                        inherited: inherited.ty,
                        base: base.map(|b| b.name().to_string()).unwrap_or_default(),
                    });
                }
                *inherited = declared;
            }
            None => declarations.push(declared),
        }
    }
    Ok(declarations)
}

fn classify(cx: &Context<'_>, name: String, spec: ResourceSpec) -> DefinitionResult<Declared> {
    let module_resource = cx.module.get(&name).cloned();
    match spec {
        ResourceSpec::Type(ty) => match module_resource {
            Some(overridden) => {
                check_override(cx, &name, ty, &overridden)?;
                Ok(Declared {
                    name,
                    kind: ResourceKind::Overriding,
                    ty,
                    supplied: None,
                    overrides: Some(overridden),
                })
            }
            None => Ok(Declared {
                name,
                kind: ResourceKind::Private,
                ty,
                supplied: None,
                overrides: None,
            }),
        },
        ResourceSpec::Declared(resource) => {
            let ty = resource.type_key();
            if resource.kind() == ResourceKind::Module {
                return Err(DefinitionError::PublicResourceInProvider {
                    provider: cx.provider(),
                    name,
                    ty,
                });
            }
            if resource.is_bound() {
                return Err(DefinitionError::AlreadyBound {
                    resource,
                    name,
                    owner: cx.provider(),
                });
            }

            match resource.kind() {
                ResourceKind::Overriding => {
                    let overridden =
                        module_resource.ok_or_else(|| DefinitionError::NameMismatch {
                            provider: cx.provider(),
                            module: cx.module.name().to_string(),
                            name: name.clone(),
                            ty,
                        })?;
                    check_override(cx, &name, ty, &overridden)?;
                    Ok(Declared {
                        name,
                        kind: ResourceKind::Overriding,
                        ty,
                        supplied: Some(resource),
                        overrides: Some(overridden),
                    })
                }
                _ => {
                    if let Some(occluded) = module_resource {
                        return Err(DefinitionError::PrivateOccludesModuleResource {
                            provider: cx.provider(),
                            name,
                            module_resource: occluded,
                        });
                    }
                    Ok(Declared {
                        name,
                        kind: ResourceKind::Private,
                        ty,
                        supplied: Some(resource),
                        overrides: None,
                    })
                }
            }
        }
    }
}

/// Overrides may only narrow.
fn check_override(
    cx: &Context<'_>,
    name: &str,
    ty: TypeKey,
    overridden: &Resource,
) -> DefinitionResult<()> {
    if cx.types.is_strict_subtype(&overridden.type_key(), &ty) {
        return Ok(());
    }
    Err(DefinitionError::IncompatibleOverrideType {
        provider: cx.provider(),
        name: name.to_string(),
        ty,
        overrides: overridden.clone(),
    })
}

fn bind_resources(
    cx: &Context<'_>,
    handle: &ProviderRef,
    declarations: Vec<Declared>,
) -> DefinitionResult<Vec<Resource>> {
    declarations
        .into_iter()
        .map(|declared| {
            let binding = Binding::in_provider(
                declared.name,
                cx.module.handle().clone(),
                handle.clone(),
                declared.overrides,
            );
            match declared.supplied {
                Some(resource) => resource.bind(binding).map(|()| resource),
                None => Resource::declare(declared.kind, declared.ty, binding),
            }
        })
        .collect()
}

fn collect_targets(module: &Module, own: &[Resource]) -> Vec<Target> {
    let mut targets: Vec<Target> = module
        .resources()
        .map(|module_resource| {
            let bound = own
                .iter()
                .find(|r| r.kind() == ResourceKind::Overriding && r.name() == module_resource.name())
                .unwrap_or(module_resource);
            Target {
                key: module_resource.clone(),
                bound: bound.clone(),
            }
        })
        .collect();

    targets.extend(
        own.iter()
            .filter(|r| r.kind() == ResourceKind::Private)
            .map(|r| Target {
                key: r.clone(),
                bound: r.clone(),
            }),
    );
    targets
}

/// Own module resources that are not overridden, plus all own resources.
fn visible_resources(module: &Module, own: &[Resource]) -> Vec<Resource> {
    let overridden: HashSet<&str> = own
        .iter()
        .filter(|r| r.kind() == ResourceKind::Overriding)
        .filter_map(Resource::name)
        .collect();

    module
        .resources()
        .filter(|r| !r.name().is_some_and(|name| overridden.contains(name)))
        .chain(own.iter())
        .cloned()
        .collect()
}

/// Inherited methods, minus any name this definition redeclares, then own ones.
fn effective_producers(
    base: Option<&Provider>,
    own: Vec<(String, ProducerSpec)>,
    values: &[(String, String)],
) -> Vec<(String, ProducerSpec)> {
    let shadowed: HashSet<&str> = own
        .iter()
        .map(|(name, _)| name.as_str())
        .chain(values.iter().map(|(name, _)| name.as_str()))
        .collect();

    let mut producers: Vec<(String, ProducerSpec)> = base
        .into_iter()
        .flat_map(Provider::iter)
        .filter(|method| !shadowed.contains(method.name()))
        .map(|method| (method.name().to_string(), method.producer().clone()))
        .collect();
    producers.extend(own);
    producers
}

fn check_values(
    cx: &Context<'_>,
    targets: &[Target],
    values: &[(String, String)],
) -> DefinitionResult<()> {
    let Some((name, value)) = values.first() else {
        return Ok(());
    };
    if let Some(target) = targets.iter().find(|t| t.method_name() == *name) {
        return Err(DefinitionError::ProducerNotCallable {
            provider: cx.provider(),
            resource: target.bound.clone(),
            value: value.clone(),
        });
    }
    Err(DefinitionError::InvalidProviderAttribute {
        provider: cx.provider(),
        name: name.clone(),
        value: value.clone(),
    })
}

fn check_orphan_producers(
    cx: &Context<'_>,
    targets: &[Target],
    producers: &[(String, ProducerSpec)],
) -> DefinitionResult<()> {
    for (name, _) in producers {
        if !targets.iter().any(|t| t.method_name() == *name) {
            return Err(DefinitionError::InvalidProviderAttribute {
                provider: cx.provider(),
                name: name.clone(),
                value: "<provider method without resource>".to_string(),
            });
        }
    }
    Ok(())
}

fn check_return_type(
    cx: &Context<'_>,
    target: &Target,
    producer: &ProducerSpec,
) -> DefinitionResult<()> {
    let returned = producer
        .returns()
        .ok_or_else(|| DefinitionError::MissingReturnType {
            provider: cx.provider(),
            resource: target.bound.clone(),
        })?;
    if !cx.types.is_compatible(&target.bound.type_key(), &returned) {
        return Err(DefinitionError::ReturnTypeMismatch {
            provider: cx.provider(),
            resource: target.bound.clone(),
            returned,
        });
    }
    Ok(())
}

fn resolve_parameter(
    cx: &Context<'_>,
    scope: &Scope<'_>,
    target: &Target,
    param: &Parameter,
) -> DefinitionResult<Resource> {
    let annotation = param
        .annotation()
        .ok_or_else(|| DefinitionError::ParameterMissingType {
            provider: cx.provider(),
            resource: target.bound.clone(),
            parameter: param.name().to_string(),
        })?;

    match annotation {
        Annotation::Invalid(text) => Err(DefinitionError::InvalidParameterType {
            provider: cx.provider(),
            resource: target.bound.clone(),
            parameter: param.name().to_string(),
            annotation: text.clone(),
        }),
        Annotation::Resource(resource) => {
            resolve_resource_annotation(cx, scope, target, param, resource)
        }
        Annotation::Type(declared) => resolve_type_annotation(cx, scope, target, param, *declared),
    }
}

fn resolve_resource_annotation(
    cx: &Context<'_>,
    scope: &Scope<'_>,
    target: &Target,
    param: &Parameter,
    resource: &Resource,
) -> DefinitionResult<Resource> {
    let Some(owner) = resource.provider_ref() else {
        if resource.is_bound() {
            // 模块资源，可以来自任意模块
            return Ok(resource.clone());
        }
        return Err(DefinitionError::InvalidParameterType {
            provider: cx.provider(),
            resource: target.bound.clone(),
            parameter: param.name().to_string(),
            annotation: resource.to_string(),
        });
    };

    if owner == scope.handle {
        return Ok(resource.clone());
    }

    // 基类声明的资源在子类中已重新绑定，按名称映射过来
    let inherited = scope
        .base
        .is_some_and(|base| base.lineage().any(|ancestor| ancestor.handle() == owner));
    if inherited {
        if let Some(own) = scope.own.iter().find(|r| r.name() == resource.name()) {
            return Ok(own.clone());
        }
    }

    Err(DefinitionError::CannotDependOnAnotherProvidersResource {
        provider: cx.provider(),
        resource: target.bound.clone(),
        parameter: param.name().to_string(),
        dependency: resource.clone(),
    })
}

/// 先按类型精确匹配（必须唯一），再按名称匹配，名称匹配要求类型兼容。
fn resolve_type_annotation(
    cx: &Context<'_>,
    scope: &Scope<'_>,
    target: &Target,
    param: &Parameter,
    declared: TypeKey,
) -> DefinitionResult<Resource> {
    let by_type: Vec<&Resource> = scope
        .visible
        .iter()
        .filter(|r| r.type_key() == declared && !target.is(r))
        .collect();
    if let [only] = by_type.as_slice() {
        return Ok((*only).clone());
    }

    if let Some(named) = scope
        .visible
        .iter()
        .find(|r| r.name() == Some(param.name()))
    {
        if cx.types.is_compatible(&declared, &named.type_key()) {
            return Ok(named.clone());
        }
        return Err(DefinitionError::ParameterTypeMismatchesNamedResource {
            provider: cx.provider(),
            resource: target.bound.clone(),
            parameter: param.name().to_string(),
            declared,
            refers_to: named.clone(),
        });
    }

    if by_type.len() > 1 {
        return Err(DefinitionError::AmbiguousParameterType {
            provider: cx.provider(),
            resource: target.bound.clone(),
            parameter: param.name().to_string(),
            declared,
            candidates: by_type.into_iter().cloned().collect(),
        });
    }

    Err(DefinitionError::UnrelatedParameterName {
        provider: cx.provider(),
        resource: target.bound.clone(),
        parameter: param.name().to_string(),
        declared,
    })
}
