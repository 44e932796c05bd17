//! 模块定义与默认提供者的集成测试

use wiring::{BaseProvider, DefinitionError, Module, ProducerSpec, Provider, Resource, TypeKey};

fn some_module() -> Module {
    Module::builder("SomeModule")
        .resource("a", TypeKey::of::<i32>())
        .resource("b", Resource::module(TypeKey::of::<String>()))
        .build()
        .unwrap()
}

fn provider_for(module: &Module) -> Provider {
    Provider::builder(format!("{}Provider", module.name()), module)
        .provides("a", ProducerSpec::returning(|_| Ok(10_i32)))
        .provides("b", ProducerSpec::returning(|_| Ok(String::from("b"))))
        .build()
        .unwrap()
}

#[test]
fn test_module_introspection() {
    let module = some_module();

    assert_eq!(module.name(), "SomeModule");
    assert!(module.contains_name("a"));
    assert!(!module.contains_name("c"));
    assert!(module.contains(&module["b"]));
    assert_eq!(module.get("b").map(Resource::type_key), Some(TypeKey::of::<String>()));

    let names: Vec<_> = (&module).into_iter().filter_map(Resource::name).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_modules_are_distinct_even_with_same_name() {
    let first = some_module();
    let second = some_module();
    assert_ne!(first, second);
    assert!(!first.contains(&second["a"]));
}

#[test]
fn test_default_provider() {
    let module = some_module();
    assert!(module.default_provider().is_none());

    let provider = provider_for(&module);
    module.set_default_provider(&provider).unwrap();
    assert_eq!(module.default_provider(), Some(provider));
}

#[test]
fn test_cant_use_base_provider_as_default_provider() {
    let module = some_module();
    let err = module.set_default_provider(&BaseProvider).unwrap_err();
    assert!(matches!(err, DefinitionError::IsBaseProviderPlaceholder { .. }));
    assert!(module.default_provider().is_none());
}

#[test]
fn test_cant_set_a_default_provider_to_one_that_provides_to_another_module() {
    let module = some_module();
    let another = Module::builder("AnotherModule")
        .resource("a", TypeKey::of::<i32>())
        .resource("b", TypeKey::of::<String>())
        .build()
        .unwrap();
    let another_provider = provider_for(&another);

    let err = module.set_default_provider(&another_provider).unwrap_err();
    match err {
        DefinitionError::ProvidesForAnotherModule {
            module,
            provider,
            provider_module,
        } => {
            assert_eq!(module, "SomeModule");
            assert_eq!(provider, "AnotherModuleProvider");
            assert_eq!(provider_module, "AnotherModule");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_cant_set_a_default_provider_to_something_not_a_provider() {
    struct NotAProvider;

    let module = some_module();
    let err = module.set_default_provider(&NotAProvider).unwrap_err();
    assert!(matches!(err, DefinitionError::NotAProvider { .. }));

    let err = module.set_default_provider(&10_i32).unwrap_err();
    assert!(matches!(err, DefinitionError::NotAProvider { candidate: "i32", .. }));
}
