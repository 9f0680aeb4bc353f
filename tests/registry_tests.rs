//! Operator registry and rewriter behaviour across crates.

use std::sync::Arc;
use std::thread;

use entiq_core::config::EntiqConfig;
use entiq_core::expr::{Expr, Param};
use entiq_core::types::TypeRef;
use entiq_operators::{rewrite, Numeric, OpError, OperatorId, OperatorKey, ParamKind, Registry};

#[test]
fn count_template_specializes_to_count_of_int() {
    let registry = Registry::new();
    for id in [
        OperatorId::First,
        OperatorId::FirstOrDefault,
        OperatorId::Any,
        OperatorId::Count,
    ] {
        registry.template(id).unwrap();
    }
    assert_eq!(registry.len(), 4);

    let key = OperatorKey::new("Count", 1, vec![ParamKind::SequenceOfT]);
    let template = registry.get_or_create(&key).unwrap();
    assert_eq!(registry.resolutions(), 4);

    let seq = Expr::source("seq", TypeRef::INT32);
    let call = rewrite(&template, &TypeRef::INT32, seq.clone(), vec![]).unwrap();
    assert_eq!(call.to_string(), "Count<Int32>(seq)");
    match call {
        Expr::Call { method, args } => {
            assert_eq!(method.type_args, vec![TypeRef::INT32]);
            assert_eq!(method.ret, TypeRef::INT32);
            assert_eq!(args, vec![seq]);
        }
        other => panic!("expected a call, got {}", other),
    }
}

#[test]
fn every_supported_operator_resolves_to_one_cached_template() {
    let registry = Registry::prepopulated().unwrap();
    let populated = registry.resolutions();
    for id in OperatorId::all() {
        let a = registry.template(id).unwrap();
        let b = registry.template(id).unwrap();
        assert!(Arc::ptr_eq(&a, &b), "{} was not cached", id);
        assert_eq!(a.name(), id.name());
    }
    assert_eq!(registry.resolutions(), populated);
}

#[test]
fn unknown_shape_is_a_resolution_error() {
    let registry = Registry::new();
    let key = OperatorKey::new("Count", 1, vec![ParamKind::SequenceOfT, ParamKind::ScalarValue]);
    let err = registry.get_or_create(&key).unwrap_err();
    assert!(matches!(err, OpError::Resolution { found: 0, .. }));
    assert!(registry.is_empty());
}

#[test]
fn lazy_and_eager_registries_agree() {
    let lazy = Registry::from_config(&EntiqConfig {
        eager_registry: false,
        ..EntiqConfig::default()
    })
    .unwrap();
    let eager = Registry::from_config(&EntiqConfig::default()).unwrap();
    assert!(lazy.is_empty());
    assert_eq!(eager.len(), OperatorId::all().len());
    for id in [OperatorId::MaxBy, OperatorId::Sum(Numeric::NullableDecimal)] {
        assert_eq!(
            lazy.template(id).unwrap().definition(),
            eager.template(id).unwrap().definition()
        );
    }
}

#[test]
fn concurrent_first_access_shares_one_template() {
    let registry = Arc::new(Registry::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let r = Arc::clone(&registry);
            thread::spawn(move || r.template(OperatorId::LongCountWhere).unwrap())
        })
        .collect();
    let templates: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for t in &templates[1..] {
        assert!(Arc::ptr_eq(&templates[0], t));
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn rewrite_is_deterministic_and_quotes_selectors() {
    let registry = Registry::new();
    let template = registry.template(OperatorId::AverageBy(Numeric::NullableFloat64)).unwrap();
    let order = TypeRef::entity("Order");
    let o = Param::new("o", order.clone());
    let selector = Expr::lambda(
        o.clone(),
        Expr::member(Expr::Parameter(o), "rating", TypeRef::nullable(TypeRef::FLOAT64)),
    );
    let base = Expr::source("orders", order.clone());
    let a = rewrite(&template, &order, base.clone(), vec![selector.clone()]).unwrap();
    let b = rewrite(&template, &order, base, vec![selector]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.ty(), TypeRef::nullable(TypeRef::FLOAT64));
    assert_eq!(a.to_string(), "Average<Order>(orders, '(o => o.rating))");
}

#[test]
fn global_registry_reset_yields_fresh_instance() {
    let before = Registry::global();
    Registry::reset_global();
    let after = Registry::global();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(Arc::ptr_eq(&after, &Registry::global()));
}
