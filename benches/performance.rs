use criterion::{criterion_group, criterion_main, Criterion};
use entiq_core::expr::{BinaryOp, Expr, Param};
use entiq_core::types::TypeRef;
use entiq_core::value::{Decimal, Value};
use entiq_operators::{rewrite, OperatorId, Registry};

fn order_predicate() -> Expr {
    let o = Param::new("o", TypeRef::entity("Order"));
    Expr::lambda(
        o.clone(),
        Expr::binary(
            BinaryOp::Gt,
            Expr::member(Expr::Parameter(o), "total", TypeRef::DECIMAL),
            Expr::constant(Value::Decimal(Decimal::new(100, 0)), TypeRef::DECIMAL).unwrap(),
        ),
    )
}

fn bench_registry_lookup(c: &mut Criterion) {
    let registry = Registry::prepopulated().unwrap();
    let ids = OperatorId::all();
    c.bench_function("registry_lookup_all", |b| {
        b.iter(|| {
            for id in &ids {
                let _ = registry.template(*id).unwrap();
            }
        })
    });
}

fn bench_rewrite(c: &mut Criterion) {
    let registry = Registry::prepopulated().unwrap();
    let template = registry.template(OperatorId::CountWhere).unwrap();
    let element = TypeRef::entity("Order");
    let base = Expr::source("orders", element.clone());
    let pred = order_predicate();
    c.bench_function("rewrite_count_where", |b| {
        b.iter(|| {
            let _ = rewrite(&template, &element, base.clone(), vec![pred.clone()]).unwrap();
        })
    });
}

criterion_group!(operators, bench_registry_lookup, bench_rewrite);
criterion_main!(operators);
