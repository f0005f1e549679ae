use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use texpr_algebra::{AlgebraEngine, Number, ReferenceEngine, Scope};

const SOURCES: [(&str, &str); 5] = [
    ("literal_sum", "1 + 2 + 3 + 4 + 5"),
    ("bound_product", "x*y*z"),
    ("trig", "sin(x) + cos(x)"),
    ("radical", "sqrt(x**2 + y**2)"),
    ("definite_integral", "integrate(x**2, (x, 0, 1))"),
];

fn engine_benchmark(c: &mut Criterion) {
    let engine = ReferenceEngine::default();
    let scope = Scope::new(["x", "y", "z"]);
    let bindings: BTreeMap<String, Number> = [("x", 0.5), ("y", 1.5), ("z", 2.0)]
        .into_iter()
        .map(|(name, value)| (name.to_string(), Number::Float(value)))
        .collect();

    for (label, source) in SOURCES {
        c.bench_function(&format!("engine/evaluate/{label}"), |b| {
            b.iter(|| {
                let expr = engine.parse(black_box(source), &scope).expect("parse");
                let bound = engine.substitute(&expr, &bindings);
                let forced = engine.force(&bound).expect("force");
                let _ = engine.evaluate(&forced).expect("evaluate");
            });
        });
    }

    c.bench_function("engine/is_zero/expanded_square", |b| {
        let lhs = engine.parse("(x + y)**2", &scope).expect("parse");
        let rhs = engine.parse("x**2 + 2*x*y + y**2", &scope).expect("parse");
        let difference = texpr_algebra::Expr::sub(lhs, rhs);
        b.iter(|| {
            let _ = engine.is_zero(black_box(&difference)).expect("is_zero");
        });
    });
}

criterion_group!(benches, engine_benchmark);
criterion_main!(benches);
