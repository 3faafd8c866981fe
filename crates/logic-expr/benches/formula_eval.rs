use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logic_core::ValueType;
use logic_expr::{Comparison, Formula, Literal, Operand, Predicate};

fn bench_formula_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("formula_eval");
    group.throughput(Throughput::Elements(1));

    let simple = Formula::parse("(%(0) + %(1) * 2)").unwrap();
    group.bench_with_input(BenchmarkId::new("parse", "simple"), &"(%(0) + %(1) * 2)", |b, src| {
        b.iter(|| Formula::parse(black_box(src)).unwrap());
    });

    group.bench_with_input(BenchmarkId::new("eval", "simple"), &simple, |b, formula| {
        let refs = [1.5, 2.5];
        b.iter(|| formula.eval(black_box(&refs), ValueType::F64).unwrap());
    });

    let nested = Formula::parse("(sqrt(abs(%(0) - %(1))) + (%(2) % 3) * sin(%(3)))").unwrap();
    group.bench_with_input(BenchmarkId::new("eval", "nested"), &nested, |b, formula| {
        let refs = [10.0, 4.0, 7.0, 1.2];
        b.iter(|| formula.eval(black_box(&refs), ValueType::F64).unwrap());
    });

    group.finish();
}

fn bench_predicate_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate_eval");
    let pred = Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str("open".into()))));
    let mut subject = logic_core::Value::new_for_type(ValueType::String);
    subject.set_string("open").unwrap();

    group.bench_function("equal_string", |b| {
        b.iter(|| pred.eval(black_box(&subject), &[]).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_formula_eval, bench_predicate_eval);
criterion_main!(benches);
