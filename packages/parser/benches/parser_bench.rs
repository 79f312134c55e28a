use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tendril_parser::{parse_iteration, parse_program};

fn parse_data_object(c: &mut Criterion) {
    let source = r#"{
        open: false,
        items: [],
        search: '',
        get filtered() { return this.items.filter(i => i.name.includes(this.search)) },
        toggle() { this.open = !this.open },
    }"#;

    c.bench_function("parse_data_object", |b| b.iter(|| parse_program(black_box(source))));
}

fn parse_handler(c: &mut Criterion) {
    let source = "count++; $dispatch('changed', { count, at: Date.now() })";

    c.bench_function("parse_handler", |b| b.iter(|| parse_program(black_box(source))));
}

fn parse_iteration_header(c: &mut Criterion) {
    c.bench_function("parse_iteration_header", |b| {
        b.iter(|| parse_iteration(black_box("({ id, label }, index) in rows")))
    });
}

criterion_group!(benches, parse_data_object, parse_handler, parse_iteration_header);
criterion_main!(benches);
