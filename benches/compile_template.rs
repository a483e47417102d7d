//! Criterion benchmark for template compilation: parsing through the cache and
//! rendering the same template against contexts that enable a varying number of
//! predicates.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sql_template::context::MapSource;
use sql_template::engine::TemplateEngine;
use sql_template::template::Template;
use sql_template::types::Value;
use std::hint::black_box;

const TEMPLATE: &str = "select id, name, owner from items where 1=1 \
    @{and, owner = #{owner}} \
    @{and, kind = #{kind}} \
    @{and, name like #{pattern}} \
    @{and, id in @{in, :ids}} \
    @{ifand, active, active = 1} \
    order by id";

fn context(enabled: usize) -> MapSource {
    let mut ctx = MapSource::new()
        .with("owner", Value::Null)
        .with("kind", Value::Null)
        .with("pattern", Value::Null)
        .with("ids", Value::Null)
        .with("active", false);
    if enabled > 0 {
        ctx.insert("owner", "alice");
    }
    if enabled > 1 {
        ctx.insert("kind", "book");
    }
    if enabled > 2 {
        ctx.insert("pattern", "%rust%");
    }
    if enabled > 3 {
        ctx.insert("ids", Value::List((1..=16).map(Value::Int).collect()));
    }
    if enabled > 4 {
        ctx.insert("active", true);
    }
    ctx
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_template", |b| {
        b.iter(|| Template::parse(black_box(TEMPLATE)));
    });
}

fn bench_compile(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let mut group = c.benchmark_group("compile_template");
    for enabled in [0usize, 2, 5] {
        let ctx = context(enabled);
        group.bench_with_input(BenchmarkId::from_parameter(enabled), &ctx, |b, ctx| {
            b.iter(|| engine.compile_str(black_box(TEMPLATE), ctx));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile);
criterion_main!(benches);
