use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use timetable_auth::{parse_bearer, RouteKey, RoutePolicyTable, SessionToken};
use timetable_core::Role;

/// Table shaped like a real deployment: a few groups, many routes.
fn policy_table(routes_per_group: usize) -> RoutePolicyTable {
    let mut builder = RoutePolicyTable::builder()
        .group("students", [Role::Student, Role::Teacher, Role::AcademicAdmin])
        .group("teachers", [Role::Teacher, Role::AcademicAdmin])
        .group("admin", [Role::AcademicAdmin]);

    for i in 0..routes_per_group {
        builder = builder
            .in_group(RouteKey::get(format!("/students/{i}")), "students")
            .in_group(RouteKey::get(format!("/teachers/{i}")), "teachers")
            .with_roles(RouteKey::post(format!("/admin/{i}")), Some("admin"), [Role::AcademicAdmin])
            .public(RouteKey::get(format!("/public/{i}")));
    }

    builder.build().expect("valid policy table")
}

fn bench_policy_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_resolution");

    for size in [10usize, 100, 1_000] {
        let table = policy_table(size);
        let hit = RouteKey::get(format!("/teachers/{}", size / 2));
        let miss = RouteKey::get("/nowhere");

        group.bench_with_input(BenchmarkId::new("hit", size), &hit, |b, key| {
            b.iter(|| black_box(table.resolve(black_box(key)).is_some()))
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &miss, |b, key| {
            b.iter(|| black_box(table.resolve(black_box(key)).is_none()))
        });
    }

    group.finish();
}

fn bench_bearer_parsing(c: &mut Criterion) {
    let token = SessionToken::generate(32);
    let header = format!("Bearer {}", token.as_str());

    c.bench_function("parse_bearer", |b| {
        b.iter(|| black_box(parse_bearer(black_box(&header))))
    });
}

fn bench_token_generation(c: &mut Criterion) {
    c.bench_function("token_generate_32_bytes", |b| {
        b.iter(|| black_box(SessionToken::generate(32)))
    });
}

criterion_group!(
    benches,
    bench_policy_resolution,
    bench_bearer_parsing,
    bench_token_generation
);
criterion_main!(benches);
