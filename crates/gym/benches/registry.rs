use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gym::{ActionSpace, EnvId, Registry};

fn bench_catalog(c: &mut Criterion) {
    c.bench_function("catalog_build", |b| b.iter(Registry::catalog));

    let registry = Registry::catalog();
    c.bench_function("resolve_all", |b| {
        b.iter(|| {
            for id in registry.ids() {
                black_box(registry.resolve(black_box(id)).ok());
            }
        });
    });
    c.bench_function("parse_identifier", |b| {
        b.iter(|| black_box("SuperMarioBros-7-3-Tiles-v0").parse::<EnvId>().ok());
    });
}

fn bench_actions(c: &mut Criterion) {
    c.bench_function("decode_discrete", |b| {
        b.iter(|| {
            for action in 0..14 {
                black_box(ActionSpace::Discrete.decode(black_box(action)).ok());
            }
        });
    });
}

criterion_group!(benches, bench_catalog, bench_actions);
criterion_main!(benches);
