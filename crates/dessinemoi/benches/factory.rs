use criterion::{Criterion, criterion_group, criterion_main};
use dessinemoi::{CreateOptions, Factory, Registrable, Registration, Restriction};
use serde::Deserialize;
use serde_json::json;
use std::hint::black_box;

#[derive(Debug, Deserialize, Registrable)]
#[registrable(type_id = "sheep")]
struct Sheep {
    age: u32,
    name: String,
}

#[derive(Debug, Deserialize, Registrable)]
#[registrable(type_id = "ram", extends(Sheep))]
struct Ram {
    age: u32,
    #[serde(default)]
    name: String,
}

fn bench_factory(c: &mut Criterion) {
    let mut group = c.benchmark_group("factory");

    let mut factory = Factory::new();
    factory.register::<Sheep>().unwrap();
    factory.register_with(Registration::of::<Ram>().alias("belier")).unwrap();
    let restriction = Restriction::of::<Sheep>();

    group.bench_function("get_type", |b| {
        b.iter(|| factory.get_type(black_box("belier")).unwrap());
    });

    group.bench_function("create_positional", |b| {
        b.iter(|| {
            factory
                .create(black_box("sheep"), CreateOptions::new().arg(5).arg("Dolly"))
                .unwrap()
        });
    });

    let mapping = json!({"type": "ram", "age": 7, "name": "Romuald"});
    group.bench_function("convert_restricted", |b| {
        b.iter(|| factory.convert(black_box(mapping.clone()), Some(&restriction)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_factory);
criterion_main!(benches);
