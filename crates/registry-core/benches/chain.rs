use criterion::{criterion_group, criterion_main, Criterion};
use registry_core::{encode_story, memory::MemoryStore, Body, Chain, Star, StarClaim};
use std::sync::Arc;

fn claim(i: usize) -> Body {
    Body::Claim(StarClaim {
        address: format!("wallet-{}", i % 10),
        star: Star {
            declination: Some("68° 52' 56.9".into()),
            right_ascension: Some("16h 29m 1.0s".into()),
            story: encode_story(&format!("star number {i}")),
            ..Default::default()
        },
    })
}

fn bench_chain(c: &mut Criterion) {
    c.bench_function("append_100", |b| {
        b.iter(|| {
            let chain = Chain::new(Arc::new(MemoryStore::new()));
            for i in 0..100 {
                chain.append(claim(i)).unwrap();
            }
        });
    });

    let chain = Chain::new(Arc::new(MemoryStore::new()));
    for i in 0..1000 {
        chain.append(claim(i)).unwrap();
    }
    c.bench_function("validate_chain_1000", |b| {
        b.iter(|| chain.validate_chain().unwrap());
    });
}

criterion_group!(benches, bench_chain);
criterion_main!(benches);
