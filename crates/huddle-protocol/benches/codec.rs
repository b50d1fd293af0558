//! Codec benchmarks for huddle-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use huddle_protocol::{codec, Message};

fn bench_encode_small(c: &mut Criterion) {
    let message = Message::new("x".repeat(64), "room-1", "Alice");

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("small_64B", |b| {
        b.iter(|| codec::encode(black_box(&message)))
    });
    group.finish();
}

fn bench_decode_small(c: &mut Criterion) {
    let message = Message::new("x".repeat(64), "room-1", "Alice");
    let encoded = codec::encode(&message).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("small_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_inbound_content(c: &mut Criterion) {
    let payload = vec![b'a'; 512];

    c.bench_function("inbound_512B", |b| {
        b.iter(|| codec::inbound_content(black_box(payload.clone()), 512))
    });
}

criterion_group!(
    benches,
    bench_encode_small,
    bench_decode_small,
    bench_inbound_content
);
criterion_main!(benches);
