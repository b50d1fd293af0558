//! Fan-out benchmarks for the hub.
//!
//! Each iteration broadcasts one message and drains every member mailbox.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use huddle_bench::populated_room;
use huddle_core::{ClientHandle, ClientInfo, Hub, HubConfig, Message};
use std::sync::Arc;
use std::time::Instant;

fn bench_fanout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("fanout");

    for members in [1usize, 10, 100, 1000] {
        let hub = rt.block_on(async { Hub::spawn(HubConfig::default()) });
        let mut mailboxes = rt.block_on(populated_room(&hub, "bench", members, 16)).unwrap();

        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, _| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let start = Instant::now();
                    for _ in 0..iters {
                        hub.broadcast(Message::new("hello", "bench", "bencher"))
                            .await
                            .unwrap();
                        for mailbox in &mut mailboxes {
                            black_box(mailbox.recv().await);
                        }
                    }
                    start.elapsed()
                })
            });
        });
    }

    group.finish();
}

fn bench_membership_churn(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let hub = rt.block_on(async { Hub::spawn(HubConfig::default()) });
    hub.create_room("churn", "churn");

    c.bench_function("register_unregister", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for i in 0..iters {
                    let info = ClientInfo::new(format!("churn-{i}"), "churn", "churn");
                    let (handle, _mailbox) = ClientHandle::new(info, 1);
                    let info = Arc::clone(handle.info());
                    black_box(hub.register(handle).await.unwrap());
                    hub.unregister(info).await.unwrap();
                }
                start.elapsed()
            })
        });
    });
}

criterion_group!(benches, bench_fanout, bench_membership_churn);
criterion_main!(benches);
