// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Throughput benchmark for the send/recv rendezvous, two in-process
// threads standing in for controller and child (named semaphores and
// shared memory are OS-global, so this exercises the same kernel objects
// two real processes would), per SPEC_FULL.md §13's test-tooling note.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rendezvous_ipc::{purge, Endpoint};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_channel(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_bench_{n}_{}", std::process::id())
}

fn round_trip(message_size: usize, iterations: usize) {
    let channel_name = unique_channel("rt");
    purge(&channel_name);

    let child_channel = channel_name.clone();
    let child = thread::spawn(move || {
        let mut ep = Endpoint::attach(&child_channel).expect("attach");
        for _ in 0..iterations {
            let (_bytes, _tag) = ep.recv().expect("recv");
        }
    });

    let mut controller = Endpoint::open(&channel_name, "true").expect("open");
    let payload = vec![0xABu8; message_size];
    for _ in 0..iterations {
        controller.send(&payload, 4).expect("send");
    }

    child.join().unwrap();
    controller.close().expect("close");
}

fn bench_message_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendezvous_send_recv");
    group.measurement_time(Duration::from_secs(5));

    for &size in &[0usize, 64, 2048, 65536] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| round_trip(size, 100));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_message_sizes);
criterion_main!(benches);
