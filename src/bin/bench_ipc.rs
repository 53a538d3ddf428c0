// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Throughput demo (SPEC_FULL.md §8 scenario 2): one controller sends N
// fixed-size messages to a child in the same process tree, reporting
// messages/sec and bytes/sec. Unlike the criterion benchmark in
// `benches/rendezvous.rs`, this binary exercises the real two-process
// launch path rather than two in-process threads.
//
// Usage: bench_ipc [count] [size_bytes]
//        bench_ipc --child <channel_name>   (internal: launched by --count mode)

use std::time::Instant;

use rendezvous_ipc::Endpoint;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("--child") {
        let channel_name = args.get(2).expect("channel name");
        let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
        run_child(channel_name, count);
        return;
    }

    let count: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let size: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(2048);
    run_controller(count, size);
}

fn run_controller(count: usize, size: usize) {
    let channel_name = format!("bench_{}", std::process::id());
    let self_exe = std::env::current_exe().expect("current_exe");
    let launch_command = format!(
        "{} --child {} {count}",
        self_exe.display(),
        channel_name
    );

    let mut endpoint = Endpoint::open(&channel_name, &launch_command).expect("open channel");

    let payload = vec![b'A'; size];
    let start = Instant::now();
    for _ in 0..count {
        endpoint.send(&payload, 4).expect("send");
    }
    let elapsed = start.elapsed();

    let msgs_per_sec = count as f64 / elapsed.as_secs_f64();
    let mb_per_sec = (count * size) as f64 / elapsed.as_secs_f64() / (1024.0 * 1024.0);
    println!(
        "sent {count} messages of {size} bytes in {:.3}s ({msgs_per_sec:.0} msg/s, {mb_per_sec:.1} MiB/s)",
        elapsed.as_secs_f64()
    );

    endpoint.close().expect("close channel");
}

fn run_child(channel_name: &str, expected: u64) {
    let mut endpoint = Endpoint::attach(channel_name).expect("attach to channel");
    for _ in 0..expected {
        let (bytes, _tag) = endpoint.recv().expect("recv");
        std::hint::black_box(&bytes);
    }
    eprintln!("child: received {expected} messages");
}
