// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Child-side half of the smoke-test demo (SPEC_FULL.md §8 scenario 1).
// Launched by `demo_controller` as the worker group's rank-0 process; a
// real worker-group framework would do rank discovery first and only have
// rank 0 call `attach`, but this demo has exactly one rank.
//
// Usage: demo_child <channel_name>

use rendezvous_ipc::Endpoint;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let channel_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "t1".to_string());

    let mut endpoint = Endpoint::attach(&channel_name).expect("attach to channel");

    let (bytes, type_tag) = endpoint.recv().expect("recv");
    println!(
        "child: received {} bytes (tag={type_tag}): {:?}",
        bytes.len(),
        String::from_utf8_lossy(&bytes)
    );

    // Child never closes the channel; it simply exits once its work is done.
}
