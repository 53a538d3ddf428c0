// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Controller-side half of the smoke-test demo (SPEC_FULL.md §8 scenario 1):
// opens channel "t1", launches `demo_child`, sends "Hello Child" once the
// handshake completes, then closes.
//
// Usage: demo_controller [channel_name]

use rendezvous_ipc::Endpoint;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let channel_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "t1".to_string());

    let child_bin = sibling_binary("demo_child");
    let launch_command = format!("{} {}", child_bin.display(), channel_name);

    let mut endpoint = Endpoint::open(&channel_name, &launch_command).expect("open channel");

    endpoint.send(b"Hello Child", 4).expect("send");
    println!("controller: sent \"Hello Child\"");

    endpoint.close().expect("close channel");
}

/// Locate a sibling binary built into the same `target/{debug,release}`
/// directory as this one, so the demo works from either profile without a
/// hardcoded path.
fn sibling_binary(name: &str) -> std::path::PathBuf {
    let mut path = std::env::current_exe().expect("current_exe");
    path.pop();
    path.push(name);
    path
}
