// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spawns the controller's launch command as a detached subprocess. The
// channel does not interpret the command, wait for it, or manage its
// lifetime past spawn — the worker group is expected to independently call
// the child attach routine with a matching channel name.

use std::io;
use std::process::{Child, Command, Stdio};

/// Invoke `command` as a detached subprocess through the platform shell,
/// matching the fire-and-forget `system()` semantics the launch contract
/// describes. Returns immediately once the shell has been spawned; does not
/// wait for `command` to run to completion.
pub fn launch_detached(command: &str) -> io::Result<Child> {
    #[cfg(unix)]
    let mut cmd = {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    #[cfg(windows)]
    let mut cmd = {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    cmd.spawn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launches_and_returns_without_waiting() {
        #[cfg(unix)]
        let cmd = "true";
        #[cfg(windows)]
        let cmd = "exit 0";

        let mut child = launch_detached(cmd).expect("spawn");
        let status = child.wait().expect("wait");
        assert!(status.success());
    }

    #[test]
    fn failing_command_still_spawns_a_shell() {
        #[cfg(unix)]
        let cmd = "exit 7";
        #[cfg(windows)]
        let cmd = "exit 7";

        let mut child = launch_detached(cmd).expect("spawn");
        let status = child.wait().expect("wait");
        assert_eq!(status.code(), Some(7));
    }
}
