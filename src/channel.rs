// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The controller/child rendezvous channel: handshake, paired-semaphore
// send/recv protocol, and lifecycle management of the shared resources.

use std::io;
use std::time::Duration;

use tracing::{info, trace, warn};

use crate::error;
use crate::launch::launch_detached;
use crate::semaphore::IpcSemaphore;
use crate::shm::{MetadataCell, ShmHandle};
use crate::shm_name::ChannelNames;

/// Which side of a channel this process holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Creates the channel's named objects, launches the worker group, and
    /// is the only role allowed to destroy the channel.
    Controller,
    /// Attaches to objects the controller already created; never destroys.
    Child,
}

/// Configuration for opening or attaching to a channel, including the
/// optional timeouts described in SPEC_FULL.md §12. `None` everywhere
/// reproduces the original unbounded-wait behavior.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub channel_name: String,
    /// Only consulted by [`Endpoint::open_with_config`]; ignored by attach.
    pub launch_command: String,
    /// Bound on the startup handshake wait.
    pub handshake_timeout: Option<Duration>,
    /// Bound applied to each `send`/`recv` rendezvous wait by default.
    pub operation_timeout: Option<Duration>,
}

impl ChannelConfig {
    pub fn new(channel_name: impl Into<String>, launch_command: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            launch_command: launch_command.into(),
            handshake_timeout: None,
            operation_timeout: None,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }
}

/// The four semaphores an endpoint needs, named relative to its own role
/// rather than to direction, so `send`/`recv` contain no role branches.
struct SemTable {
    /// Posted when this role stages a body for the peer to read.
    my_sent: IpcSemaphore,
    /// Waited on after posting `my_sent`: peer has copied the body out.
    peer_received: IpcSemaphore,
    /// Waited on to learn the peer has staged a body for us.
    peer_sent: IpcSemaphore,
    /// Posted after copying the peer's body out.
    my_received: IpcSemaphore,
}

/// A per-process handle to one channel. Carries its role and owns the
/// handles to the channel's kernel objects; see the module-level docs and
/// SPEC_FULL.md §3-§4 for the full protocol.
pub struct Endpoint {
    channel_name: String,
    role: Role,
    names: ChannelNames,
    sems: SemTable,
    body: ShmHandle,
    length_cell: MetadataCell,
    type_cell: MetadataCell,
    operation_timeout: Option<Duration>,
    closed: bool,
}

impl Endpoint {
    /// Open a channel as the controller: create the named objects, launch
    /// the worker group, and block until its rank-0 process completes the
    /// startup handshake. Equivalent to
    /// `open_with_config` with no timeouts.
    pub fn open(channel_name: &str, launch_command: &str) -> io::Result<Self> {
        Self::open_with_config(&ChannelConfig::new(channel_name, launch_command))
    }

    /// Open a channel as the controller, honoring `config`'s timeouts.
    pub fn open_with_config(config: &ChannelConfig) -> io::Result<Self> {
        let channel_name = config.channel_name.as_str();
        let _span = tracing::info_span!("channel_open", channel = channel_name).entered();

        let names = ChannelNames::derive(channel_name);

        let my_sent = create_sem(&names.con_sent)?;
        let peer_received = create_sem(&names.child_recv)?;
        let peer_sent = create_sem(&names.child_sent)?;
        let my_received = create_sem(&names.con_recv)?;

        let body = ShmHandle::create(&names.body)
            .map_err(|e| error::naming_collision_or(&names.body, e))?;
        let length_cell = MetadataCell::create(&names.length)
            .map_err(|e| error::naming_collision_or(&names.length, e))?;
        let type_cell = MetadataCell::create(&names.type_tag)
            .map_err(|e| error::naming_collision_or(&names.type_tag, e))?;

        launch_detached(&config.launch_command).map_err(|e| {
            warn!(error = %e, "failed to launch worker group");
            e
        })?;

        info!("waiting for child handshake");
        if !peer_received.wait(config.handshake_timeout)? {
            warn!("child did not complete handshake within timeout");
            return Err(error::protocol_abandoned("child_received (handshake)"));
        }
        info!("child handshake complete");

        Ok(Self {
            channel_name: channel_name.to_string(),
            role: Role::Controller,
            names,
            sems: SemTable {
                my_sent,
                peer_received,
                peer_sent,
                my_received,
            },
            body,
            length_cell,
            type_cell,
            operation_timeout: config.operation_timeout,
            closed: false,
        })
    }

    /// Attach to a channel as the child: open the objects the controller
    /// already created, signal readiness, and return. Never creates or
    /// destroys named objects.
    pub fn attach(channel_name: &str) -> io::Result<Self> {
        Self::attach_with_timeout(channel_name, None)
    }

    /// Attach as the child, bounding the post of the handshake semaphore
    /// with `timeout` (the post itself never blocks; the timeout instead
    /// bounds opening the four semaphores and body descriptor, which can
    /// legitimately race the controller's own creation of them).
    pub fn attach_with_timeout(channel_name: &str, timeout: Option<Duration>) -> io::Result<Self> {
        let _span = tracing::info_span!("channel_attach", channel = channel_name).entered();

        let names = ChannelNames::derive(channel_name);
        let deadline = timeout.map(|d| std::time::Instant::now() + d);

        let my_sent = open_sem_retrying(&names.child_sent, deadline)?;
        let peer_received = open_sem_retrying(&names.con_recv, deadline)?;
        let peer_sent = open_sem_retrying(&names.con_sent, deadline)?;
        let my_received = open_sem_retrying(&names.child_recv, deadline)?;

        let mut body = ShmHandle::attach(&names.body);
        body.map_at(0).map_err(|e| {
            warn!(error = %e, "failed to open body object");
            e
        })?;
        let length_cell = MetadataCell::open(&names.length)?;
        let type_cell = MetadataCell::open(&names.type_tag)?;

        my_received.post(1)?;
        info!("handshake signalled to controller");

        Ok(Self {
            channel_name: channel_name.to_string(),
            role: Role::Child,
            names,
            sems: SemTable {
                my_sent,
                peer_received,
                peer_sent,
                my_received,
            },
            body,
            length_cell,
            type_cell,
            operation_timeout: None,
            closed: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Send `bytes` tagged `type_tag`, blocking until the peer acknowledges.
    /// Uses the endpoint's configured operation timeout, if any.
    pub fn send(&mut self, bytes: &[u8], type_tag: i32) -> io::Result<()> {
        let timeout = self.operation_timeout;
        self.send_timeout(bytes, type_tag, timeout)
    }

    /// Send with an explicit timeout overriding the endpoint default.
    pub fn send_timeout(
        &mut self,
        bytes: &[u8],
        type_tag: i32,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let len = bytes.len();
        trace!(len, type_tag, "send: staging body");

        self.body
            .resize_and_map(len)
            .map_err(|e| error::map_resize_failed(len, e))?;
        if len > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.body.as_mut_ptr(), len);
            }
        }
        self.length_cell.store(len as i32);
        self.type_cell.store(type_tag);

        self.sems.my_sent.post(1)?;
        trace!(len, type_tag, "send: posted, awaiting peer ack");
        if !self.sems.peer_received.wait(timeout)? {
            warn!("peer did not acknowledge send within timeout");
            self.body.unmap();
            return Err(error::protocol_abandoned("peer_received"));
        }

        self.body.unmap();
        trace!(len, type_tag, "send: complete");
        Ok(())
    }

    /// Receive the next message, blocking until the peer sends one.
    pub fn recv(&mut self) -> io::Result<(Vec<u8>, i32)> {
        let timeout = self.operation_timeout;
        self.recv_timeout(timeout)
    }

    /// Receive with an explicit timeout overriding the endpoint default.
    pub fn recv_timeout(&mut self, timeout: Option<Duration>) -> io::Result<(Vec<u8>, i32)> {
        trace!("recv: waiting for peer");
        if !self.sems.peer_sent.wait(timeout)? {
            warn!("peer did not send within timeout");
            return Err(error::protocol_abandoned("peer_sent"));
        }

        let len = self.length_cell.load().max(0) as usize;
        let type_tag = self.type_cell.load();

        self.body
            .map_at(len)
            .map_err(|e| error::map_resize_failed(len, e))?;
        let mut bytes = vec![0u8; len];
        if len > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(self.body.as_ptr(), bytes.as_mut_ptr(), len);
            }
        }

        self.sems.my_received.post(1)?;
        self.body.unmap();
        trace!(len, type_tag, "recv: complete");
        Ok((bytes, type_tag))
    }

    /// Controller-only: unlink the four semaphores and three shared-memory
    /// objects from the OS namespace. Safe to call exactly once.
    pub fn close(mut self) -> io::Result<()> {
        if self.role != Role::Controller {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "only the controller endpoint may close a channel",
            ));
        }
        self.closed = true;
        info!(channel = %self.channel_name, "closing channel");
        purge(&self.channel_name);
        Ok(())
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if self.role == Role::Controller && !self.closed {
            warn!(
                channel = %self.channel_name,
                "controller endpoint dropped without calling close(); named objects leaked"
            );
        }
    }
}

fn create_sem(name: &str) -> io::Result<IpcSemaphore> {
    IpcSemaphore::create_or_open(name, 0).map_err(|e| error::resource_creation_failed(name, e))
}

/// Child-side semaphore open can legitimately race the controller's own
/// creation of the same name; retry until `deadline` (or forever if `None`)
/// rather than failing on the first attempt.
fn open_sem_retrying(
    name: &str,
    deadline: Option<std::time::Instant>,
) -> io::Result<IpcSemaphore> {
    loop {
        match IpcSemaphore::create_or_open(name, 0) {
            Ok(sem) => return Ok(sem),
            Err(e) => {
                if let Some(deadline) = deadline {
                    if std::time::Instant::now() >= deadline {
                        return Err(error::resource_creation_failed(name, e));
                    }
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

/// Unconditionally unlink all seven of a channel's derived names from the
/// OS namespace. A maintenance operation for recovering from a controller
/// crash that left named objects behind; never called on the normal path.
pub fn purge(channel_name: &str) {
    let names = ChannelNames::derive(channel_name);
    info!(channel = channel_name, "purging channel objects");
    IpcSemaphore::clear_storage(&names.con_sent);
    IpcSemaphore::clear_storage(&names.child_recv);
    IpcSemaphore::clear_storage(&names.child_sent);
    IpcSemaphore::clear_storage(&names.con_recv);
    ShmHandle::unlink(&names.body);
    MetadataCell::unlink(&names.length);
    MetadataCell::unlink(&names.type_tag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_channel(prefix: &str) -> String {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_chan_{n}_{}", std::process::id())
    }

    /// Two in-process threads stand in for controller and child: named
    /// semaphores and shared memory are OS-global, so two threads see the
    /// same named objects two processes would.
    fn spawn_child_thread(
        channel_name: String,
        body: impl FnOnce(Endpoint) + Send + 'static,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            // Give the controller a head start creating the named objects;
            // attach retries internally regardless.
            thread::sleep(Duration::from_millis(5));
            let ep = Endpoint::attach(&channel_name).expect("child attach");
            body(ep);
        })
    }

    #[test]
    fn smoke_hello_child() {
        let name = unique_channel("smoke");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            let (bytes, tag) = ep.recv().expect("recv");
            assert_eq!(bytes, b"Hello Child");
            assert_eq!(tag, 4);
        });

        let mut controller = Endpoint::open(&name, "true").expect("controller open");
        controller.send(b"Hello Child", 4).expect("send");
        child.join().unwrap();
        controller.close().expect("close");
    }

    #[test]
    fn bidirectional_no_deadlock() {
        let name = unique_channel("bidi");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            ep.send(b"ready", 4).expect("child send");
            let (bytes, tag) = ep.recv().expect("child recv");
            assert_eq!(bytes, b"go");
            assert_eq!(tag, 4);
        });

        let mut controller = Endpoint::open(&name, "true").expect("controller open");
        let (bytes, tag) = controller.recv().expect("controller recv");
        assert_eq!(bytes, b"ready");
        assert_eq!(tag, 4);
        controller.send(b"go", 4).expect("controller send");

        child.join().unwrap();
        controller.close().expect("close");
    }

    #[test]
    fn zero_length_message_round_trips() {
        let name = unique_channel("zerolen");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            let (bytes, tag) = ep.recv().expect("recv");
            assert!(bytes.is_empty());
            assert_eq!(tag, 4);
        });

        let mut controller = Endpoint::open(&name, "true").expect("controller open");
        controller.send(&[], 4).expect("send empty");
        child.join().unwrap();
        controller.close().expect("close");
    }

    #[test]
    fn type_tags_round_trip() {
        let name = unique_channel("tags");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            for expected_tag in [1, 2, 3, 4] {
                let (bytes, tag) = ep.recv().expect("recv");
                assert_eq!(tag, expected_tag);
                assert_eq!(bytes, vec![0xAB; 4]);
            }
        });

        let mut controller = Endpoint::open(&name, "true").expect("controller open");
        for tag in [1, 2, 3, 4] {
            controller.send(&[0xAB; 4], tag).expect("send");
        }
        child.join().unwrap();
        controller.close().expect("close");
    }

    #[test]
    fn sequential_sends_preserve_order() {
        let name = unique_channel("order");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            for i in 0..50u8 {
                let (bytes, _tag) = ep.recv().expect("recv");
                assert_eq!(bytes, vec![i]);
            }
        });

        let mut controller = Endpoint::open(&name, "true").expect("controller open");
        for i in 0..50u8 {
            controller.send(&[i], 4).expect("send");
        }
        child.join().unwrap();
        controller.close().expect("close");
    }

    #[test]
    fn cleanup_allows_immediate_reopen() {
        let name = unique_channel("cleanup");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            ep.recv().expect("recv");
        });
        let mut controller = Endpoint::open(&name, "true").expect("first open");
        controller.send(b"x", 4).expect("send");
        child.join().unwrap();
        controller.close().expect("close");

        let child_name2 = name.clone();
        let child2 = spawn_child_thread(child_name2, |mut ep| {
            ep.recv().expect("recv");
        });
        let mut controller2 = Endpoint::open(&name, "true").expect("second open after close");
        controller2.send(b"y", 4).expect("send");
        child2.join().unwrap();
        controller2.close().expect("close");
    }

    #[test]
    fn child_cannot_close() {
        let name = unique_channel("no_child_close");
        purge(&name);

        let ep = Endpoint::attach_with_timeout(&name, Some(Duration::from_millis(1)));
        // With no controller ever created, attach either times out or
        // races the retry loop; either way it must never silently act as
        // a controller. If it somehow succeeded, closing must still fail.
        if let Ok(ep) = ep {
            assert_eq!(ep.role(), Role::Child);
            assert!(ep.close().is_err());
        }
    }

    #[test]
    fn recv_times_out_without_a_peer_send() {
        let name = unique_channel("timeout");
        purge(&name);

        let child_name = name.clone();
        let child = spawn_child_thread(child_name, |mut ep| {
            let result = ep.recv_timeout(Some(Duration::from_millis(50)));
            assert!(result.is_err());
        });

        let controller = Endpoint::open(&name, "true").expect("controller open");
        child.join().unwrap();
        controller.close().expect("close");
    }
}
