// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX implementation of the channel's two kernel-object primitives: named
// shared memory (`shm_open`/`ftruncate`/`mmap`) and named counting
// semaphores (`sem_open`/`sem_wait`/`sem_post`).
//
// Unlike a general-purpose shm/mutex library shared by many unrelated
// callers within one process, each object here has exactly one handle per
// process for the lifetime of a channel, so there is no process-local
// reference-counting cache and no auto-unlink-on-drop: unlinking a name is
// always an explicit, separate operation performed only by the controller
// (`Endpoint::close`, `purge`).

use std::ffi::CString;
use std::io;
use std::ptr;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// PlatformShm — POSIX shared memory
// ---------------------------------------------------------------------------

pub struct PlatformShm {
    mem: *mut u8,
    size: usize,
}

// Safety: the mapped region is shared across processes by design; the
// pointer itself carries no thread-affinity.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    /// Create a new named shared-memory object of exactly `size` bytes and
    /// map it. Fails with `AlreadyExists` if the name is already taken.
    pub fn create(posix_name: &str, size: usize) -> io::Result<Self> {
        let c_name = cstr(posix_name)?;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                0o666,
            )
        };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        unsafe { libc::fchmod(fd, 0o666) };
        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        if size == 0 {
            unsafe { libc::close(fd) };
            return Ok(Self {
                mem: ptr::null_mut(),
                size: 0,
            });
        }
        Self::mmap_and_close(fd, size)
    }

    /// Open an existing named shared-memory object and map exactly `size`
    /// bytes of it. Does not truncate — the caller is responsible for
    /// passing the size the creator already established (re-truncating an
    /// already-sized object can zero its contents on some platforms).
    pub fn open(posix_name: &str, size: usize) -> io::Result<Self> {
        if size == 0 {
            // See `resize`: mmap rejects zero-length mappings, so a
            // zero-length body is represented as a null, zero-size handle.
            let c_name = cstr(posix_name)?;
            let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666) };
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }
            unsafe { libc::close(fd) };
            return Ok(Self {
                mem: ptr::null_mut(),
                size: 0,
            });
        }
        let c_name = cstr(posix_name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        Self::mmap_and_close(fd, size)
    }

    /// Open an existing named shared-memory object, `ftruncate` it to
    /// exactly `size` bytes, then map it. Used by the body object's writer
    /// side to resize the single-slot buffer before each send; the object
    /// itself must already exist (created once, at channel-open time).
    pub fn resize(posix_name: &str, size: usize) -> io::Result<Self> {
        if size == 0 {
            // A zero-length mapping is undefined behavior on Linux
            // (`mmap` with `length == 0` fails with EINVAL). The body
            // object is left at whatever size it already has and simply
            // not mapped; `ShmHandle` treats this as an empty handle.
            let c_name = cstr(posix_name)?;
            let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666) };
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }
            let truncated = unsafe { libc::ftruncate(fd, 0) } == 0;
            unsafe { libc::close(fd) };
            if !truncated {
                return Err(io::Error::last_os_error());
            }
            return Ok(Self {
                mem: ptr::null_mut(),
                size: 0,
            });
        }

        let c_name = cstr(posix_name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        Self::mmap_and_close(fd, size)
    }

    fn mmap_and_close(fd: i32, size: usize) -> io::Result<Self> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };
        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            mem: mem as *mut u8,
            size,
        })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mem
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Remove `posix_name` from the OS namespace. Existing mappings (if any)
    /// remain valid until unmapped. Not an error if the name is already gone.
    pub fn unlink_by_name(posix_name: &str) {
        if let Ok(c_name) = cstr(posix_name) {
            unsafe {
                libc::shm_unlink(c_name.as_ptr());
            }
        }
    }
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
        }
    }
}

fn cstr(s: &str) -> io::Result<CString> {
    CString::new(s.as_bytes()).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

// ---------------------------------------------------------------------------
// PlatformSemaphore — POSIX named counting semaphore
// ---------------------------------------------------------------------------

pub struct PlatformSemaphore {
    sem: *mut libc::sem_t,
}

unsafe impl Send for PlatformSemaphore {}
unsafe impl Sync for PlatformSemaphore {}

impl PlatformSemaphore {
    /// `sem_open` with `O_CREAT`; if the name already exists its current
    /// count is left untouched (`initial_count` is ignored in that case,
    /// per the named-synchronization-primitive contract).
    pub fn create_or_open(name: &str, initial_count: u32) -> io::Result<Self> {
        let c_name = cstr(name)?;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o666 as libc::mode_t,
                initial_count as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { sem })
    }

    /// `sem_open` without `O_CREAT` — fails if the name does not exist.
    pub fn open_existing(name: &str) -> io::Result<Self> {
        let c_name = cstr(name)?;
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { sem })
    }

    /// Decrement, blocking while the count is zero. `None` blocks
    /// indefinitely; `Some(d)` returns `Ok(false)` on expiry rather than
    /// blocking forever (`Some(Duration::ZERO)` polls once, without
    /// sleeping).
    pub fn wait(&self, timeout: Option<Duration>) -> io::Result<bool> {
        let Some(timeout) = timeout else {
            return loop {
                let r = unsafe { libc::sem_wait(self.sem) };
                if r == 0 {
                    break Ok(true);
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    break Err(err);
                }
            };
        };

        #[cfg(target_os = "macos")]
        {
            // macOS has no `sem_timedwait`; poll `sem_trywait` instead,
            // mirroring the macOS branch of `PlatformMutex::lock_timeout`
            // elsewhere in this codebase's mutex implementation.
            let deadline = Instant::now() + timeout;
            loop {
                let r = unsafe { libc::sem_trywait(self.sem) };
                if r == 0 {
                    return Ok(true);
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::WouldBlock
                    && err.kind() != io::ErrorKind::Interrupted
                {
                    return Err(err);
                }
                if Instant::now() >= deadline {
                    return Ok(false);
                }
                std::thread::sleep(Duration::from_micros(200).min(timeout));
            }
        }

        #[cfg(not(target_os = "macos"))]
        {
            let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
            unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
            let extra_ns = timeout.subsec_nanos() as i64;
            let mut sec = ts.tv_sec + timeout.as_secs() as libc::time_t;
            let mut nsec = ts.tv_nsec + extra_ns as libc::c_long;
            if nsec >= 1_000_000_000 {
                nsec -= 1_000_000_000;
                sec += 1;
            }
            ts.tv_sec = sec;
            ts.tv_nsec = nsec;
            loop {
                let r = unsafe { libc::sem_timedwait(self.sem, &ts) };
                if r == 0 {
                    return Ok(true);
                }
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::TimedOut => return Ok(false),
                    io::ErrorKind::Interrupted => continue,
                    _ => return Err(err),
                }
            }
        }
    }

    /// Increment the count by `n`, waking up to `n` waiters.
    pub fn post(&self, n: u32) -> io::Result<()> {
        for _ in 0..n {
            if unsafe { libc::sem_post(self.sem) } != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Remove `name` from the OS namespace. Not an error if already gone.
    pub fn clear_storage(name: &str) {
        if let Ok(c_name) = cstr(name) {
            unsafe {
                libc::sem_unlink(c_name.as_ptr());
            }
        }
    }
}

impl Drop for PlatformSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}
