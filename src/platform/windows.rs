// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows implementation of the channel's two kernel-object primitives:
// shared memory via file mappings, and named semaphores.

use std::io;
use std::ptr;
use std::time::Duration;

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

// ---------------------------------------------------------------------------
// PlatformShm — Windows shared memory via file mapping
// ---------------------------------------------------------------------------

pub struct PlatformShm {
    handle: windows_sys::Win32::Foundation::HANDLE,
    mem: *mut u8,
    size: usize,
}

unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    pub fn create(name: &str, size: usize) -> io::Result<Self> {
        use windows_sys::Win32::Foundation::*;
        use windows_sys::Win32::System::Memory::*;

        // A zero-max-size section is meaningless for a pagefile-backed
        // mapping; reserve one byte so the name exists, and treat the
        // handle as unmapped until the first non-zero resize.
        let reserve = size.max(1);
        let wide_name = to_wide(name);
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_READWRITE | SEC_COMMIT,
                0,
                reserve as u32,
                wide_name.as_ptr(),
            )
        };
        let err = unsafe { GetLastError() };
        if err == ERROR_ALREADY_EXISTS {
            if handle != 0 {
                unsafe { CloseHandle(handle) };
            }
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "shm already exists",
            ));
        }
        if handle == 0 {
            return Err(io::Error::last_os_error());
        }
        if size == 0 {
            return Ok(Self {
                handle,
                mem: ptr::null_mut(),
                size: 0,
            });
        }
        Self::map(handle, size)
    }

    pub fn open(name: &str, size: usize) -> io::Result<Self> {
        use windows_sys::Win32::Foundation::*;
        use windows_sys::Win32::System::Memory::FILE_MAP_ALL_ACCESS;

        let wide_name = to_wide(name);
        let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, FALSE, wide_name.as_ptr()) };
        if handle == 0 {
            return Err(io::Error::last_os_error());
        }
        if size == 0 {
            // `MapViewOfFile` cannot map zero bytes; keep the handle open
            // (so the name stays resolvable) but leave it unmapped.
            return Ok(Self {
                handle,
                mem: ptr::null_mut(),
                size: 0,
            });
        }
        Self::map(handle, size)
    }

    /// Resize the named section by closing this process's handle and
    /// recreating it at `size`. Windows sections have a fixed maximum size
    /// for the lifetime of the underlying kernel object, so this only takes
    /// effect once every process's handle to the previous incarnation has
    /// closed — which the channel protocol guarantees by construction
    /// (nobody else holds the body mapped between exchanges).
    pub fn resize(name: &str, size: usize) -> io::Result<Self> {
        use windows_sys::Win32::Foundation::*;
        use windows_sys::Win32::System::Memory::*;

        if size == 0 {
            return Ok(Self {
                handle: 0,
                mem: ptr::null_mut(),
                size: 0,
            });
        }

        let wide_name = to_wide(name);
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_READWRITE | SEC_COMMIT,
                0,
                size as u32,
                wide_name.as_ptr(),
            )
        };
        if handle == 0 {
            return Err(io::Error::last_os_error());
        }
        Self::map(handle, size)
    }

    fn map(handle: windows_sys::Win32::Foundation::HANDLE, size: usize) -> io::Result<Self> {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Memory::{MapViewOfFile, FILE_MAP_ALL_ACCESS};

        let mem = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, size) };
        if mem.is_null() {
            let e = io::Error::last_os_error();
            unsafe { CloseHandle(handle) };
            return Err(e);
        }
        Ok(Self {
            handle,
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

    /// Windows shared memory is backed by the pagefile, not a name in a
    /// persistent namespace — there is nothing to unlink. A mapping with no
    /// remaining open handles is simply reclaimed by the OS.
    pub fn unlink_by_name(_name: &str) {}
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Memory::UnmapViewOfFile;
        if !self.mem.is_null() {
            unsafe { UnmapViewOfFile(self.mem as *const _) };
        }
        if self.handle != 0 {
            unsafe { CloseHandle(self.handle) };
        }
    }
}

// ---------------------------------------------------------------------------
// PlatformSemaphore — Windows named semaphore
// ---------------------------------------------------------------------------

pub struct PlatformSemaphore {
    handle: windows_sys::Win32::Foundation::HANDLE,
}

unsafe impl Send for PlatformSemaphore {}
unsafe impl Sync for PlatformSemaphore {}

impl PlatformSemaphore {
    pub fn create_or_open(name: &str, initial_count: u32) -> io::Result<Self> {
        use windows_sys::Win32::System::Threading::CreateSemaphoreW;

        let wide_name = to_wide(name);
        let handle = unsafe {
            CreateSemaphoreW(
                ptr::null(),
                initial_count as i32,
                i32::MAX,
                wide_name.as_ptr(),
            )
        };
        if handle == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { handle })
    }

    pub fn open_existing(name: &str) -> io::Result<Self> {
        use windows_sys::Win32::Foundation::FALSE;
        use windows_sys::Win32::System::Threading::{OpenSemaphoreW, SEMAPHORE_ALL_ACCESS};

        let wide_name = to_wide(name);
        let handle = unsafe { OpenSemaphoreW(SEMAPHORE_ALL_ACCESS, FALSE, wide_name.as_ptr()) };
        if handle == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { handle })
    }

    pub fn wait(&self, timeout: Option<Duration>) -> io::Result<bool> {
        use windows_sys::Win32::System::Threading::{
            WaitForSingleObject, INFINITE, WAIT_OBJECT_0, WAIT_TIMEOUT,
        };

        let ms = match timeout {
            None => INFINITE,
            Some(d) => d.as_millis().min(u128::from(u32::MAX)) as u32,
        };
        let ret = unsafe { WaitForSingleObject(self.handle, ms) };
        match ret {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(io::Error::last_os_error()),
        }
    }

    pub fn post(&self, n: u32) -> io::Result<()> {
        use windows_sys::Win32::System::Threading::ReleaseSemaphore;
        if unsafe { ReleaseSemaphore(self.handle, n as i32, ptr::null_mut()) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Named kernel objects on Windows are reclaimed once their last handle
    /// closes — there is no persistent namespace entry to remove explicitly.
    pub fn clear_storage(_name: &str) {}
}

impl Drop for PlatformSemaphore {
    fn drop(&mut self) {
        use windows_sys::Win32::Foundation::CloseHandle;
        if self.handle != 0 {
            unsafe { CloseHandle(self.handle) };
        }
    }
}
