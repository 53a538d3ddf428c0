// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The channel's two shared-memory shapes: a resizable body object (the
// single-slot message buffer) and a fixed-size metadata cell (the `length`
// and `type_tag` companions). Both delegate to platform::PlatformShm.

use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::platform::PlatformShm;

/// The named shared-memory object carrying the current message body.
///
/// Resized (truncated) and remapped before every send by the writer; the
/// reader maps it read-only-in-practice at the length the writer already
/// agreed on. Between exchanges the handle holds no mapping at all — both
/// `mmap` and `MapViewOfFile` reject zero-length requests, so "nothing
/// mapped yet" and "mapped at length zero" are the same `None` state.
pub struct ShmHandle {
    name: String,
    mapping: Option<PlatformShm>,
}

impl ShmHandle {
    /// Create the body object for the first time (controller-only, at
    /// channel open). Not mapped until the first resize or map.
    pub fn create(name: &str) -> io::Result<Self> {
        let mapping = PlatformShm::create(name, 0)?;
        Ok(Self {
            name: name.to_string(),
            mapping: (mapping.size() > 0).then_some(mapping),
        })
    }

    /// Bind to a body object the controller has already created, without
    /// mapping it (child-side attach: the body isn't touched until the
    /// first `recv`).
    pub fn attach(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mapping: None,
        }
    }

    /// Resize the body object to `len` bytes and map it. Used by the
    /// writer immediately before copying a payload in.
    pub fn resize_and_map(&mut self, len: usize) -> io::Result<()> {
        let mapping = PlatformShm::resize(&self.name, len)?;
        self.mapping = (len > 0).then_some(mapping);
        Ok(())
    }

    /// Map the body object at exactly `len` bytes, the length the writer
    /// already wrote to the length cell. Used by the reader.
    pub fn map_at(&mut self, len: usize) -> io::Result<()> {
        let mapping = PlatformShm::open(&self.name, len)?;
        self.mapping = (len > 0).then_some(mapping);
        Ok(())
    }

    /// Unmap until the next `resize_and_map`/`map_at`.
    pub fn unmap(&mut self) {
        self.mapping = None;
    }

    /// Pointer to the mapped body. Never dereferenced when `mapped_len()`
    /// is zero.
    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.as_ref().map_or(std::ptr::null(), |m| m.as_ptr())
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mapping
            .as_ref()
            .map_or(std::ptr::null_mut(), |m| m.as_mut_ptr())
    }

    /// Bytes currently mapped.
    pub fn mapped_len(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.size())
    }

    /// Remove the body object's name from the OS namespace (controller-only).
    pub fn unlink(name: &str) {
        PlatformShm::unlink_by_name(name);
    }
}

/// A fixed-size shared-memory object holding one 32-bit integer: either the
/// current message's `length` or its `type_tag`.
///
/// 32-bit width matches the distilled source's use of a C `int` for both
/// fields (see DESIGN.md).
pub struct MetadataCell {
    inner: PlatformShm,
}

impl MetadataCell {
    const SIZE: usize = std::mem::size_of::<i32>();

    /// Create the cell (controller-only, at channel open), initialized to 0.
    pub fn create(name: &str) -> io::Result<Self> {
        let inner = PlatformShm::create(name, Self::SIZE)?;
        let cell = Self { inner };
        cell.store(0);
        Ok(cell)
    }

    /// Open an existing cell (child-side attach).
    pub fn open(name: &str) -> io::Result<Self> {
        let inner = PlatformShm::open(name, Self::SIZE)?;
        Ok(Self { inner })
    }

    fn atomic(&self) -> &AtomicI32 {
        // Safety: the cell is exactly `size_of::<i32>()` bytes, mapped
        // read/write, and a freshly-mapped page's base address always
        // satisfies `i32`'s alignment requirement.
        unsafe { &*(self.inner.as_ptr() as *const AtomicI32) }
    }

    /// Release-store the value (paired with the "sent" semaphore post).
    pub fn store(&self, value: i32) {
        self.atomic().store(value, Ordering::Release);
    }

    /// Acquire-load the value (paired with having completed the "sent" wait).
    pub fn load(&self) -> i32 {
        self.atomic().load(Ordering::Acquire)
    }

    /// Remove the cell's name from the OS namespace (controller-only).
    pub fn unlink(name: &str) {
        PlatformShm::unlink_by_name(name);
    }
}
