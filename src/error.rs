// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Maps the channel's named error kinds onto `io::Error`, matching the
// `io::Result`-everywhere convention already used throughout the platform
// layer rather than introducing a crate-specific error enum.

use std::io;

/// Opening a channel whose names already exist and belong to an unrelated
/// live channel.
pub(crate) fn naming_collision(object: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("channel object {object} already exists"),
    )
}

/// Classify a shared-memory creation failure: `AlreadyExists` means another
/// live channel (or a stale leftover) already holds this name, which is a
/// naming collision rather than a generic resource failure; anything else
/// is reported as `resource_creation_failed`.
pub(crate) fn naming_collision_or(object: &str, cause: io::Error) -> io::Error {
    if cause.kind() == io::ErrorKind::AlreadyExists {
        naming_collision(object)
    } else {
        resource_creation_failed(object, cause)
    }
}

/// The OS rejected creation of a semaphore or shared-memory object.
pub(crate) fn resource_creation_failed(object: &str, cause: io::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("failed to create {object}: {cause}"),
    )
}

/// The body object could not be resized/mapped to the requested length.
pub(crate) fn map_resize_failed(len: usize, cause: io::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("failed to map body object at length {len}: {cause}"),
    )
}

/// A peer never posted the semaphore we were waiting on within the deadline.
pub(crate) fn protocol_abandoned(waiting_on: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("peer did not post {waiting_on} before the deadline"),
    )
}
