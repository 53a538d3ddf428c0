// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Derives the seven deterministic kernel-object names (four semaphores,
// three shared-memory objects) belonging to one channel from its channel
// name. Both endpoints must produce byte-identical names from identical
// inputs; this module is the only place that does the deriving.

/// Suffix appended to `/{channel_name}` for the controller→child "sent" semaphore.
pub const SUFFIX_CON_SENT: &str = "_con_sent";
/// Suffix for the controller→child "received" semaphore.
pub const SUFFIX_CHILD_RECV: &str = "_child_recv";
/// Suffix for the child→controller "sent" semaphore.
pub const SUFFIX_CHILD_SENT: &str = "_child_sent";
/// Suffix for the child→controller "received" semaphore.
pub const SUFFIX_CON_RECV: &str = "_con_recv";
/// Suffix for the message body shared-memory object.
pub const SUFFIX_BODY: &str = "_fd_message_fd_name";
/// Suffix for the length metadata cell.
pub const SUFFIX_LENGTH: &str = "_fd_message_size";
/// Suffix for the type-tag metadata cell.
pub const SUFFIX_TYPE: &str = "_fd_message_type";

/// FNV-1a 64-bit hash.
fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Convert a 64-bit value to a fixed-width 16-char lowercase hex string.
fn to_hex(val: u64) -> [u8; 16] {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut buf = [0u8; 16];
    let mut v = val;
    for i in (0..16).rev() {
        buf[i] = DIGITS[(v & 0xf) as usize];
        v >>= 4;
    }
    buf
}

/// Maximum length for POSIX named-object names. Set to 0 to disable truncation.
///
/// On macOS `PSHMNAMLEN` is 31. On Linux the effective limit is much larger;
/// we leave it unbounded there.
#[cfg(target_os = "macos")]
pub const NAME_MAX: usize = 31;

#[cfg(not(target_os = "macos"))]
pub const NAME_MAX: usize = 0; // 0 = no truncation

/// Derive a single kernel-object name from a channel name and a fixed suffix.
///
/// The untruncated form is `/{channel_name}{suffix}`. When the host caps
/// named-object length (`NAME_MAX > 0`) and that form would exceed it, the
/// name is shortened to a truncated prefix plus a 16-hex-digit FNV-1a hash of
/// the full untruncated name, so distinct channel names never collide after
/// truncation while still reading as roughly the original name under `/proc`
/// or `ls /dev/shm`.
pub fn derive(channel_name: &str, suffix: &str) -> String {
    let full = format!("/{channel_name}{suffix}");

    if NAME_MAX == 0 || full.len() <= NAME_MAX {
        return full;
    }

    const HASH_SUFFIX_LEN: usize = 1 + 16; // '_' + 16 hex digits
    let prefix_len = NAME_MAX.saturating_sub(HASH_SUFFIX_LEN + 1); // -1 for leading '/'

    let hash = fnv1a_64(full.as_bytes());
    let hex = to_hex(hash);
    let hex_str = std::str::from_utf8(&hex).unwrap();

    let mut shortened = String::with_capacity(NAME_MAX);
    shortened.push('/');
    if prefix_len > 0 {
        let body = &full[1..];
        let take = prefix_len.min(body.len());
        shortened.push_str(&body[..take]);
    }
    shortened.push('_');
    shortened.push_str(hex_str);
    shortened
}

/// The seven names derived for one channel, computed once at `open`/`attach`
/// time and cached on the endpoint so the hot send/recv path never
/// reconstructs a `String`.
#[derive(Debug, Clone)]
pub struct ChannelNames {
    pub con_sent: String,
    pub child_recv: String,
    pub child_sent: String,
    pub con_recv: String,
    pub body: String,
    pub length: String,
    pub type_tag: String,
}

impl ChannelNames {
    pub fn derive(channel_name: &str) -> Self {
        Self {
            con_sent: derive(channel_name, SUFFIX_CON_SENT),
            child_recv: derive(channel_name, SUFFIX_CHILD_RECV),
            child_sent: derive(channel_name, SUFFIX_CHILD_SENT),
            con_recv: derive(channel_name, SUFFIX_CON_RECV),
            body: derive(channel_name, SUFFIX_BODY),
            length: derive(channel_name, SUFFIX_LENGTH),
            type_tag: derive(channel_name, SUFFIX_TYPE),
        }
    }
}
