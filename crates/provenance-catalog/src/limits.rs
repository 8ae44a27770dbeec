//! Security limits for snapshot decoding.
//!
//! Snapshot files may be corrupted or come from an untrusted copy, so every
//! allocation the decoder makes is bounded by one of these constants.

/// Magic bytes of an uncompressed snapshot.
pub const MAGIC_UNCOMPRESSED: &[u8; 4] = b"PCAT";

/// Magic bytes of a zstd-compressed snapshot.
pub const MAGIC_COMPRESSED: &[u8; 5] = b"PCATZ";

/// Current snapshot format version.
pub const FORMAT_VERSION: u8 = 1;

/// Length of the trailing SHA-256 checksum.
pub const CHECKSUM_LEN: usize = 32;

/// Maximum bytes in a LEB128 varint for a u64.
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum bytes in a string (names, keys, tag values, references).
pub const MAX_STRING_LEN: usize = 1 << 20;

/// Maximum entries in any one section or nested list.
pub const MAX_RECORDS: usize = 1 << 24;

/// Maximum size of an uncompressed snapshot.
pub const MAX_SNAPSHOT_SIZE: usize = 1 << 30;
