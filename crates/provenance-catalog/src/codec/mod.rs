//! Binary snapshot encoding/decoding for the file-backed store.

pub mod primitives;
pub mod snapshot;

pub use primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
pub use snapshot::{decode_snapshot, encode_snapshot, encode_snapshot_compressed};
