//! 64-bit identifiers.
//!
//! Items, versions and successor edges share one integer id type. Ids are
//! allocated by [`IdGenerator`](crate::IdGenerator) and never reuse the
//! [`EMPTY_ROOT`] sentinel.

/// A 64-bit catalog identifier.
pub type Id = u64;

/// The synthetic root of every version history.
///
/// A successor edge whose `from_id` is `EMPTY_ROOT` marks a version with no
/// real predecessor. The sentinel is always considered part of a history.
pub const EMPTY_ROOT: Id = 0;

/// Formats an id as `0x`-prefixed fixed-width lowercase hex.
///
/// Machine and namespace bits sit at the top of the id, so the hex form keeps
/// them visually aligned across ids.
pub fn format_id(id: Id) -> String {
    format!("{:#018x}", id)
}

/// Parses an id from `0x`-prefixed hex or from plain decimal.
///
/// Unprefixed input is always decimal, whatever its length.
pub fn parse_id(s: &str) -> Option<Id> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Id::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
