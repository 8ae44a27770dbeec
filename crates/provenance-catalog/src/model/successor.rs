//! Version successor edges.

use crate::model::{EMPTY_ROOT, Id};

/// A directed edge recording that `to_id` was derived from `from_id`.
///
/// `from_id` is either a version already in the owning item's history or
/// [`EMPTY_ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionSuccessor {
    pub id: Id,
    pub from_id: Id,
    pub to_id: Id,
}

impl VersionSuccessor {
    pub fn new(id: Id, from_id: Id, to_id: Id) -> Self {
        Self { id, from_id, to_id }
    }

    /// True when this edge hangs `to_id` off the item root.
    pub fn is_root_edge(&self) -> bool {
        self.from_id == EMPTY_ROOT
    }
}
