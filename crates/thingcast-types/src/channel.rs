//! Broadcast channel addressing.
//!
//! Every tracked thing has an implicit channel carrying its snapshots, and
//! the reserved `all` channel carries every snapshot of every thing.

use std::fmt;

use crate::ids::{RESERVED_ALL, ThingId};

/// A broadcast topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Every mutation of every thing.
    All,
    /// Mutations of a single thing.
    Thing(ThingId),
}

impl Channel {
    /// Backend subject name (`thing.all` or `thing.{id}`).
    pub fn subject(&self) -> String {
        format!("thing.{self}")
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(RESERVED_ALL),
            Self::Thing(id) => write!(f, "{id}"),
        }
    }
}

impl From<ThingId> for Channel {
    fn from(id: ThingId) -> Self {
        Self::Thing(id)
    }
}
