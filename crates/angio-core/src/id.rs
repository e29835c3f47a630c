//! Stable ID newtype for vessel edges.
//!
//! Edges live in an arena keyed by [`EdgeId`]. Ids are handed out from a
//! monotonically increasing counter and never reused, so a stored id either
//! still names the same vessel or names nothing at all.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
