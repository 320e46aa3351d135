//! Dense identifiers for configured entities
//!
//! Tests are addressed by their position in `tests_order` once the
//! configuration has been resolved, so every per-test table is a plain `Vec`.

use serde::{Deserialize, Serialize};

/// Position of a test within the resolved `tests_order`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestId(pub u16);

impl TestId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}
