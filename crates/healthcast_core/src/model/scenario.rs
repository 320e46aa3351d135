use std::fmt;

use serde::{Deserialize, Serialize};

/// The two forecast modes.
///
/// `Decline` ages the client forward at the configured rates. `Improvement`
/// applies an instantaneous gain in year one and then keeps aging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Decline,
    Improvement,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::Decline, Scenario::Improvement];

    /// Stable discriminant mixed into per-draw seeds
    #[must_use]
    pub fn stream_tag(self) -> u64 {
        match self {
            Scenario::Decline => 0x6465_636c,
            Scenario::Improvement => 0x696d_7072,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Decline => write!(f, "decline"),
            Scenario::Improvement => write!(f, "improvement"),
        }
    }
}
