//! Header and block-selector types shared by sources, hooks and clients.

use serde::{Deserialize, Serialize};

// ─── Header ───────────────────────────────────────────────────────────────────

/// A block header observed on the watched chain.
///
/// Immutable once produced; ownership moves from the acquisition task through
/// the delivery channel into the hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Block number.
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Parent block hash (`0x…`).
    pub parent_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

impl Header {
    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &Header) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({})", self.number, self.hash)
    }
}

// ─── BlockSelector ────────────────────────────────────────────────────────────

/// Which block a header query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockSelector {
    /// The chain's current head.
    #[default]
    Latest,
    /// A specific block height.
    Number(u64),
}

impl BlockSelector {
    /// JSON-RPC block tag: `"latest"` or a `0x`-prefixed hex quantity.
    pub fn as_tag(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(n) => format!("{n:#x}"),
        }
    }
}

impl std::fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
