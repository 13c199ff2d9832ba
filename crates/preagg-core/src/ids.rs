//! Process and flow identifiers and the sparse coordinates built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(namespace, code)` pair identifying a process or an elementary flow.
///
/// The code is stable across databases; the namespace (database name) may
/// differ between two copies of the same system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentifierPair {
    /// Database or namespace name.
    pub namespace: String,
    /// Local code, unique within the namespace.
    pub code: String,
}

impl IdentifierPair {
    /// Builds a pair from its parts.
    pub fn new(namespace: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for IdentifierPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.namespace, self.code)
    }
}

/// Location of one nonzero entry of a sparse system matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateTriple {
    /// Supplying process or flow.
    pub input: IdentifierPair,
    /// Consuming process.
    pub output: IdentifierPair,
    /// Exchange type label (`technosphere`, `biosphere`, ...).
    pub kind: String,
}
