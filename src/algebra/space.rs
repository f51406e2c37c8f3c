//! Tuple spaces: an optional statement name plus named dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tuple space such as `S[i, j]` or the anonymous `[i, j]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    /// Statement/array name; `None` for anonymous tuples
    pub name: Option<String>,
    /// Dimension names, in order
    pub dims: Vec<String>,
}

impl Tuple {
    /// Create a named tuple.
    pub fn named(name: impl Into<String>, dims: Vec<String>) -> Self {
        Self {
            name: Some(name.into()),
            dims,
        }
    }

    /// Create an anonymous tuple with default dimension names.
    pub fn anonymous(n_dim: usize) -> Self {
        Self {
            name: None,
            dims: (0..n_dim).map(|i| format!("o{}", i)).collect(),
        }
    }

    /// Number of dimensions.
    pub fn arity(&self) -> usize {
        self.dims.len()
    }

    /// Position of a dimension name.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }

    /// Two tuples denote the same space when the names and arities agree.
    /// Dimension names are labels only and do not participate.
    pub fn same_space(&self, other: &Tuple) -> bool {
        self.name == other.name && self.arity() == other.arity()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref name) = self.name {
            write!(f, "{}", name)?;
        }
        write!(f, "[{}]", self.dims.join(", "))
    }
}
