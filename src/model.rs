//! Program model: iteration domains and access relations.
//!
//! These are thin, validated wrappers around the algebra types. An
//! iteration domain is a union of statement instance sets; an access
//! relation maps statement instances to the array elements they touch,
//! tagged read or write.

use crate::algebra::{Map, Set};
use crate::error::{ModelError, PolyschedError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The union of statement instance sets under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationDomain {
    set: Set,
}

impl IterationDomain {
    /// Wrap a set as an iteration domain. A statement name may contribute
    /// several pieces, but they must agree on arity.
    pub fn new(set: Set) -> Result<Self, ModelError> {
        for (i, a) in set.pieces.iter().enumerate() {
            for b in &set.pieces[i + 1..] {
                if a.tuple.name == b.tuple.name && a.tuple.arity() != b.tuple.arity() {
                    let name = a.tuple.name.clone().unwrap_or_default();
                    return Err(ModelError::DuplicateStatement(name));
                }
            }
        }
        Ok(Self { set })
    }

    /// Parse a domain from textual notation.
    pub fn parse(text: &str) -> Result<Self, PolyschedError> {
        let set = Set::parse(text)?;
        Ok(Self::new(set)?)
    }

    /// The underlying set.
    pub fn set(&self) -> &Set {
        &self.set
    }

    /// Names of the statements in the domain.
    pub fn statements(&self) -> BTreeSet<String> {
        self.set.statement_names()
    }
}

impl fmt::Display for IterationDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.set)
    }
}

/// Whether an access reads or writes its array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKind {
    /// The statement reads the element
    Read,
    /// The statement writes the element
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
        }
    }
}

/// A relation from statement instances to accessed array elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRelation {
    map: Map,
    kind: AccessKind,
}

impl AccessRelation {
    /// A read access.
    pub fn read(map: Map) -> Self {
        Self {
            map,
            kind: AccessKind::Read,
        }
    }

    /// A write access.
    pub fn write(map: Map) -> Self {
        Self {
            map,
            kind: AccessKind::Write,
        }
    }

    /// Parse a read access from textual notation.
    pub fn parse_read(text: &str) -> Result<Self, PolyschedError> {
        Ok(Self::read(Map::parse(text)?))
    }

    /// Parse a write access from textual notation.
    pub fn parse_write(text: &str) -> Result<Self, PolyschedError> {
        Ok(Self::write(Map::parse(text)?))
    }

    /// The underlying relation.
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The access kind.
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    /// Fail unless the access has the required kind.
    pub fn require(&self, kind: AccessKind) -> Result<&Map, ModelError> {
        if self.kind == kind {
            Ok(&self.map)
        } else {
            Err(ModelError::WrongAccessKind {
                expected: match kind {
                    AccessKind::Read => "read",
                    AccessKind::Write => "write",
                },
            })
        }
    }
}

impl fmt::Display for AccessRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.map)
    }
}

/// A dependence between statement instances: source instance to sink
/// instance, the sink depending on the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenceRelation(pub Map);

impl DependenceRelation {
    /// The underlying relation.
    pub fn map(&self) -> &Map {
        &self.0
    }
}

impl fmt::Display for DependenceRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A constant dependence distance, one entry per loop dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceVector(pub Vec<i64>);

impl DistanceVector {
    /// Entries of the vector.
    pub fn components(&self) -> &[i64] {
        &self.0
    }

    /// First nonzero entry, with its position.
    pub fn leading_nonzero(&self) -> Option<(usize, i64)> {
        self.0.iter().enumerate().find(|&(_, &v)| v != 0).map(|(i, &v)| (i, v))
    }
}

impl fmt::Display for DistanceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_accepts_union() {
        let d = IterationDomain::parse("{ S[i] : 0 <= i < 4; T[i, j] : 0 <= i < 2 and 0 <= j < 2 }")
            .unwrap();
        let names: Vec<String> = d.statements().into_iter().collect();
        assert_eq!(names, vec!["S".to_string(), "T".to_string()]);
    }

    #[test]
    fn test_domain_rejects_arity_conflict() {
        let set = Set::parse("{ S[i] : 0 <= i < 4; S[i, j] : 0 <= i < 2 and 0 <= j < 2 }").unwrap();
        assert!(matches!(
            IterationDomain::new(set),
            Err(ModelError::DuplicateStatement(_))
        ));
    }

    #[test]
    fn test_access_kind_guard() {
        let a = AccessRelation::parse_read("{ S[i] -> A[i] : 0 <= i < 4 }").unwrap();
        assert!(a.require(AccessKind::Read).is_ok());
        assert!(matches!(
            a.require(AccessKind::Write),
            Err(ModelError::WrongAccessKind { expected: "write" })
        ));
    }

    #[test]
    fn test_distance_vector_display() {
        let d = DistanceVector(vec![1, 0]);
        assert_eq!(d.to_string(), "(1, 0)");
        assert_eq!(d.leading_nonzero(), Some((0, 1)));
    }
}
