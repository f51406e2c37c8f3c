//! The schedule tree: a persistent, typed tree describing execution order.
//!
//! Nodes are shared through `Arc`; transformations path-copy from the root
//! down to the edited node and leave every other subtree shared with the
//! original value.

use crate::algebra::{Map, Set};
use crate::error::ScheduleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One dimension of a band: an affine schedule function per statement plus
/// a coincidence flag marking the dimension parallel with respect to the
/// dependences it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMember {
    /// Statement instances to a single time dimension
    pub schedule: Map,
    /// Whether instances differing only in this dimension are independent
    pub coincident: bool,
}

/// A node of the schedule tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleNode {
    /// Root: the iteration domain the schedule covers
    Domain {
        domain: Set,
        child: Arc<ScheduleNode>,
    },
    /// An ordered group of schedule dimensions
    Band {
        members: Vec<BandMember>,
        child: Arc<ScheduleNode>,
    },
    /// Children execute in listed order
    Sequence { children: Vec<Arc<ScheduleNode>> },
    /// Restricts the instances flowing into its child
    Filter { filter: Set, child: Arc<ScheduleNode> },
    /// No further ordering
    Leaf,
}

impl ScheduleNode {
    /// Node kind, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleNode::Domain { .. } => "domain",
            ScheduleNode::Band { .. } => "band",
            ScheduleNode::Sequence { .. } => "sequence",
            ScheduleNode::Filter { .. } => "filter",
            ScheduleNode::Leaf => "leaf",
        }
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        match self {
            ScheduleNode::Domain { .. } | ScheduleNode::Band { .. } | ScheduleNode::Filter { .. } => 1,
            ScheduleNode::Sequence { children } => children.len(),
            ScheduleNode::Leaf => 0,
        }
    }

    /// Child at an index.
    pub fn child(&self, index: usize) -> Result<&Arc<ScheduleNode>, ScheduleError> {
        let out_of_range = || ScheduleError::PathOutOfRange {
            index,
            node: self.kind(),
        };
        match self {
            ScheduleNode::Domain { child, .. }
            | ScheduleNode::Band { child, .. }
            | ScheduleNode::Filter { child, .. } => {
                if index == 0 {
                    Ok(child)
                } else {
                    Err(out_of_range())
                }
            }
            ScheduleNode::Sequence { children } => children.get(index).ok_or_else(out_of_range),
            ScheduleNode::Leaf => Err(out_of_range()),
        }
    }

    /// A copy of this node with one child replaced.
    fn with_child(&self, index: usize, new_child: Arc<ScheduleNode>) -> Result<ScheduleNode, ScheduleError> {
        // validates the index
        self.child(index)?;
        let mut node = self.clone();
        match &mut node {
            ScheduleNode::Domain { child, .. }
            | ScheduleNode::Band { child, .. }
            | ScheduleNode::Filter { child, .. } => *child = new_child,
            ScheduleNode::Sequence { children } => children[index] = new_child,
            ScheduleNode::Leaf => unreachable!(),
        }
        Ok(node)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            ScheduleNode::Domain { domain, child } => {
                writeln!(f, "{}domain: {}", pad, domain)?;
                child.write_indented(f, depth + 1)
            }
            ScheduleNode::Band { members, child } => {
                let flags: Vec<&str> = members
                    .iter()
                    .map(|m| if m.coincident { "coincident" } else { "-" })
                    .collect();
                writeln!(f, "{}band[{}]: ({})", pad, members.len(), flags.join(", "))?;
                for m in members {
                    writeln!(f, "{}  {}", pad, m.schedule)?;
                }
                child.write_indented(f, depth + 1)
            }
            ScheduleNode::Sequence { children } => {
                writeln!(f, "{}sequence", pad)?;
                for c in children {
                    c.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
            ScheduleNode::Filter { filter, child } => {
                writeln!(f, "{}filter: {}", pad, filter)?;
                child.write_indented(f, depth + 1)
            }
            ScheduleNode::Leaf => writeln!(f, "{}leaf", pad),
        }
    }
}

/// A complete schedule: a tree rooted at a domain node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    root: Arc<ScheduleNode>,
}

impl Schedule {
    /// Wrap a tree; the root must be a domain node.
    pub fn new(root: ScheduleNode) -> Result<Self, ScheduleError> {
        if !matches!(root, ScheduleNode::Domain { .. }) {
            return Err(ScheduleError::MissingDomainRoot);
        }
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// The root node.
    pub fn root(&self) -> &Arc<ScheduleNode> {
        &self.root
    }

    /// The domain the schedule covers.
    pub fn domain(&self) -> &Set {
        match &*self.root {
            ScheduleNode::Domain { domain, .. } => domain,
            _ => unreachable!("root is validated on construction"),
        }
    }

    /// Node addressed by a path of child indices from the root.
    pub fn node_at(&self, path: &[usize]) -> Result<&Arc<ScheduleNode>, ScheduleError> {
        let mut node = &self.root;
        for &index in path {
            node = node.child(index)?;
        }
        Ok(node)
    }

    /// A new schedule with the node at `path` replaced, path-copying the
    /// spine and sharing everything else.
    pub fn replace_at(&self, path: &[usize], replacement: ScheduleNode) -> Result<Schedule, ScheduleError> {
        fn rebuild(
            node: &Arc<ScheduleNode>,
            path: &[usize],
            replacement: ScheduleNode,
        ) -> Result<Arc<ScheduleNode>, ScheduleError> {
            match path.split_first() {
                None => Ok(Arc::new(replacement)),
                Some((&index, rest)) => {
                    let new_child = rebuild(node.child(index)?, rest, replacement)?;
                    Ok(Arc::new(node.with_child(index, new_child)?))
                }
            }
        }
        let root = rebuild(&self.root, path, replacement)?;
        if !matches!(&*root, ScheduleNode::Domain { .. }) {
            return Err(ScheduleError::MissingDomainRoot);
        }
        Ok(Schedule { root })
    }

    /// Flatten the tree into one map from statement instances to logical
    /// time vectors: band members contribute their dimensions in order,
    /// sequence children a leading constant position, filters restrict.
    pub fn schedule_map(&self) -> Result<Map, ScheduleError> {
        match &*self.root {
            ScheduleNode::Domain { domain, child } => flatten(child, domain),
            _ => unreachable!("root is validated on construction"),
        }
    }
}

fn flatten(node: &ScheduleNode, restrict: &Set) -> Result<Map, ScheduleError> {
    match node {
        ScheduleNode::Domain { .. } => Err(ScheduleError::MissingDomainRoot),
        ScheduleNode::Leaf => Ok(Map::zero_range_of(restrict)),
        ScheduleNode::Filter { filter, child } => {
            let narrowed = restrict.intersect(filter)?;
            flatten(child, &narrowed)
        }
        ScheduleNode::Band { members, child } => {
            let below = flatten(child, restrict)?;
            let mut iter = members.iter();
            let Some(first) = iter.next() else {
                return Ok(below);
            };
            let mut band = first.schedule.intersect_domain(restrict);
            for m in iter {
                band = band.flat_range_product(&m.schedule);
            }
            Ok(band.flat_range_product(&below))
        }
        ScheduleNode::Sequence { children } => {
            let mut flat = Map::empty();
            let mut arity: Option<usize> = None;
            for (position, child) in children.iter().enumerate() {
                let m = flatten(child, restrict)?.prepend_const_out(position as i64);
                match (arity, m.uniform_out_arity()) {
                    (_, None) => {} // child is empty, nothing to disagree on
                    (None, Some(a)) => arity = Some(a),
                    (Some(a), Some(b)) if a == b => {}
                    _ => return Err(ScheduleError::RaggedSequence),
                }
                flat = flat.union(&m);
            }
            Ok(flat)
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.write_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{Map, Set};

    fn two_dim_tree() -> Schedule {
        let domain = Set::parse("{ S[i, j] : 0 <= i < 2 and 0 <= j < 2 }").unwrap();
        let theta = Map::parse("{ S[i, j] -> [i, j] }").unwrap();
        let inner = ScheduleNode::Band {
            members: vec![BandMember {
                schedule: theta.output_slice(1, 1),
                coincident: true,
            }],
            child: Arc::new(ScheduleNode::Leaf),
        };
        let outer = ScheduleNode::Band {
            members: vec![BandMember {
                schedule: theta.output_slice(0, 1),
                coincident: false,
            }],
            child: Arc::new(inner),
        };
        Schedule::new(ScheduleNode::Domain {
            domain,
            child: Arc::new(outer),
        })
        .unwrap()
    }

    #[test]
    fn test_root_must_be_domain() {
        assert!(matches!(
            Schedule::new(ScheduleNode::Leaf),
            Err(ScheduleError::MissingDomainRoot)
        ));
    }

    #[test]
    fn test_flatten_band_stack() {
        let flat = two_dim_tree().schedule_map().unwrap();
        let expected =
            Map::parse("{ S[i, j] -> [i, j] : 0 <= i < 2 and 0 <= j < 2 }").unwrap();
        assert!(flat.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_flatten_sequence_positions() {
        let domain = Set::parse("{ S[i] : 0 <= i < 2; T[i] : 0 <= i < 2 }").unwrap();
        let band_for = |stmt: &str| ScheduleNode::Band {
            members: vec![BandMember {
                schedule: Map::parse(&format!("{{ {}[i] -> [i] }}", stmt)).unwrap(),
                coincident: false,
            }],
            child: Arc::new(ScheduleNode::Leaf),
        };
        let branch = |stmt: &str| {
            Arc::new(ScheduleNode::Filter {
                filter: Set::parse(&format!("{{ {}[i] }}", stmt)).unwrap(),
                child: Arc::new(band_for(stmt)),
            })
        };
        let tree = Schedule::new(ScheduleNode::Domain {
            domain,
            child: Arc::new(ScheduleNode::Sequence {
                children: vec![branch("S"), branch("T")],
            }),
        })
        .unwrap();
        let flat = tree.schedule_map().unwrap();
        let expected = Map::parse(
            "{ S[i] -> [0, i] : 0 <= i < 2; T[i] -> [1, i] : 0 <= i < 2 }",
        )
        .unwrap();
        assert!(flat.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_flatten_ragged_sequence_rejected() {
        let domain = Set::parse("{ S[i] : 0 <= i < 2; T[i] : 0 <= i < 2 }").unwrap();
        let deep = Arc::new(ScheduleNode::Filter {
            filter: Set::parse("{ S[i] }").unwrap(),
            child: Arc::new(ScheduleNode::Band {
                members: vec![
                    BandMember {
                        schedule: Map::parse("{ S[i] -> [i] }").unwrap(),
                        coincident: false,
                    },
                    BandMember {
                        schedule: Map::parse("{ S[i] -> [i] }").unwrap(),
                        coincident: false,
                    },
                ],
                child: Arc::new(ScheduleNode::Leaf),
            }),
        });
        let shallow = Arc::new(ScheduleNode::Filter {
            filter: Set::parse("{ T[i] }").unwrap(),
            child: Arc::new(ScheduleNode::Band {
                members: vec![BandMember {
                    schedule: Map::parse("{ T[i] -> [i] }").unwrap(),
                    coincident: false,
                }],
                child: Arc::new(ScheduleNode::Leaf),
            }),
        });
        let tree = Schedule::new(ScheduleNode::Domain {
            domain,
            child: Arc::new(ScheduleNode::Sequence {
                children: vec![deep, shallow],
            }),
        })
        .unwrap();
        assert!(matches!(
            tree.schedule_map(),
            Err(ScheduleError::RaggedSequence)
        ));
    }

    #[test]
    fn test_replace_shares_subtrees() {
        let tree = two_dim_tree();
        let replaced = tree.replace_at(&[0, 0], ScheduleNode::Leaf).unwrap();
        // the inner band is gone, the outer band survives
        let node = replaced.node_at(&[0, 0]).unwrap();
        assert_eq!(node.kind(), "leaf");
        assert_eq!(tree.node_at(&[0, 0]).unwrap().kind(), "band");
    }

    #[test]
    fn test_path_out_of_range() {
        let tree = two_dim_tree();
        assert!(matches!(
            tree.node_at(&[0, 1]),
            Err(ScheduleError::PathOutOfRange { index: 1, node: "band" })
        ));
    }
}
