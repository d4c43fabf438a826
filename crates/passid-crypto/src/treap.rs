//! # Certificate Treap
//!
//! A treap over 32-byte keys that doubles as a Merkle accumulator.
//!
//! ## Invariants
//!
//! 1. In-order traversal yields keys in ascending big-endian order.
//! 2. No child has a higher priority than its parent.
//! 3. `acc(node) = combine(combine(acc(left), acc(right)), key)`, with absent
//!    children acting as the identity, so a childless node's acc is its key.
//!
//! Priorities are supplied by the caller. When they are derived from the key
//! (see [`crate::cert_tree::derive_priority`]) the shape, and therefore the
//! root, depends only on the key set and never on insertion history.
//!
//! ## Proofs
//!
//! [`CertTreap::merkle_path`] lists, leaf to root, the values a verifier folds
//! into the leaf with [`crate::combinator::fold_path`]. Because the combinator
//! is commutative the path carries no direction bits.

use passid_core::Hash32;
use thiserror::Error;

use crate::combinator::{combine, hash_pair};

type Link = Option<Box<Node>>;

#[derive(Debug, Clone)]
struct Node {
    key: Hash32,
    priority: u64,
    acc: Hash32,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(key: Hash32, priority: u64) -> Box<Self> {
        Box::new(Self {
            key,
            priority,
            acc: key,
            left: None,
            right: None,
        })
    }

    fn children_acc(&self) -> Option<Hash32> {
        combine(
            self.left.as_ref().map(|n| n.acc),
            self.right.as_ref().map(|n| n.acc),
        )
    }

    /// Recompute `acc` from the children. Call after any child changes.
    fn update(&mut self) {
        self.acc = match self.children_acc() {
            Some(children) => hash_pair(&children, &self.key),
            None => self.key,
        };
    }
}

/// Partition into `(keys <= key, keys > key)`.
fn split(link: Link, key: &Hash32) -> (Link, Link) {
    match link {
        None => (None, None),
        Some(mut node) => {
            if node.key <= *key {
                let (le, gt) = split(node.right.take(), key);
                node.right = le;
                node.update();
                (Some(node), gt)
            } else {
                let (le, gt) = split(node.left.take(), key);
                node.left = gt;
                node.update();
                (le, Some(node))
            }
        }
    }
}

/// Join two treaps where every key in `left` is below every key in `right`.
/// The higher priority stays on top; ties go to the right side.
fn merge(left: Link, right: Link) -> Link {
    match (left, right) {
        (None, right) => right,
        (left, None) => left,
        (Some(mut l), Some(mut r)) => {
            if l.priority > r.priority {
                l.right = merge(l.right.take(), Some(r));
                l.update();
                Some(l)
            } else {
                r.left = merge(Some(l), r.left.take());
                r.update();
                Some(r)
            }
        }
    }
}

/// A structural invariant that failed to hold. Only produced by
/// [`CertTreap::check_invariants`]; a correct treap never reports one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// In-order keys are not strictly ascending.
    #[error("keys out of order: {prev} is not below {next}")]
    Order { prev: Hash32, next: Hash32 },

    /// A child outranks its parent.
    #[error("heap order broken under {parent}: child {child} has priority {child_priority} > {parent_priority}")]
    Heap {
        parent: Hash32,
        parent_priority: u64,
        child: Hash32,
        child_priority: u64,
    },

    /// A cached accumulator is stale.
    #[error("stale accumulator at {key}")]
    Accumulator { key: Hash32 },

    /// The cached length disagrees with the node count.
    #[error("length mismatch: cached {cached}, counted {counted}")]
    Length { cached: usize, counted: usize },
}

/// Authenticated set of certificate leaf hashes.
#[derive(Debug, Clone, Default)]
pub struct CertTreap {
    root: Link,
    len: usize,
}

impl CertTreap {
    /// An empty treap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no keys are held.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// True when `key` is present.
    pub fn contains(&self, key: &Hash32) -> bool {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            node = match key.cmp(&n.key) {
                std::cmp::Ordering::Equal => return true,
                std::cmp::Ordering::Less => n.left.as_deref(),
                std::cmp::Ordering::Greater => n.right.as_deref(),
            };
        }
        false
    }

    /// Insert `key` with `priority`. Returns `false` and leaves the treap
    /// untouched if the key is already present.
    pub fn insert(&mut self, key: Hash32, priority: u64) -> bool {
        if self.contains(&key) {
            return false;
        }
        let (le, gt) = split(self.root.take(), &key);
        self.root = merge(merge(le, Some(Node::leaf(key, priority))), gt);
        self.len += 1;
        true
    }

    /// Remove `key`. Returns `false` if it was absent.
    pub fn remove(&mut self, key: &Hash32) -> bool {
        if !self.contains(key) {
            return false;
        }
        let root = self.root.take();
        let (below, rest) = match key.predecessor() {
            Some(pred) => split(root, &pred),
            None => (None, root),
        };
        let (_single, above) = split(rest, key);
        self.root = merge(below, above);
        self.len -= 1;
        true
    }

    /// The root accumulator, or `None` when empty.
    pub fn merkle_root(&self) -> Option<Hash32> {
        self.root.as_ref().map(|n| n.acc)
    }

    /// Leaf-to-root path for `key`, or an empty list if the key is absent.
    ///
    /// Folding the path into `key` reproduces [`Self::merkle_root`].
    pub fn merkle_path(&self, key: &Hash32) -> Vec<Hash32> {
        let mut path = Vec::new();
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            let (next, other) = match key.cmp(&n.key) {
                std::cmp::Ordering::Equal => {
                    if let Some(children) = n.children_acc() {
                        path.push(children);
                    }
                    path.reverse();
                    return path;
                }
                std::cmp::Ordering::Less => (n.left.as_deref(), n.right.as_deref()),
                std::cmp::Ordering::Greater => (n.right.as_deref(), n.left.as_deref()),
            };
            path.push(n.key);
            if let Some(other) = other {
                path.push(other.acc);
            }
            node = next;
        }
        Vec::new()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<Hash32> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<&Node> = Vec::new();
        let mut node = self.root.as_deref();
        loop {
            while let Some(n) = node {
                stack.push(n);
                node = n.left.as_deref();
            }
            match stack.pop() {
                Some(n) => {
                    out.push(n.key);
                    node = n.right.as_deref();
                }
                None => break,
            }
        }
        out
    }

    /// Walk the whole tree and verify order, heap and accumulator invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut counted = 0usize;
        if let Some(root) = self.root.as_deref() {
            check_node(root, &mut counted)?;
        }
        let keys = self.keys();
        for pair in keys.windows(2) {
            if pair[0] >= pair[1] {
                return Err(InvariantViolation::Order {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        if counted != self.len {
            return Err(InvariantViolation::Length {
                cached: self.len,
                counted,
            });
        }
        Ok(())
    }
}

fn check_node(node: &Node, counted: &mut usize) -> Result<(), InvariantViolation> {
    *counted += 1;
    for child in [node.left.as_deref(), node.right.as_deref()]
        .into_iter()
        .flatten()
    {
        if child.priority > node.priority {
            return Err(InvariantViolation::Heap {
                parent: node.key,
                parent_priority: node.priority,
                child: child.key,
                child_priority: child.priority,
            });
        }
        check_node(child, counted)?;
    }
    let expected = match node.children_acc() {
        Some(children) => hash_pair(&children, &node.key),
        None => node.key,
    };
    if expected != node.acc {
        return Err(InvariantViolation::Accumulator { key: node.key });
    }
    Ok(())
}
