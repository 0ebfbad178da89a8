//! Persistent red-black tree keyed by cumulative piece length
//!
//! The tree stores the document's piece sequence in order; there is no
//! explicit key. Descent compares the target offset against the running
//! sum of left-subtree length plus piece length, so a node's position is
//! its cumulative character offset. Every node additionally caches its
//! left subtree's total length and line-feed count, which is what makes
//! offset and line lookups O(log n).
//!
//! Nodes are immutable and shared: an edit allocates fresh nodes along
//! the mutated path only and returns a new root, while old roots (held
//! by history entries and snapshots) remain valid. Insertion is the
//! classic Okasaki rebalancing; removal is the functional fuse-style
//! variant which never materializes a double-black marker.

use std::sync::Arc;

use crate::buffer::Piece;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// Tree payload: one piece plus the left-subtree order statistics.
///
/// `left_len` / `left_lf` are recomputed from the actual left child
/// every time a node is built; callers never set them directly.
#[derive(Debug, Clone, Copy)]
pub struct NodeData {
    pub piece: Piece,
    pub left_len: usize,
    pub left_lf: usize,
}

impl NodeData {
    pub fn new(piece: Piece) -> Self {
        Self {
            piece,
            left_len: 0,
            left_lf: 0,
        }
    }
}

#[derive(Debug)]
struct Node {
    color: Color,
    left: RedBlackTree,
    data: NodeData,
    right: RedBlackTree,
}

/// A (possibly empty) persistent red-black tree. Cloning is a cheap
/// reference-count bump; two clones share structure.
#[derive(Debug, Clone, Default)]
pub struct RedBlackTree(Option<Arc<Node>>);

impl PartialEq for RedBlackTree {
    /// Identity comparison: two trees are equal when they are the same
    /// shared root, not when they have equal contents.
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl RedBlackTree {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Payload of the root node.
    ///
    /// Panics when the tree is empty.
    pub fn data(&self) -> &NodeData {
        &self.0.as_ref().expect("data() on empty tree").data
    }

    /// Left subtree, or an empty tree.
    pub fn left(&self) -> RedBlackTree {
        match &self.0 {
            Some(node) => node.left.clone(),
            None => RedBlackTree::new(),
        }
    }

    /// Right subtree, or an empty tree.
    pub fn right(&self) -> RedBlackTree {
        match &self.0 {
            Some(node) => node.right.clone(),
            None => RedBlackTree::new(),
        }
    }

    fn color(&self) -> Color {
        match &self.0 {
            Some(node) => node.color,
            None => Color::Black,
        }
    }

    fn is_red(&self) -> bool {
        matches!(&self.0, Some(node) if node.color == Color::Red)
    }

    fn is_black(&self) -> bool {
        matches!(&self.0, Some(node) if node.color == Color::Black)
    }

    /// Total length of all pieces in the tree.
    pub fn total_length(&self) -> usize {
        match &self.0 {
            None => 0,
            Some(node) => node.data.left_len + node.data.piece.length + node.right.total_length(),
        }
    }

    /// Total line-feed count of all pieces in the tree.
    pub fn total_lf_count(&self) -> usize {
        match &self.0 {
            None => 0,
            Some(node) => node.data.left_lf + node.data.piece.newline_count + node.right.total_lf_count(),
        }
    }

    /// Build a node, recomputing the left-subtree statistics from the
    /// actual left child. This is the sole place the augments are
    /// maintained.
    fn branch(color: Color, left: RedBlackTree, data: NodeData, right: RedBlackTree) -> RedBlackTree {
        let data = NodeData {
            piece: data.piece,
            left_len: left.total_length(),
            left_lf: left.total_lf_count(),
        };
        RedBlackTree(Some(Arc::new(Node {
            color,
            left,
            data,
            right,
        })))
    }

    fn paint(&self, color: Color) -> RedBlackTree {
        let node = self.0.as_ref().expect("paint() on empty tree");
        Self::branch(color, node.left.clone(), node.data, node.right.clone())
    }

    // ---------- Insertion ----------

    /// Insert `data` so that it lands at cumulative offset `at`.
    ///
    /// The comparison is strict, so an insertion at an existing piece
    /// boundary goes to the right of the piece ending there; successive
    /// insertions at one offset therefore stack leftwards.
    pub fn insert(&self, data: NodeData, at: usize) -> RedBlackTree {
        let t = self.ins(data, at, 0);
        let node = t.0.as_ref().expect("insert produced empty tree");
        Self::branch(Color::Black, node.left.clone(), node.data, node.right.clone())
    }

    fn ins(&self, x: NodeData, at: usize, total: usize) -> RedBlackTree {
        let Some(node) = &self.0 else {
            return Self::branch(Color::Red, RedBlackTree::new(), x, RedBlackTree::new());
        };
        let y = &node.data;
        if at < total + y.left_len + y.piece.length {
            Self::balance(node.color, node.left.ins(x, at, total), *y, node.right.clone())
        } else {
            Self::balance(
                node.color,
                node.left.clone(),
                *y,
                node.right.ins(x, at, total + y.left_len + y.piece.length),
            )
        }
    }

    fn doubled_left(&self) -> bool {
        self.is_red() && self.left().is_red()
    }

    fn doubled_right(&self) -> bool {
        self.is_red() && self.right().is_red()
    }

    fn balance(color: Color, left: RedBlackTree, x: NodeData, right: RedBlackTree) -> RedBlackTree {
        if color == Color::Black && left.doubled_left() {
            RedBlackTree::branch(
                Color::Red,
                left.left().paint(Color::Black),
                *left.data(),
                RedBlackTree::branch(Color::Black, left.right(), x, right),
            )
        } else if color == Color::Black && left.doubled_right() {
            RedBlackTree::branch(
                Color::Red,
                RedBlackTree::branch(Color::Black, left.left(), *left.data(), left.right().left()),
                *left.right().data(),
                RedBlackTree::branch(Color::Black, left.right().right(), x, right),
            )
        } else if color == Color::Black && right.doubled_left() {
            RedBlackTree::branch(
                Color::Red,
                RedBlackTree::branch(Color::Black, left, x, right.left().left()),
                *right.left().data(),
                RedBlackTree::branch(Color::Black, right.left().right(), *right.data(), right.right()),
            )
        } else if color == Color::Black && right.doubled_right() {
            RedBlackTree::branch(
                Color::Red,
                RedBlackTree::branch(Color::Black, left, x, right.left()),
                *right.data(),
                right.right().paint(Color::Black),
            )
        } else {
            RedBlackTree::branch(color, left, x, right)
        }
    }

    // ---------- Removal (fuse style) ----------

    /// Remove the node whose cumulative start offset is exactly `at`.
    pub fn remove(&self, at: usize) -> RedBlackTree {
        let t = Self::rem(self.clone(), at, 0);
        match &t.0 {
            None => RedBlackTree::new(),
            Some(node) => Self::branch(Color::Black, node.left.clone(), node.data, node.right.clone()),
        }
    }

    fn rem(root: RedBlackTree, at: usize, total: usize) -> RedBlackTree {
        let Some(node) = &root.0 else {
            return RedBlackTree::new();
        };
        let y = &node.data;
        if at < total + y.left_len {
            Self::remove_left(&root, at, total)
        } else if at == total + y.left_len {
            Self::fuse(node.left.clone(), node.right.clone())
        } else {
            Self::remove_right(&root, at, total)
        }
    }

    fn remove_left(root: &RedBlackTree, at: usize, total: usize) -> RedBlackTree {
        let new_left = Self::rem(root.left(), at, total);
        let new_node = Self::branch(Color::Red, new_left, *root.data(), root.right());
        // If the removed-from child was black, the subtree lost black
        // height and must be rebalanced.
        if root.left().is_black() {
            Self::balance_left(&new_node)
        } else {
            new_node
        }
    }

    fn remove_right(root: &RedBlackTree, at: usize, total: usize) -> RedBlackTree {
        let y = root.data();
        let new_right = Self::rem(root.right(), at, total + y.left_len + y.piece.length);
        let new_node = Self::branch(Color::Red, root.left(), *y, new_right);
        if root.right().is_black() {
            Self::balance_right(&new_node)
        } else {
            new_node
        }
    }

    /// Join two subtrees whose root was removed, dispatching on the
    /// child colors.
    fn fuse(left: RedBlackTree, right: RedBlackTree) -> RedBlackTree {
        if left.is_empty() {
            return right;
        }
        if right.is_empty() {
            return left;
        }
        match (left.color(), right.color()) {
            (Color::Black, Color::Red) => RedBlackTree::branch(
                Color::Red,
                Self::fuse(left, right.left()),
                *right.data(),
                right.right(),
            ),
            (Color::Red, Color::Black) => RedBlackTree::branch(
                Color::Red,
                left.left(),
                *left.data(),
                Self::fuse(left.right(), right),
            ),
            (Color::Red, Color::Red) => {
                let fused = Self::fuse(left.right(), right.left());
                if fused.is_red() {
                    let new_left =
                        RedBlackTree::branch(Color::Red, left.left(), *left.data(), fused.left());
                    let new_right =
                        RedBlackTree::branch(Color::Red, fused.right(), *right.data(), right.right());
                    return RedBlackTree::branch(Color::Red, new_left, *fused.data(), new_right);
                }
                let new_right = RedBlackTree::branch(Color::Red, fused, *right.data(), right.right());
                RedBlackTree::branch(Color::Red, left.left(), *left.data(), new_right)
            }
            (Color::Black, Color::Black) => {
                let fused = Self::fuse(left.right(), right.left());
                if fused.is_red() {
                    let new_left =
                        RedBlackTree::branch(Color::Black, left.left(), *left.data(), fused.left());
                    let new_right = RedBlackTree::branch(
                        Color::Black,
                        fused.right(),
                        *right.data(),
                        right.right(),
                    );
                    return RedBlackTree::branch(Color::Red, new_left, *fused.data(), new_right);
                }
                let new_right =
                    RedBlackTree::branch(Color::Black, fused, *right.data(), right.right());
                let new_node =
                    RedBlackTree::branch(Color::Red, left.left(), *left.data(), new_right);
                Self::balance_left(&new_node)
            }
        }
    }

    /// Rebalance a node whose children may both be red, or fall back to
    /// the insertion balance.
    fn balance_node(node: &RedBlackTree) -> RedBlackTree {
        if node.left().is_red() && node.right().is_red() {
            let l = node.left().paint(Color::Black);
            let r = node.right().paint(Color::Black);
            return RedBlackTree::branch(Color::Red, l, *node.data(), r);
        }
        debug_assert!(node.color() == Color::Black);
        Self::balance(node.color(), node.left(), *node.data(), node.right())
    }

    /// Restore the red-black invariants after the left subtree lost one
    /// black node.
    fn balance_left(node: &RedBlackTree) -> RedBlackTree {
        // case: (Some(R), ..)
        if node.left().is_red() {
            return RedBlackTree::branch(
                Color::Red,
                node.left().paint(Color::Black),
                *node.data(),
                node.right(),
            );
        }
        // case: (_, Some(B), _)
        if node.right().is_black() {
            let new_node = RedBlackTree::branch(
                Color::Black,
                node.left(),
                *node.data(),
                node.right().paint(Color::Red),
            );
            return Self::balance_node(&new_node);
        }
        // case: (_, Some(R), Some(B))
        if node.right().is_red() && node.right().left().is_black() {
            let unbalanced_new_right = RedBlackTree::branch(
                Color::Black,
                node.right().left().right(),
                *node.right().data(),
                node.right().right().paint(Color::Red),
            );
            let new_right = Self::balance_node(&unbalanced_new_right);
            let new_left = RedBlackTree::branch(
                Color::Black,
                node.left(),
                *node.data(),
                node.right().left().left(),
            );
            return RedBlackTree::branch(
                Color::Red,
                new_left,
                *node.right().left().data(),
                new_right,
            );
        }
        unreachable!("balance_left: invariant violation");
    }

    /// Mirror image of `balance_left`.
    fn balance_right(node: &RedBlackTree) -> RedBlackTree {
        // case: (.., Some(R))
        if node.right().is_red() {
            return RedBlackTree::branch(
                Color::Red,
                node.left(),
                *node.data(),
                node.right().paint(Color::Black),
            );
        }
        // case: (Some(B), ..)
        if node.left().is_black() {
            let new_node = RedBlackTree::branch(
                Color::Black,
                node.left().paint(Color::Red),
                *node.data(),
                node.right(),
            );
            return Self::balance_node(&new_node);
        }
        // case: (Some(R), Some(B), _)
        if node.left().is_red() && node.left().right().is_black() {
            let unbalanced_new_left = RedBlackTree::branch(
                Color::Black,
                // Because 'left' is red, it must have a left child.
                node.left().left().paint(Color::Red),
                *node.left().data(),
                node.left().right().left(),
            );
            let new_left = Self::balance_node(&unbalanced_new_left);
            let new_right = RedBlackTree::branch(
                Color::Black,
                node.left().right().right(),
                *node.data(),
                node.right(),
            );
            return RedBlackTree::branch(
                Color::Red,
                new_left,
                *node.left().right().data(),
                new_right,
            );
        }
        unreachable!("balance_right: invariant violation");
    }

    // ---------- Validation ----------

    /// Assert the red-black properties and augment consistency over the
    /// whole tree. O(n); intended for tests and debug builds.
    pub fn check_invariants(&self) {
        self.check_black_height();
        self.check_augments();
    }

    fn check_black_height(&self) -> usize {
        let Some(node) = &self.0 else {
            return 1;
        };
        if node.color == Color::Red {
            assert!(
                !node.left.is_red() && !node.right.is_red(),
                "red node has a red child"
            );
        }
        let l = node.left.check_black_height();
        let r = node.right.check_black_height();
        assert_eq!(l, r, "unequal black heights");
        if node.color == Color::Black {
            l + 1
        } else {
            l
        }
    }

    fn check_augments(&self) {
        let Some(node) = &self.0 else {
            return;
        };
        assert_eq!(
            node.data.left_len,
            node.left.total_length(),
            "stale left_len augment"
        );
        assert_eq!(
            node.data.left_lf,
            node.left.total_lf_count(),
            "stale left_lf augment"
        );
        node.left.check_augments();
        node.right.check_augments();
    }
}
