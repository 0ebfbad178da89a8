//! Immutable snapshots pinned to a retained root
//!
//! Both kinds expose the same read-only query surface via `DocView`.
//! An owning snapshot copies the buffer collection value (the original
//! buffers are shared by reference, the mod buffer by value at capture
//! time) and therefore survives the tree it came from; a referencing
//! snapshot borrows the tree's buffers and is tied to its lifetime.

use crate::buffer::BufferCollection;
use crate::tree::RedBlackTree;

use super::{compute_buffer_meta, BufferMeta, DocView, PieceTree};

/// A snapshot that owns its buffer data.
#[derive(Debug, Clone)]
pub struct OwningSnapshot {
    root: RedBlackTree,
    meta: BufferMeta,
    // Lightweight: the original buffers stay shared; only the mod
    // buffer contents are copied.
    buffers: BufferCollection,
}

impl OwningSnapshot {
    pub(crate) fn new(tree: &PieceTree) -> Self {
        Self {
            root: tree.root.clone(),
            meta: tree.meta,
            buffers: tree.buffers.clone(),
        }
    }

    pub(crate) fn with_root(tree: &PieceTree, root: RedBlackTree) -> Self {
        let meta = compute_buffer_meta(&root);
        Self {
            root,
            meta,
            buffers: tree.buffers.clone(),
        }
    }
}

impl DocView for OwningSnapshot {
    fn buffers(&self) -> &BufferCollection {
        &self.buffers
    }

    fn root(&self) -> &RedBlackTree {
        &self.root
    }

    fn meta(&self) -> BufferMeta {
        self.meta
    }
}

/// A snapshot that borrows the tree's buffers; the tree must outlive
/// it.
#[derive(Debug, Clone)]
pub struct RefSnapshot<'a> {
    root: RedBlackTree,
    meta: BufferMeta,
    buffers: &'a BufferCollection,
}

impl<'a> RefSnapshot<'a> {
    pub(crate) fn new(tree: &'a PieceTree) -> Self {
        Self {
            root: tree.root.clone(),
            meta: tree.meta,
            buffers: &tree.buffers,
        }
    }

    pub(crate) fn with_root(tree: &'a PieceTree, root: RedBlackTree) -> Self {
        let meta = compute_buffer_meta(&root);
        Self {
            root,
            meta,
            buffers: &tree.buffers,
        }
    }
}

impl DocView for RefSnapshot<'_> {
    fn buffers(&self) -> &BufferCollection {
        self.buffers
    }

    fn root(&self) -> &RedBlackTree {
        &self.root
    }

    fn meta(&self) -> BufferMeta {
        self.meta
    }
}
