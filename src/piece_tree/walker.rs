//! Ordered code-unit traversal
//!
//! Walkers iterate the document in order (or reverse) by keeping an
//! explicit stack of tree frames, each with a tri-state direction:
//! which of left subtree / own piece / right subtree to visit next.
//! Seeking descends like an offset lookup while recording frames, so
//! resuming traversal from an arbitrary offset costs O(log n).

use smallvec::SmallVec;

use crate::buffer::BufferCollection;
use crate::code_unit::{CodeUnit, NUL};
use crate::tree::RedBlackTree;

use super::{BufferMeta, DocView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone)]
struct StackEntry {
    node: RedBlackTree,
    dir: Direction,
}

type WalkStack = SmallVec<[StackEntry; 8]>;

/// Forward in-order walker over a tree or snapshot.
pub struct TreeWalker<'a> {
    buffers: &'a BufferCollection,
    root: RedBlackTree,
    meta: BufferMeta,
    stack: WalkStack,
    total_offset: usize,
    text: &'a [CodeUnit],
    first: usize,
    last: usize,
}

impl<'a> TreeWalker<'a> {
    pub fn new<V: DocView>(view: &'a V) -> Self {
        Self::with_offset(view, 0)
    }

    pub fn with_offset<V: DocView>(view: &'a V, offset: usize) -> Self {
        let root = view.root().clone();
        let mut walker = Self {
            buffers: view.buffers(),
            root: root.clone(),
            meta: view.meta(),
            stack: WalkStack::new(),
            total_offset: offset,
            text: &[],
            first: 0,
            last: 0,
        };
        walker.stack.push(StackEntry {
            node: root,
            dir: Direction::Left,
        });
        walker.fast_forward_to(offset);
        walker
    }

    /// The next code unit, advancing; `NUL` once exhausted.
    pub fn next(&mut self) -> CodeUnit {
        if self.first == self.last {
            self.populate_ptrs();
            if self.exhausted() {
                return NUL;
            }
            // Catchall for a zero-width frame.
            if self.first == self.last {
                return self.next();
            }
        }
        self.total_offset += 1;
        let unit = self.text[self.first];
        self.first += 1;
        unit
    }

    /// The next code unit without advancing; `NUL` once exhausted.
    pub fn current(&mut self) -> CodeUnit {
        if self.first == self.last {
            self.populate_ptrs();
            if self.exhausted() {
                return NUL;
            }
        }
        self.text[self.first]
    }

    /// Restart traversal from `offset`.
    pub fn seek(&mut self, offset: usize) {
        self.stack.clear();
        self.stack.push(StackEntry {
            node: self.root.clone(),
            dir: Direction::Left,
        });
        self.first = 0;
        self.last = 0;
        self.total_offset = offset;
        self.fast_forward_to(offset);
    }

    pub fn exhausted(&self) -> bool {
        if self.stack.is_empty() {
            return true;
        }
        // If we have not exhausted the current piece, we're still active.
        if self.first != self.last {
            return false;
        }
        if self.stack.len() > 1 {
            return false;
        }
        // A single spent frame means we're done.
        let entry = &self.stack[0];
        if entry.node.is_empty() {
            return true;
        }
        entry.dir == Direction::Right && entry.node.right().is_empty()
    }

    /// Code units left to read.
    pub fn remaining(&self) -> usize {
        self.meta.total_content_length.saturating_sub(self.total_offset)
    }

    /// Offset of the next code unit to be read.
    pub fn offset(&self) -> usize {
        self.total_offset
    }

    fn populate_ptrs(&mut self) {
        if self.exhausted() {
            return;
        }
        if self.stack.last().map_or(false, |entry| entry.node.is_empty()) {
            self.stack.pop();
            self.populate_ptrs();
            return;
        }

        let entry = self.stack.last_mut().expect("non-empty stack");
        match entry.dir {
            Direction::Left => {
                let left = entry.node.left();
                entry.dir = Direction::Center;
                if !left.is_empty() {
                    self.stack.push(StackEntry {
                        node: left,
                        dir: Direction::Left,
                    });
                }
                self.populate_ptrs();
            }
            Direction::Center => {
                let piece = entry.node.data().piece;
                entry.dir = Direction::Right;
                let buffers = self.buffers;
                let buffer = buffers.buffer_at(piece.index);
                self.text = &buffer.text;
                self.first = buffers.buffer_offset(piece.index, piece.first);
                self.last = buffers.buffer_offset(piece.index, piece.last);
            }
            Direction::Right => {
                let right = entry.node.right();
                self.stack.pop();
                self.stack.push(StackEntry {
                    node: right,
                    dir: Direction::Left,
                });
                self.populate_ptrs();
            }
        }
    }

    fn fast_forward_to(&mut self, mut offset: usize) {
        let buffers = self.buffers;
        let mut node = self.root.clone();
        while !node.is_empty() {
            let data = *node.data();
            if data.left_len > offset {
                // For when we revisit this frame.
                if let Some(entry) = self.stack.last_mut() {
                    entry.dir = Direction::Center;
                }
                node = node.left();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Left,
                });
            } else if data.left_len + data.piece.length > offset {
                // The offset is inside this piece.
                if let Some(entry) = self.stack.last_mut() {
                    entry.dir = Direction::Right;
                }
                offset -= data.left_len;
                let piece = data.piece;
                let buffer = buffers.buffer_at(piece.index);
                self.text = &buffer.text;
                self.first = buffers.buffer_offset(piece.index, piece.first) + offset;
                self.last = buffers.buffer_offset(piece.index, piece.last);
                return;
            } else {
                debug_assert!(!self.stack.is_empty());
                // This frame's piece is entirely behind the offset.
                self.stack.pop();
                offset -= data.left_len + data.piece.length;
                node = node.right();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Left,
                });
            }
        }
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = CodeUnit;

    fn next(&mut self) -> Option<CodeUnit> {
        if self.exhausted() {
            None
        } else {
            Some(TreeWalker::next(self))
        }
    }
}

/// Reverse in-order walker. Construct it at the offset of the last
/// code unit you want to read; each `next` steps backwards.
pub struct ReverseTreeWalker<'a> {
    buffers: &'a BufferCollection,
    root: RedBlackTree,
    stack: WalkStack,
    total_offset: usize,
    text: &'a [CodeUnit],
    first: usize,
    last: usize,
}

impl<'a> ReverseTreeWalker<'a> {
    pub fn new<V: DocView>(view: &'a V) -> Self {
        Self::with_offset(view, 0)
    }

    pub fn with_offset<V: DocView>(view: &'a V, offset: usize) -> Self {
        let root = view.root().clone();
        let mut walker = Self {
            buffers: view.buffers(),
            root: root.clone(),
            stack: WalkStack::new(),
            total_offset: offset,
            text: &[],
            first: 0,
            last: 0,
        };
        walker.stack.push(StackEntry {
            node: root,
            dir: Direction::Right,
        });
        walker.fast_forward_to(offset);
        walker
    }

    /// The next code unit going backwards; `NUL` once exhausted.
    pub fn next(&mut self) -> CodeUnit {
        if self.first == self.last {
            self.populate_ptrs();
            if self.exhausted() {
                return NUL;
            }
            if self.first == self.last {
                return self.next();
            }
        }
        // The offset wraps below zero at the front of the document;
        // `remaining` accounts for it.
        self.total_offset = self.total_offset.wrapping_sub(1);
        // Pre-decrement: the unit read is the one before the cursor,
        // like an STL reverse iterator.
        self.first -= 1;
        self.text[self.first]
    }

    /// The next code unit without stepping; `NUL` once exhausted.
    pub fn current(&mut self) -> CodeUnit {
        if self.first == self.last {
            self.populate_ptrs();
            if self.exhausted() {
                return NUL;
            }
        }
        self.text[self.first - 1]
    }

    /// Restart traversal from `offset`.
    pub fn seek(&mut self, offset: usize) {
        self.stack.clear();
        self.stack.push(StackEntry {
            node: self.root.clone(),
            dir: Direction::Right,
        });
        self.first = 0;
        self.last = 0;
        self.total_offset = offset;
        self.fast_forward_to(offset);
    }

    pub fn exhausted(&self) -> bool {
        if self.stack.is_empty() {
            return true;
        }
        if self.first != self.last {
            return false;
        }
        if self.stack.len() > 1 {
            return false;
        }
        let entry = &self.stack[0];
        if entry.node.is_empty() {
            return true;
        }
        entry.dir == Direction::Left && entry.node.left().is_empty()
    }

    /// Code units left to read (towards the front).
    pub fn remaining(&self) -> usize {
        self.total_offset.wrapping_add(1)
    }

    /// Offset of the next code unit to be read.
    pub fn offset(&self) -> usize {
        self.total_offset
    }

    fn populate_ptrs(&mut self) {
        if self.exhausted() {
            return;
        }
        if self.stack.last().map_or(false, |entry| entry.node.is_empty()) {
            self.stack.pop();
            self.populate_ptrs();
            return;
        }

        let entry = self.stack.last_mut().expect("non-empty stack");
        match entry.dir {
            Direction::Right => {
                let right = entry.node.right();
                entry.dir = Direction::Center;
                if !right.is_empty() {
                    self.stack.push(StackEntry {
                        node: right,
                        dir: Direction::Right,
                    });
                }
                self.populate_ptrs();
            }
            Direction::Center => {
                let piece = entry.node.data().piece;
                entry.dir = Direction::Left;
                let buffers = self.buffers;
                let buffer = buffers.buffer_at(piece.index);
                self.text = &buffer.text;
                // The lower bound is `last`; reading walks `first`
                // down towards it.
                self.last = buffers.buffer_offset(piece.index, piece.first);
                self.first = buffers.buffer_offset(piece.index, piece.last);
            }
            Direction::Left => {
                let left = entry.node.left();
                self.stack.pop();
                self.stack.push(StackEntry {
                    node: left,
                    dir: Direction::Right,
                });
                self.populate_ptrs();
            }
        }
    }

    fn fast_forward_to(&mut self, mut offset: usize) {
        let buffers = self.buffers;
        let mut node = self.root.clone();
        while !node.is_empty() {
            let data = *node.data();
            if data.left_len > offset {
                debug_assert!(!self.stack.is_empty());
                // This frame's piece is entirely past the offset.
                self.stack.pop();
                node = node.left();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Right,
                });
            } else if data.left_len + data.piece.length > offset {
                // The offset is inside this piece.
                if let Some(entry) = self.stack.last_mut() {
                    entry.dir = Direction::Left;
                }
                offset -= data.left_len;
                let piece = data.piece;
                let buffer = buffers.buffer_at(piece.index);
                self.text = &buffer.text;
                let first_offset = buffers.buffer_offset(piece.index, piece.first);
                self.last = first_offset;
                // `offset` is where reading starts, and reads happen at
                // `first - 1`, so begin one past it.
                self.first = first_offset + offset + 1;
                return;
            } else {
                // For when we revisit this frame.
                if let Some(entry) = self.stack.last_mut() {
                    entry.dir = Direction::Center;
                }
                offset -= data.left_len + data.piece.length;
                node = node.right();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Right,
                });
            }
        }
    }
}
