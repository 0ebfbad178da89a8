//! vellum: a persistent piece-tree text buffer
//!
//! A piece table whose piece sequence lives in a functionally-immutable
//! red-black tree. Edits allocate new nodes along one root-to-leaf path
//! and share the rest, so every previously observed root stays valid:
//! undo/redo are O(1) root swaps and snapshots are free. Per-node
//! left-subtree length and line-feed counts give O(log n) offset and
//! line queries.
//!
//! ```
//! use vellum::{DocView, PieceTree, SuppressHistory};
//! use vellum::code_unit::{decode, encode};
//!
//! let mut tree = PieceTree::new();
//! tree.insert(0, &encode("hello\nworld"), SuppressHistory::No);
//! assert_eq!(tree.line_count(), 2);
//! assert_eq!(decode(&tree.get_line_content(2)), "world");
//!
//! let snap = tree.owning_snap();
//! tree.remove(0, 6, SuppressHistory::No);
//! assert_eq!(tree.to_string(), "world");
//! assert_eq!(decode(&snap.content()), "hello\nworld");
//!
//! tree.try_undo(0);
//! assert_eq!(tree.to_string(), "hello\nworld");
//! ```

pub mod buffer;
pub mod code_unit;
pub mod error;
pub mod history;
pub mod io;
pub mod piece_tree;
pub mod tree;

pub use crate::buffer::{BufferCursor, BufferIndex, Piece};
pub use crate::code_unit::CodeUnit;
pub use crate::error::{BufferError, ErrorKind};
pub use crate::history::{History, HistoryEntry};
pub use crate::io::load_from_path;
pub use crate::piece_tree::{
    BufferMeta, DocView, IncompleteCrlf, LineRange, OwningSnapshot, PieceTree, RefSnapshot,
    ReverseTreeWalker, SuppressHistory, TreeBuilder, TreeWalker, UndoRedoResult,
};
pub use crate::tree::RedBlackTree;
