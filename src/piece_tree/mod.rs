//! The piece tree: an editable document over immutable buffers
//!
//! A `PieceTree` is a piece table whose piece sequence lives in a
//! persistent red-black tree. Inserted text is appended to the mod
//! buffer and described by new pieces; removed text is never touched,
//! only the pieces covering it are rewritten. Because every edit
//! produces a fresh root that shares structure with the old one, undo
//! and redo are O(1) root swaps and snapshots are free to retain any
//! root they have seen.
//!
//! Offsets, lengths, and columns are measured in code units of the
//! configured encoding. Lines are 1-based; `0` is the "before any
//! line" sentinel and short-circuits every line query to an empty
//! result.

use std::fmt;
use std::sync::Arc;

use crate::buffer::{
    populate_line_starts, BufferCollection, BufferCursor, BufferIndex, CharBuffer, LineStarts,
    Piece,
};
use crate::code_unit::{decode, encode, CodeUnit, CR, LF, NUL};
use crate::history::{History, HistoryEntry};
use crate::tree::{NodeData, RedBlackTree};

mod snapshot;
mod walker;

pub use snapshot::{OwningSnapshot, RefSnapshot};
pub use walker::{ReverseTreeWalker, TreeWalker};

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

/// Tree-wide totals derived from the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferMeta {
    pub lf_count: usize,
    pub total_content_length: usize,
}

pub(crate) fn compute_buffer_meta(root: &RedBlackTree) -> BufferMeta {
    BufferMeta {
        lf_count: root.total_lf_count(),
        total_content_length: root.total_length(),
    }
}

/// Mutations record an undo entry by default; callers replaying or
/// batching edits can suppress that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressHistory {
    No,
    Yes,
}

impl SuppressHistory {
    fn is_no(self) -> bool {
        matches!(self, SuppressHistory::No)
    }
}

/// Whether a CRLF-aware line read ran out of text before seeing a
/// `\n`, meaning the line was the last one and had no terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteCrlf {
    No,
    Yes,
}

/// A half-open `[first, last)` range of document offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub first: usize,
    pub last: usize,
}

/// Outcome of `try_undo`/`try_redo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoRedoResult {
    pub success: bool,
    pub op_offset: usize,
}

/// Where an offset landed during descent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodePosition {
    pub piece: Piece,
    /// Offset of the hit, relative to the piece start.
    pub remainder: usize,
    /// Document offset where the piece begins.
    pub start_offset: usize,
    /// 1-based document line where the hit lands.
    pub line: usize,
}

// ---------- Offset descent ----------

/// Find the piece containing `off`. Offsets at or past the end resolve
/// to the rightmost piece with `remainder == piece.length`. `None` only
/// for an empty tree.
pub(crate) fn node_at(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    mut off: usize,
) -> Option<NodePosition> {
    let mut node = root.clone();
    let mut node_start_offset = 0usize;
    let mut newline_count = 0usize;
    while !node.is_empty() {
        let data = *node.data();
        if data.left_len > off {
            node = node.left();
        } else if data.left_len + data.piece.length > off {
            node_start_offset += data.left_len;
            newline_count += data.left_lf;
            let remainder = off - data.left_len;
            // buffer_position reports a line relative to the buffer, so
            // retract by the piece's starting line.
            let pos = buffer_position(buffers, &data.piece, remainder);
            newline_count += pos.line - data.piece.first.line;
            return Some(NodePosition {
                piece: data.piece,
                remainder,
                start_offset: node_start_offset,
                line: newline_count + 1,
            });
        } else {
            if node.right().is_empty() {
                // Ran off the right edge: report the end position.
                node_start_offset += data.left_len;
                newline_count += data.left_lf + data.piece.newline_count;
                return Some(NodePosition {
                    piece: data.piece,
                    remainder: data.piece.length,
                    start_offset: node_start_offset,
                    line: newline_count + 1,
                });
            }
            let offset_amount = data.left_len + data.piece.length;
            off -= offset_amount;
            node_start_offset += offset_amount;
            newline_count += data.left_lf + data.piece.newline_count;
            node = node.right();
        }
    }
    None
}

/// Convert a remainder within `piece` into a cursor in its backing
/// buffer, binary-searching the line starts over the piece's lines.
pub(crate) fn buffer_position(
    buffers: &BufferCollection,
    piece: &Piece,
    remainder: usize,
) -> BufferCursor {
    let starts = &buffers.buffer_at(piece.index).line_starts;
    let start_offset = starts[piece.first.line] + piece.first.column;
    let offset = start_offset + remainder;

    let mut low = piece.first.line;
    let mut high = piece.last.line;
    let mut mid = low;
    while low <= high {
        mid = low + (high - low) / 2;
        if mid == high {
            break;
        }
        let mid_start = starts[mid];
        let mid_stop = starts[mid + 1];
        if offset < mid_start {
            high = mid - 1;
        } else if offset >= mid_stop {
            low = mid + 1;
        } else {
            break;
        }
    }

    BufferCursor {
        line: mid,
        column: offset - starts[mid],
    }
}

/// The code unit at a document offset, or `NUL` past the end.
pub(crate) fn char_at(buffers: &BufferCollection, root: &RedBlackTree, offset: usize) -> CodeUnit {
    let Some(pos) = node_at(buffers, root, offset) else {
        return NUL;
    };
    if pos.remainder == pos.piece.length {
        // Snapped to the end sentinel.
        return NUL;
    }
    let buffer = buffers.buffer_at(pos.piece.index);
    let first = buffers.buffer_offset(pos.piece.index, pos.piece.first);
    buffer.text[first + pos.remainder]
}

/// Line feeds between two canonical cursors in one buffer. Line starts
/// record exactly the positions after each `\n`, so the delta is the
/// count.
pub(crate) fn line_feed_count(start: &BufferCursor, end: &BufferCursor) -> usize {
    end.line - start.line
}

// ---------- Per-piece line accumulation ----------

type Accumulator = fn(&BufferCollection, &Piece, usize) -> usize;

/// Code units from the piece start through the end of its `index`-th
/// line (0-based within the piece), newline included; clamped to the
/// piece end.
pub(crate) fn accumulate_value(buffers: &BufferCollection, piece: &Piece, index: usize) -> usize {
    let buffer = buffers.buffer_at(piece.index);
    let starts = &buffer.line_starts;
    let expected_start = piece.first.line + index + 1;
    let first = starts[piece.first.line] + piece.first.column;
    if expected_start > piece.last.line {
        let last = starts[piece.last.line] + piece.last.column;
        return last - first;
    }
    starts[expected_start] - first
}

/// Like `accumulate_value` but excludes the terminating `\n` when one
/// is included.
pub(crate) fn accumulate_value_no_lf(
    buffers: &BufferCollection,
    piece: &Piece,
    index: usize,
) -> usize {
    let buffer = buffers.buffer_at(piece.index);
    let starts = &buffer.line_starts;
    let expected_start = piece.first.line + index + 1;
    let first = starts[piece.first.line] + piece.first.column;
    let last = if expected_start > piece.last.line {
        starts[piece.last.line] + piece.last.column
    } else {
        starts[expected_start]
    };
    if last == first {
        return 0;
    }
    if buffer.text[last - 1] == LF {
        return last - 1 - first;
    }
    last - first
}

/// Accumulate into `offset` the document offset where `line` starts
/// (with `accumulate_value`) or ends (with `accumulate_value_no_lf`,
/// passing the following line).
pub(crate) fn line_start(
    offset: &mut usize,
    buffers: &BufferCollection,
    node: &RedBlackTree,
    line: usize,
    accumulate: Accumulator,
) {
    if node.is_empty() {
        return;
    }
    debug_assert!(line != 0);
    let data = node.data();
    let mut line_index = line - 1;
    if data.left_lf >= line_index {
        line_start(offset, buffers, &node.left(), line, accumulate);
    } else if data.left_lf + data.piece.newline_count >= line_index {
        // The desired line starts inside this piece.
        line_index -= data.left_lf;
        let mut len = data.left_len;
        if line_index != 0 {
            len += accumulate(buffers, &data.piece, line_index - 1);
        }
        *offset += len;
    } else {
        line_index -= data.left_lf + data.piece.newline_count;
        *offset += data.left_len + data.piece.length;
        line_start(offset, buffers, &node.right(), line_index + 1, accumulate);
    }
}

/// Like `line_start` with `accumulate_value_no_lf`, additionally
/// retracting over a terminating `\r\n`. The `\r` and `\n` can live in
/// different pieces, so the check reads through the whole tree.
pub(crate) fn line_end_crlf(
    offset: &mut usize,
    buffers: &BufferCollection,
    root: &RedBlackTree,
    node: &RedBlackTree,
    line: usize,
) {
    if node.is_empty() {
        return;
    }
    debug_assert!(line != 0);
    let data = node.data();
    let mut line_index = line - 1;
    if data.left_lf >= line_index {
        line_end_crlf(offset, buffers, root, &node.left(), line);
    } else if data.left_lf + data.piece.newline_count >= line_index {
        line_index -= data.left_lf;
        let mut len = data.left_len;
        if line_index != 0 {
            len += accumulate_value_no_lf(buffers, &data.piece, line_index - 1);
        }
        if len != 0 {
            let last_char_offset = *offset + len - 1;
            if char_at(buffers, root, last_char_offset) == CR
                && char_at(buffers, root, last_char_offset + 1) == LF
            {
                len -= 1;
            }
        }
        *offset += len;
    } else {
        line_index -= data.left_lf + data.piece.newline_count;
        *offset += data.left_len + data.piece.length;
        line_end_crlf(offset, buffers, root, &node.right(), line_index + 1);
    }
}

// ---------- Piece trimming ----------

/// Shrink `piece` from the right so it ends at `pos`.
pub(crate) fn trim_piece_right(
    buffers: &BufferCollection,
    piece: &Piece,
    pos: BufferCursor,
) -> Piece {
    let orig_end = buffers.buffer_offset(piece.index, piece.last);
    let new_end = buffers.buffer_offset(piece.index, pos);
    Piece {
        last: pos,
        newline_count: line_feed_count(&piece.first, &pos),
        length: piece.length - (orig_end - new_end),
        ..*piece
    }
}

/// Shrink `piece` from the left so it starts at `pos`.
pub(crate) fn trim_piece_left(
    buffers: &BufferCollection,
    piece: &Piece,
    pos: BufferCursor,
) -> Piece {
    let orig_start = buffers.buffer_offset(piece.index, piece.first);
    let new_start = buffers.buffer_offset(piece.index, pos);
    Piece {
        first: pos,
        newline_count: line_feed_count(&pos, &piece.last),
        length: piece.length - (new_start - orig_start),
        ..*piece
    }
}

// ---------- Read-only view ----------

/// The read-only query surface shared by the tree and both snapshot
/// kinds. Implementors supply the backing pieces; the queries are
/// provided.
pub trait DocView: Sized {
    fn buffers(&self) -> &BufferCollection;
    fn root(&self) -> &RedBlackTree;
    fn meta(&self) -> BufferMeta;

    fn is_empty(&self) -> bool {
        self.meta().total_content_length == 0
    }

    /// Number of lines; an empty document has one.
    fn line_count(&self) -> usize {
        self.meta().lf_count + 1
    }

    /// 1-based line containing `offset`, or 0 for an empty document.
    fn line_at(&self, offset: usize) -> usize {
        if self.is_empty() {
            return 0;
        }
        match node_at(self.buffers(), self.root(), offset) {
            Some(pos) => pos.line,
            None => 0,
        }
    }

    /// Content of `line` including its trailing `\n` if present.
    fn get_line_content(&self, line: usize) -> Vec<CodeUnit> {
        let mut buf = Vec::new();
        if line == 0 || self.root().is_empty() {
            return buf;
        }
        let mut line_offset = 0;
        line_start(
            &mut line_offset,
            self.buffers(),
            self.root(),
            line,
            accumulate_value,
        );
        let mut walker = TreeWalker::with_offset(self, line_offset);
        while !walker.exhausted() {
            let unit = walker.next();
            buf.push(unit);
            if unit == LF {
                break;
            }
        }
        buf
    }

    /// Content of `line` with a terminating `\r\n` pair or bare `\n`
    /// stripped. A lone `\r` not followed by `\n` is kept. The flag is
    /// `Yes` when the walk hit end-of-text before any `\n`.
    fn get_line_content_crlf(&self, line: usize) -> (Vec<CodeUnit>, IncompleteCrlf) {
        let mut buf = Vec::new();
        if line == 0 || self.root().is_empty() {
            return (buf, IncompleteCrlf::No);
        }
        let mut line_offset = 0;
        line_start(
            &mut line_offset,
            self.buffers(),
            self.root(),
            line,
            accumulate_value,
        );
        let mut walker = TreeWalker::with_offset(self, line_offset);
        let mut prev = NUL;
        while !walker.exhausted() {
            let unit = walker.next();
            if unit == LF {
                if prev == CR {
                    buf.pop();
                }
                return (buf, IncompleteCrlf::No);
            }
            buf.push(unit);
            prev = unit;
        }
        (buf, IncompleteCrlf::Yes)
    }

    /// `[first, last)` where `last` stops just before the line's `\n`.
    fn get_line_range(&self, line: usize) -> LineRange {
        if line == 0 {
            return LineRange { first: 0, last: 0 };
        }
        let mut first = 0;
        line_start(&mut first, self.buffers(), self.root(), line, accumulate_value);
        let mut last = 0;
        line_start(
            &mut last,
            self.buffers(),
            self.root(),
            line + 1,
            accumulate_value_no_lf,
        );
        LineRange { first, last }
    }

    /// Like `get_line_range`, additionally retracting over a final
    /// `\r\n` pair.
    fn get_line_range_crlf(&self, line: usize) -> LineRange {
        if line == 0 {
            return LineRange { first: 0, last: 0 };
        }
        let mut first = 0;
        line_start(&mut first, self.buffers(), self.root(), line, accumulate_value);
        let mut last = 0;
        line_end_crlf(&mut last, self.buffers(), self.root(), self.root(), line + 1);
        LineRange { first, last }
    }

    /// `[first, last)` where `last` is the start of the next line, so
    /// the `\n` is included.
    fn get_line_range_with_newline(&self, line: usize) -> LineRange {
        if line == 0 {
            return LineRange { first: 0, last: 0 };
        }
        let mut first = 0;
        line_start(&mut first, self.buffers(), self.root(), line, accumulate_value);
        let mut last = 0;
        line_start(
            &mut last,
            self.buffers(),
            self.root(),
            line + 1,
            accumulate_value,
        );
        LineRange { first, last }
    }

    /// The whole document, assembled in order.
    fn content(&self) -> Vec<CodeUnit> {
        let mut out = Vec::with_capacity(self.meta().total_content_length);
        let mut walker = TreeWalker::new(self);
        while !walker.exhausted() {
            out.push(walker.next());
        }
        out
    }
}

// ---------- The tree itself ----------

/// An editable document. See the module docs.
#[derive(Debug, Clone)]
pub struct PieceTree {
    buffers: BufferCollection,
    root: RedBlackTree,
    meta: BufferMeta,
    history: History,
    scratch_starts: LineStarts,
    /// Mod-buffer cursor just past the most recent insert.
    last_insert: BufferCursor,
    /// Document offset just past the most recent insert; `None` means
    /// no coalescing run is active.
    end_last_insert: Option<usize>,
}

impl Default for PieceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceTree {
    /// An empty document.
    pub fn new() -> Self {
        Self::from_buffers(Vec::new())
    }

    pub(crate) fn from_buffers(orig_buffers: Vec<Arc<CharBuffer>>) -> Self {
        let buffers = BufferCollection::new(orig_buffers);
        let mut root = RedBlackTree::new();
        let mut offset = 0;
        for (i, buf) in buffers.orig_buffers.iter().enumerate() {
            debug_assert!(!buf.line_starts.is_empty());
            // An empty original buffer needs no piece at all.
            if buf.text.is_empty() {
                continue;
            }
            let last_line = buf.line_starts.len() - 1;
            let piece = Piece {
                index: BufferIndex::Original(i),
                first: BufferCursor::default(),
                last: BufferCursor::new(last_line, buf.text.len() - buf.line_starts[last_line]),
                length: buf.text.len(),
                newline_count: last_line,
            };
            root = root.insert(NodeData::new(piece), offset);
            offset += piece.length;
        }
        let meta = compute_buffer_meta(&root);
        Self {
            buffers,
            root,
            meta,
            history: History::new(),
            scratch_starts: LineStarts::new(),
            last_insert: BufferCursor::default(),
            end_last_insert: None,
        }
    }

    /// Total number of code units.
    pub fn length(&self) -> usize {
        self.meta.total_content_length
    }

    /// Total number of `\n` units.
    pub fn line_feed_count(&self) -> usize {
        self.meta.lf_count
    }

    /// The code unit at `offset`, or `NUL` past the end.
    pub fn at(&self, offset: usize) -> CodeUnit {
        char_at(&self.buffers, &self.root, offset)
    }

    // ---------- Mutation ----------

    /// Insert `txt` at `offset` (clamped to the end). Empty text is a
    /// no-op and records no history.
    pub fn insert(&mut self, offset: usize, txt: &[CodeUnit], suppress_history: SuppressHistory) {
        if txt.is_empty() {
            return;
        }
        let offset = offset.min(self.length());
        // A run of inserts continuing at the previous end point shares
        // one undo entry.
        if suppress_history.is_no()
            && (self.end_last_insert != Some(offset) || self.root.is_empty())
        {
            self.history.commit(HistoryEntry {
                root: self.root.clone(),
                op_offset: offset,
            });
        }
        self.internal_insert(offset, txt);
    }

    /// Remove `count` units starting at `offset`, clamped to the end.
    pub fn remove(&mut self, offset: usize, count: usize, suppress_history: SuppressHistory) {
        if count == 0 || self.root.is_empty() || offset >= self.length() {
            return;
        }
        let count = count.min(self.length() - offset);
        if suppress_history.is_no() {
            self.history.commit(HistoryEntry {
                root: self.root.clone(),
                op_offset: offset,
            });
        }
        self.internal_remove(offset, count);
    }

    // ---------- History ----------

    /// Swap the current root for the most recent undo entry. Returns
    /// `(false, 0)` when there is nothing to undo.
    pub fn try_undo(&mut self, op_offset: usize) -> UndoRedoResult {
        let current = HistoryEntry {
            root: self.root.clone(),
            op_offset,
        };
        match self.history.try_undo(current) {
            None => UndoRedoResult {
                success: false,
                op_offset: 0,
            },
            Some(entry) => {
                self.root = entry.root;
                // Any undo ends the active coalescing run.
                self.end_last_insert = None;
                self.compute_buffer_meta();
                UndoRedoResult {
                    success: true,
                    op_offset: entry.op_offset,
                }
            }
        }
    }

    /// Swap the current root for the most recent redo entry.
    pub fn try_redo(&mut self, op_offset: usize) -> UndoRedoResult {
        let current = HistoryEntry {
            root: self.root.clone(),
            op_offset,
        };
        match self.history.try_redo(current) {
            None => UndoRedoResult {
                success: false,
                op_offset: 0,
            },
            Some(entry) => {
                self.root = entry.root;
                self.end_last_insert = None;
                self.compute_buffer_meta();
                UndoRedoResult {
                    success: true,
                    op_offset: entry.op_offset,
                }
            }
        }
    }

    /// Record the current root as an explicit undo checkpoint.
    pub fn commit_head(&mut self, offset: usize) {
        self.history.commit(HistoryEntry {
            root: self.root.clone(),
            op_offset: offset,
        });
    }

    /// The current root.
    pub fn head(&self) -> RedBlackTree {
        self.root.clone()
    }

    /// Install a previously observed root. The root must derive from
    /// this tree's buffers.
    pub fn snap_to(&mut self, root: RedBlackTree) {
        self.root = root;
        self.end_last_insert = None;
        self.compute_buffer_meta();
    }

    // ---------- Snapshots ----------

    /// A snapshot owning its buffer data; survives this tree.
    pub fn owning_snap(&self) -> OwningSnapshot {
        OwningSnapshot::new(self)
    }

    /// A snapshot of a previously observed root.
    pub fn owning_snap_at(&self, root: RedBlackTree) -> OwningSnapshot {
        OwningSnapshot::with_root(self, root)
    }

    /// A snapshot borrowing this tree's buffers.
    pub fn ref_snap(&self) -> RefSnapshot<'_> {
        RefSnapshot::new(self)
    }

    /// A borrowing snapshot of a previously observed root.
    pub fn ref_snap_at(&self, root: RedBlackTree) -> RefSnapshot<'_> {
        RefSnapshot::with_root(self, root)
    }

    // ---------- Internals ----------

    fn compute_buffer_meta(&mut self) {
        self.meta = compute_buffer_meta(&self.root);
    }

    fn internal_insert(&mut self, offset: usize, txt: &[CodeUnit]) {
        debug_assert!(!txt.is_empty());
        self.end_last_insert = Some(offset + txt.len());
        self.insert_impl(offset, txt);
        self.compute_buffer_meta();
        #[cfg(debug_assertions)]
        self.root.check_invariants();
    }

    fn insert_impl(&mut self, offset: usize, txt: &[CodeUnit]) {
        if self.root.is_empty() {
            let piece = self.build_piece(txt);
            self.root = self.root.insert(NodeData::new(piece), 0);
            return;
        }

        let result = node_at(&self.buffers, &self.root, offset).expect("tree is not empty");
        let NodePosition {
            piece,
            remainder,
            start_offset,
            ..
        } = result;

        // Case 1: inserting at a node's start boundary. If the previous
        // node ends at the mod-buffer write cursor, extend it in place
        // instead of adding a piece.
        if start_offset == offset {
            if offset != 0 {
                let prev =
                    node_at(&self.buffers, &self.root, offset - 1).expect("tree is not empty");
                if prev.piece.index == BufferIndex::Mod && prev.piece.last == self.last_insert {
                    let new_piece = self.build_piece(txt);
                    self.combine_pieces(&prev, new_piece);
                    return;
                }
            }
            let piece = self.build_piece(txt);
            self.root = self.root.insert(NodeData::new(piece), offset);
            return;
        }

        let inside_node = offset < start_offset + piece.length;

        // Case 2: inserting at this node's end boundary, with the same
        // coalescing opportunity.
        if !inside_node {
            if piece.index == BufferIndex::Mod && piece.last == self.last_insert {
                let new_piece = self.build_piece(txt);
                self.combine_pieces(&result, new_piece);
                return;
            }
            let new_piece = self.build_piece(txt);
            self.root = self.root.insert(NodeData::new(new_piece), offset);
            return;
        }

        // Case 3: strictly inside the node. Split it and insert the new
        // piece between the halves.
        let insert_pos = buffer_position(&self.buffers, &piece, remainder);
        let new_piece_right = Piece {
            first: insert_pos,
            length: self.buffers.buffer_offset(piece.index, piece.last)
                - self.buffers.buffer_offset(piece.index, insert_pos),
            newline_count: line_feed_count(&insert_pos, &piece.last),
            ..piece
        };
        let new_piece_left = trim_piece_right(&self.buffers, &piece, insert_pos);
        let new_piece = self.build_piece(txt);

        self.root = self.root.remove(start_offset);
        let mut at = start_offset;
        self.root = self.root.insert(NodeData::new(new_piece_left), at);
        at += new_piece_left.length;
        self.root = self.root.insert(NodeData::new(new_piece), at);
        at += new_piece.length;
        self.root = self.root.insert(NodeData::new(new_piece_right), at);
    }

    fn internal_remove(&mut self, offset: usize, count: usize) {
        debug_assert!(count != 0 && !self.root.is_empty());
        self.remove_impl(offset, count);
        self.compute_buffer_meta();
        #[cfg(debug_assertions)]
        self.root.check_invariants();
    }

    fn remove_impl(&mut self, offset: usize, count: usize) {
        let first = node_at(&self.buffers, &self.root, offset).expect("tree is not empty");
        let last = node_at(&self.buffers, &self.root, offset + count).expect("tree is not empty");

        let start_split_pos = buffer_position(&self.buffers, &first.piece, first.remainder);

        // The whole range lives inside one node.
        if first.start_offset == last.start_offset {
            let end_split_pos = buffer_position(&self.buffers, &first.piece, last.remainder);
            if first.start_offset == offset {
                // Delete the entire node.
                if count == first.piece.length {
                    self.root = self.root.remove(first.start_offset);
                    return;
                }
                // Trim from the left.
                let new_piece = trim_piece_left(&self.buffers, &first.piece, end_split_pos);
                self.root = self
                    .root
                    .remove(first.start_offset)
                    .insert(NodeData::new(new_piece), first.start_offset);
                return;
            }

            // Trim from the right.
            if first.start_offset + first.piece.length == offset + count {
                let new_piece = trim_piece_right(&self.buffers, &first.piece, start_split_pos);
                self.root = self
                    .root
                    .remove(first.start_offset)
                    .insert(NodeData::new(new_piece), first.start_offset);
                return;
            }

            // The range is in the middle: keep both trimmed halves.
            // The right half goes in first so the left half lands to
            // its left.
            let left = trim_piece_right(&self.buffers, &first.piece, start_split_pos);
            let right = trim_piece_left(&self.buffers, &first.piece, end_split_pos);
            self.root = self
                .root
                .remove(first.start_offset)
                .insert(NodeData::new(right), first.start_offset)
                .insert(NodeData::new(left), first.start_offset);
            return;
        }

        // The range spans nodes: trim the first piece's right side and
        // the last piece's left side, drop everything in between, then
        // re-insert the survivors (last first, so first ends up left).
        let new_first = trim_piece_right(&self.buffers, &first.piece, start_split_pos);
        let end_split_pos = buffer_position(&self.buffers, &last.piece, last.remainder);
        let new_last = trim_piece_left(&self.buffers, &last.piece, end_split_pos);
        self.remove_node_range(&first, count);

        // When the range ends exactly at the last node's start, that
        // node was never part of the range; skip the duplicate.
        if last.remainder != 0 && new_last.length != 0 {
            self.root = self
                .root
                .insert(NodeData::new(new_last), first.start_offset);
        }
        if new_first.length != 0 {
            self.root = self
                .root
                .insert(NodeData::new(new_first), first.start_offset);
        }
    }

    /// Remove whole pieces starting at `first` until `count` units
    /// (measured from the cut point) are gone.
    fn remove_node_range(&mut self, first: &NodePosition, count: usize) {
        // `count` starts at the cut inside the first piece; extend it
        // to the piece start so whole piece lengths can be counted
        // against it.
        let length = count + first.remainder;
        let delete_at_offset = first.start_offset;
        let mut deleted_len = 0;
        let mut cur = Some(*first);
        while deleted_len < length {
            let Some(pos) = cur else { break };
            deleted_len += pos.piece.length;
            self.root = self.root.remove(delete_at_offset);
            cur = node_at(&self.buffers, &self.root, delete_at_offset);
        }
    }

    /// Append `txt` to the mod buffer and return the piece describing
    /// it. Extends the mod buffer's line starts (minus the mandatory
    /// leading 0) and advances `last_insert`.
    fn build_piece(&mut self, txt: &[CodeUnit]) -> Piece {
        let start_offset = self.buffers.mod_buffer.text.len();
        populate_line_starts(&mut self.scratch_starts, txt);
        let start = self.last_insert;

        let mod_buffer = &mut self.buffers.mod_buffer;
        mod_buffer
            .line_starts
            .reserve(self.scratch_starts.len().saturating_sub(1));
        for &new_start in &self.scratch_starts[1..] {
            mod_buffer.line_starts.push(new_start + start_offset);
        }
        mod_buffer.text.extend_from_slice(txt);

        let end_offset = mod_buffer.text.len();
        let end_index = mod_buffer.line_starts.len() - 1;
        let end_col = end_offset - mod_buffer.line_starts[end_index];
        let end_pos = BufferCursor::new(end_index, end_col);
        let piece = Piece {
            index: BufferIndex::Mod,
            first: start,
            last: end_pos,
            length: end_offset - start_offset,
            newline_count: line_feed_count(&start, &end_pos),
        };
        self.last_insert = end_pos;
        piece
    }

    /// Merge a freshly built mod-buffer piece into the piece that ends
    /// where it begins.
    fn combine_pieces(&mut self, existing: &NodePosition, mut new_piece: Piece) {
        debug_assert!(existing.piece.index == BufferIndex::Mod);
        debug_assert!(existing.piece.last == new_piece.first);
        let old_piece = existing.piece;
        new_piece.first = old_piece.first;
        new_piece.newline_count += old_piece.newline_count;
        new_piece.length += old_piece.length;
        self.root = self
            .root
            .remove(existing.start_offset)
            .insert(NodeData::new(new_piece), existing.start_offset);
    }
}

impl DocView for PieceTree {
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

impl fmt::Display for PieceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", decode(&self.content()))
    }
}

// ---------- Builder ----------

/// Collects original buffers, then finalizes them into a `PieceTree`.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    buffers: Vec<Arc<CharBuffer>>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue one immutable original buffer. Empty buffers are
    /// accepted but produce no piece.
    pub fn accept(&mut self, text: &[CodeUnit]) {
        self.buffers.push(Arc::new(CharBuffer::new(text.to_vec())));
    }

    /// Convenience: encode and accept a string chunk.
    pub fn accept_str(&mut self, text: &str) {
        self.accept(&encode(text));
    }

    /// Finalize into a tree; ownership of the buffers transfers.
    pub fn create(self) -> PieceTree {
        PieceTree::from_buffers(self.buffers)
    }
}
