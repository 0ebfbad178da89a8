use super::*;
use crate::buffer::{BufferCursor, BufferIndex, Piece};
use crate::tree::NodeData;

fn root_with_len(len: usize) -> RedBlackTree {
    let piece = Piece {
        index: BufferIndex::Original(0),
        first: BufferCursor::default(),
        last: BufferCursor::default(),
        length: len,
        newline_count: 0,
    };
    RedBlackTree::new().insert(NodeData::new(piece), 0)
}

fn entry(len: usize, op_offset: usize) -> HistoryEntry {
    HistoryEntry {
        root: root_with_len(len),
        op_offset,
    }
}

#[test]
fn undo_empty_returns_none_and_saves_nothing() {
    let mut history = History::new();
    assert!(history.try_undo(entry(1, 0)).is_none());
    assert!(!history.can_redo());
}

#[test]
fn undo_then_redo_round_trip() {
    let mut history = History::new();
    history.commit(entry(1, 5));
    assert!(history.can_undo());

    let undone = history.try_undo(entry(2, 9)).unwrap();
    assert_eq!(undone.op_offset, 5);
    assert_eq!(undone.root.total_length(), 1);
    assert!(history.can_redo());
    assert!(!history.can_undo());

    let redone = history.try_redo(entry(1, 5)).unwrap();
    assert_eq!(redone.op_offset, 9);
    assert_eq!(redone.root.total_length(), 2);
    assert!(history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn commit_clears_redo() {
    let mut history = History::new();
    history.commit(entry(1, 0));
    history.try_undo(entry(2, 1)).unwrap();
    assert!(history.can_redo());

    history.commit(entry(3, 2));
    assert!(!history.can_redo());
    assert!(history.can_undo());
}

#[test]
fn stacks_are_lifo() {
    let mut history = History::new();
    history.commit(entry(1, 10));
    history.commit(entry(2, 20));
    history.commit(entry(3, 30));

    assert_eq!(history.try_undo(entry(4, 40)).unwrap().op_offset, 30);
    assert_eq!(history.try_undo(entry(3, 30)).unwrap().op_offset, 20);
    assert_eq!(history.try_redo(entry(2, 20)).unwrap().op_offset, 30);
}
