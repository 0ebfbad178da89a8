use super::*;
use crate::code_unit::decode;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn ins(tree: &mut PieceTree, offset: usize, text: &str) {
    tree.insert(offset, &encode(text), SuppressHistory::No);
}

fn rm(tree: &mut PieceTree, offset: usize, count: usize) {
    tree.remove(offset, count, SuppressHistory::No);
}

fn text(view: &impl DocView) -> String {
    decode(&view.content())
}

fn line(view: &impl DocView, n: usize) -> String {
    decode(&view.get_line_content(n))
}

fn line_crlf(view: &impl DocView, n: usize) -> (String, IncompleteCrlf) {
    let (units, incomplete) = view.get_line_content_crlf(n);
    (decode(&units), incomplete)
}

fn piece_count(tree: &crate::tree::RedBlackTree) -> usize {
    if tree.is_empty() {
        0
    } else {
        1 + piece_count(&tree.left()) + piece_count(&tree.right())
    }
}

fn reverse_text(tree: &PieceTree) -> String {
    if tree.is_empty() {
        return String::new();
    }
    let mut walker = ReverseTreeWalker::with_offset(tree, tree.length() - 1);
    let mut units = Vec::new();
    while !walker.exhausted() {
        units.push(walker.next());
    }
    decode(&units)
}

// ---------- Construction ----------

#[test]
fn empty_tree() {
    let tree = PieceTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.length(), 0);
    assert_eq!(tree.line_feed_count(), 0);
    assert_eq!(tree.line_count(), 1);
    assert_eq!(tree.line_at(0), 0);
    assert_eq!(tree.at(0), NUL);
    assert_eq!(text(&tree), "");
}

#[test]
fn build_from_two_original_buffers() {
    let mut builder = TreeBuilder::new();
    builder.accept_str("foo\n");
    builder.accept_str("bar");
    let tree = builder.create();

    assert_eq!(tree.length(), 7);
    assert_eq!(tree.line_count(), 2);
    assert_eq!(tree.at(3), LF);
    assert_eq!(tree.line_at(4), 2);
    assert_eq!(line(&tree, 2), "bar");
    assert_eq!(text(&tree), "foo\nbar");
}

#[test]
fn builder_skips_empty_buffers() {
    let mut builder = TreeBuilder::new();
    builder.accept_str("");
    builder.accept_str("xyz");
    builder.accept_str("");
    let tree = builder.create();
    assert_eq!(text(&tree), "xyz");
    assert_eq!(piece_count(&tree.head()), 1);
}

// ---------- Concrete edit scenarios ----------

#[test]
fn insert_into_empty_and_query_lines() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "hello\nworld");

    assert_eq!(tree.length(), 11);
    assert_eq!(tree.line_count(), 2);
    assert_eq!(line(&tree, 1), "hello\n");
    assert_eq!(line(&tree, 2), "world");
    assert_eq!(line_crlf(&tree, 1), ("hello".to_string(), IncompleteCrlf::No));
    // The last line has no terminator at all.
    assert_eq!(line_crlf(&tree, 2), ("world".to_string(), IncompleteCrlf::Yes));
}

#[test]
fn insert_cr_before_lf() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "hello\nworld");
    ins(&mut tree, 5, "\r");

    assert_eq!(line(&tree, 1), "hello\r\n");
    assert_eq!(line_crlf(&tree, 1), ("hello".to_string(), IncompleteCrlf::No));
    let range = tree.get_line_range_crlf(1);
    assert_eq!(range.last - range.first, 5);
}

#[test]
fn remove_newline_joins_lines() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "hello\nworld");
    rm(&mut tree, 5, 1);

    assert_eq!(text(&tree), "helloworld");
    assert_eq!(tree.line_count(), 1);
}

#[test]
fn typing_coalesces_into_one_piece() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "a");
    ins(&mut tree, 1, "b");
    ins(&mut tree, 2, "c");

    assert_eq!(text(&tree), "abc");
    assert_eq!(piece_count(&tree.head()), 1);

    // All three inserts shared one history boundary.
    let result = tree.try_undo(0);
    assert!(result.success);
    assert!(tree.is_empty());
}

#[test]
fn undo_redo_restores_each_state() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "ab");
    ins(&mut tree, 2, "cd");
    ins(&mut tree, 1, "X");
    assert_eq!(text(&tree), "aXbcd");

    // "cd" continued the typing run of "ab", so they share one entry.
    assert!(tree.try_undo(0).success);
    assert_eq!(text(&tree), "abcd");
    assert!(tree.try_undo(0).success);
    assert_eq!(text(&tree), "");
    assert!(!tree.try_undo(0).success);

    assert!(tree.try_redo(0).success);
    assert_eq!(text(&tree), "abcd");
    assert!(tree.try_redo(0).success);
    assert_eq!(text(&tree), "aXbcd");
    assert!(!tree.try_redo(0).success);
}

// ---------- Boundary behaviors ----------

#[test]
fn append_at_length() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "abc");
    ins(&mut tree, 3, "def");
    assert_eq!(text(&tree), "abcdef");
}

#[test]
fn insert_past_end_clamps() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "abc");
    ins(&mut tree, 999, "!");
    assert_eq!(text(&tree), "abc!");
}

#[test]
fn insert_empty_is_a_noop_without_history() {
    let mut tree = PieceTree::new();
    tree.insert(0, &[], SuppressHistory::No);
    assert!(tree.is_empty());
    assert!(!tree.try_undo(0).success);
}

#[test]
fn remove_zero_or_out_of_range_is_a_noop() {
    let mut tree = PieceTree::new();
    rm(&mut tree, 0, 5);
    assert!(tree.is_empty());

    ins(&mut tree, 0, "abc");
    rm(&mut tree, 1, 0);
    rm(&mut tree, 3, 4);
    assert_eq!(text(&tree), "abc");
}

#[test]
fn remove_past_end_clamps() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "abcdef");
    rm(&mut tree, 4, 100);
    assert_eq!(text(&tree), "abcd");
}

#[test]
fn remove_full_length_empties_the_tree() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "one\ntwo\nthree");
    let full = tree.length();
    rm(&mut tree, 0, full);
    assert!(tree.is_empty());
    assert_eq!(tree.line_count(), 1);
    assert_eq!(text(&tree), "");
}

#[test]
fn remove_spanning_multiple_pieces() {
    let mut tree = PieceTree::new();
    // Three separate pieces: inserting at the front prevents coalescing.
    ins(&mut tree, 0, "baz");
    ins(&mut tree, 0, "bar\n");
    ins(&mut tree, 0, "foo\n");
    assert_eq!(text(&tree), "foo\nbar\nbaz");
    assert!(piece_count(&tree.head()) >= 3);

    // Delete "o\nbar\n" across all three boundaries.
    rm(&mut tree, 2, 6);
    assert_eq!(text(&tree), "fobaz");
    assert_eq!(tree.line_count(), 1);
}

#[test]
fn at_returns_nul_past_end() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "xy");
    assert_eq!(tree.at(0), encode("x")[0]);
    assert_eq!(tree.at(1), encode("y")[0]);
    assert_eq!(tree.at(2), NUL);
    assert_eq!(tree.at(100), NUL);
}

#[test]
fn line_queries_with_zero_line_are_empty() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "abc\ndef");
    assert!(tree.get_line_content(0).is_empty());
    assert_eq!(line_crlf(&tree, 0), (String::new(), IncompleteCrlf::No));
    assert_eq!(tree.get_line_range(0), LineRange { first: 0, last: 0 });
}

// ---------- Line ranges ----------

#[test]
fn line_ranges() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "hello\nworld");

    assert_eq!(tree.get_line_range(1), LineRange { first: 0, last: 5 });
    assert_eq!(
        tree.get_line_range_with_newline(1),
        LineRange { first: 0, last: 6 }
    );
    assert_eq!(tree.get_line_range(2), LineRange { first: 6, last: 11 });
    assert_eq!(
        tree.get_line_range_with_newline(2),
        LineRange { first: 6, last: 11 }
    );
}

#[test]
fn line_ranges_with_trailing_newline() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "a\nb\n");
    assert_eq!(tree.line_count(), 3);
    assert_eq!(tree.get_line_range(2), LineRange { first: 2, last: 3 });
    // The trailing empty line.
    assert_eq!(tree.get_line_range(3), LineRange { first: 4, last: 4 });
}

#[test]
fn crlf_straddling_pieces() {
    let mut tree = PieceTree::new();
    // Build "abc\r" and "\ndef" as separate pieces; the \r\n pair spans
    // the piece boundary.
    ins(&mut tree, 0, "\ndef");
    ins(&mut tree, 0, "abc\r");
    assert_eq!(text(&tree), "abc\r\ndef");
    assert!(piece_count(&tree.head()) >= 2);

    assert_eq!(line_crlf(&tree, 1), ("abc".to_string(), IncompleteCrlf::No));
    assert_eq!(tree.get_line_range_crlf(1), LineRange { first: 0, last: 3 });
    // The plain range only excludes the \n.
    assert_eq!(tree.get_line_range(1), LineRange { first: 0, last: 4 });
}

#[test]
fn lone_cr_is_content() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "ab\rcd");
    assert_eq!(tree.line_count(), 1);
    assert_eq!(line(&tree, 1), "ab\rcd");
    // The \r is kept, and the line is unterminated.
    assert_eq!(line_crlf(&tree, 1), ("ab\rcd".to_string(), IncompleteCrlf::Yes));
}

#[test]
fn line_at_offsets() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "foo\nbar\nbaz");
    assert_eq!(tree.line_at(0), 1);
    assert_eq!(tree.line_at(3), 1);
    assert_eq!(tree.line_at(4), 2);
    assert_eq!(tree.line_at(7), 2);
    assert_eq!(tree.line_at(8), 3);
    assert_eq!(tree.line_at(10), 3);
}

// ---------- History ----------

#[test]
fn suppressed_edits_record_no_history() {
    let mut tree = PieceTree::new();
    tree.insert(0, &encode("abc"), SuppressHistory::Yes);
    tree.remove(0, 1, SuppressHistory::Yes);
    assert_eq!(text(&tree), "bc");
    assert!(!tree.try_undo(0).success);
}

#[test]
fn undo_round_trips_op_offsets() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "stable");
    tree.insert(3, &encode("X"), SuppressHistory::No);

    let undone = tree.try_undo(42);
    assert_eq!(undone, UndoRedoResult { success: true, op_offset: 3 });
    let redone = tree.try_redo(7);
    assert_eq!(redone, UndoRedoResult { success: true, op_offset: 42 });
    assert_eq!(text(&tree), "staXble");
}

#[test]
fn undo_ends_a_coalescing_run() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "ab");
    tree.try_undo(0);
    tree.try_redo(0);
    // Continuing to type after redo must be its own undo step, not an
    // extension of the pre-undo run.
    ins(&mut tree, 2, "cd");
    assert_eq!(text(&tree), "abcd");
    assert!(tree.try_undo(0).success);
    assert_eq!(text(&tree), "ab");
}

#[test]
fn commit_head_creates_manual_checkpoint() {
    let mut tree = PieceTree::new();
    tree.insert(0, &encode("v1"), SuppressHistory::Yes);
    tree.commit_head(0);
    tree.insert(2, &encode("-v2"), SuppressHistory::Yes);
    assert_eq!(text(&tree), "v1-v2");

    assert!(tree.try_undo(0).success);
    assert_eq!(text(&tree), "v1");
}

#[test]
fn snap_to_installs_an_observed_root() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "first");
    let head = tree.head();
    ins(&mut tree, 5, " second");
    assert_eq!(text(&tree), "first second");

    tree.snap_to(head);
    assert_eq!(text(&tree), "first");
    assert_eq!(tree.length(), 5);
}

#[test]
fn redo_cleared_by_new_edit() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "one");
    tree.try_undo(0);
    ins(&mut tree, 0, "two");
    assert!(!tree.try_redo(0).success);
    assert_eq!(text(&tree), "two");
}

// ---------- Snapshots ----------

#[test]
fn owning_snapshot_isolation() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "alpha\nbeta");
    let snap = tree.owning_snap();

    rm(&mut tree, 0, 6);
    ins(&mut tree, 0, "GAMMA ");
    assert_eq!(text(&tree), "GAMMA beta");

    assert_eq!(text(&snap), "alpha\nbeta");
    assert_eq!(snap.line_count(), 2);
    assert_eq!(decode(&snap.get_line_content(1)), "alpha\n");
    assert_eq!(snap.get_line_range(2), LineRange { first: 6, last: 10 });
}

#[test]
fn owning_snapshot_survives_the_tree() {
    let snap = {
        let mut tree = PieceTree::new();
        ins(&mut tree, 0, "persisted");
        tree.owning_snap()
    };
    assert_eq!(text(&snap), "persisted");
    assert!(!snap.is_empty());
}

#[test]
fn ref_snapshot_queries_match_the_tree() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "ref\nsnap");
    let snap = tree.ref_snap();
    assert_eq!(text(&snap), "ref\nsnap");
    assert_eq!(snap.line_count(), tree.line_count());
    assert_eq!(snap.line_at(4), 2);
    assert_eq!(
        snap.get_line_content_crlf(1).0,
        tree.get_line_content_crlf(1).0
    );
}

#[test]
fn snapshot_at_pins_an_old_root() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "old");
    let head = tree.head();
    ins(&mut tree, 3, " new");

    let snap = tree.owning_snap_at(head.clone());
    assert_eq!(text(&snap), "old");

    let ref_snap = tree.ref_snap_at(head);
    assert_eq!(text(&ref_snap), "old");
    assert_eq!(text(&tree), "old new");
}

// ---------- Walkers ----------

#[test]
fn walker_round_trip_matches_line_assembly() {
    let docs = [
        "hello\nworld",
        "a\nb\nc\n",
        "no newline",
        "crlf\r\nlines\r\n",
        "\n\n\n",
    ];
    for doc in docs {
        let mut tree = PieceTree::new();
        ins(&mut tree, 0, doc);
        let walked = text(&tree);
        let mut assembled = String::new();
        for n in 1..=tree.line_count() {
            assembled.push_str(&line(&tree, n));
        }
        assert_eq!(walked, doc);
        assert_eq!(assembled, doc);
    }
}

#[test]
fn reverse_walker_is_the_mirror_of_forward() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "baz");
    ins(&mut tree, 0, "bar\n");
    ins(&mut tree, 0, "foo\n");
    rm(&mut tree, 2, 3);

    let forward = text(&tree);
    let backward: String = reverse_text(&tree).chars().rev().collect();
    assert_eq!(forward, backward);
}

#[test]
fn walker_seek_and_offset() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "hello\nworld");

    let mut walker = TreeWalker::with_offset(&tree, 6);
    assert_eq!(walker.offset(), 6);
    assert_eq!(walker.remaining(), 5);
    let mut out = Vec::new();
    while !walker.exhausted() {
        out.push(walker.next());
    }
    assert_eq!(decode(&out), "world");
    assert_eq!(walker.remaining(), 0);

    walker.seek(0);
    assert_eq!(walker.current(), encode("h")[0]);
    assert_eq!(walker.next(), encode("h")[0]);
    assert_eq!(walker.offset(), 1);
}

#[test]
fn walker_next_at_exhaustion_returns_nul() {
    let tree = PieceTree::new();
    let mut walker = TreeWalker::new(&tree);
    assert!(walker.exhausted());
    assert_eq!(walker.next(), NUL);
    assert_eq!(walker.current(), NUL);
}

#[test]
fn walker_iterator_sugar() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "iter");
    let units: Vec<CodeUnit> = TreeWalker::new(&tree).collect();
    assert_eq!(decode(&units), "iter");
}

#[test]
fn walker_over_snapshot() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "snapshot text");
    let snap = tree.owning_snap();
    let full = tree.length();
    rm(&mut tree, 0, full);

    let units: Vec<CodeUnit> = TreeWalker::new(&snap).collect();
    assert_eq!(decode(&units), "snapshot text");
}

#[test]
fn reverse_walker_remaining_counts_down() {
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "abcde");
    let mut walker = ReverseTreeWalker::with_offset(&tree, 4);
    assert_eq!(walker.remaining(), 5);
    assert_eq!(walker.next(), encode("e")[0]);
    assert_eq!(walker.remaining(), 4);
    while !walker.exhausted() {
        walker.next();
    }
    assert_eq!(walker.remaining(), 0);
    assert_eq!(walker.next(), NUL);
}

// ---------- Unicode ----------

#[test]
fn multibyte_content_round_trips() {
    let doc = "αβγ\nδεζ";
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, doc);
    assert_eq!(tree.length(), encode(doc).len());
    assert_eq!(tree.line_count(), 2);
    assert_eq!(text(&tree), doc);
    assert_eq!(line(&tree, 2), "δεζ");
}

// ---------- Randomized oracle ----------

struct Oracle {
    tree: PieceTree,
    reference: Vec<CodeUnit>,
}

impl Oracle {
    fn new() -> Self {
        Self {
            tree: PieceTree::new(),
            reference: Vec::new(),
        }
    }

    fn insert(&mut self, at: usize, units: &[CodeUnit]) {
        self.tree.insert(at, units, SuppressHistory::No);
        self.reference.splice(at..at, units.iter().copied());
    }

    fn remove(&mut self, at: usize, count: usize) {
        self.tree.remove(at, count, SuppressHistory::No);
        self.reference.drain(at..at + count);
    }

    fn check(&self) {
        assert_eq!(self.tree.length(), self.reference.len());
        assert_eq!(self.tree.content(), self.reference);
        let lf_count = self.reference.iter().filter(|&&u| u == LF).count();
        assert_eq!(self.tree.line_feed_count(), lf_count);
        assert_eq!(self.tree.line_count(), lf_count + 1);
        self.tree.head().check_invariants();
    }
}

#[test]
fn random_edit_scripts_match_reference() {
    // Alphabet skewed towards line breaks so CRLF paths get exercised.
    let alphabet = encode("ab\ncd\re\nf");
    for seed in 0..25u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut oracle = Oracle::new();

        for _ in 0..80 {
            let len = oracle.reference.len();
            if len == 0 || rng.gen_bool(0.62) {
                let at = rng.gen_range(0..=len);
                let count = rng.gen_range(1..10);
                let units: Vec<CodeUnit> = (0..count)
                    .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                    .collect();
                oracle.insert(at, &units);
            } else {
                let at = rng.gen_range(0..len);
                let count = rng.gen_range(1..=(len - at).min(12));
                oracle.remove(at, count);
            }
            oracle.check();
        }

        // Every line assembles back into the full document.
        let mut assembled = Vec::new();
        for n in 1..=oracle.tree.line_count() {
            assembled.extend(oracle.tree.get_line_content(n));
        }
        assert_eq!(assembled, oracle.reference);

        // And the reverse walk mirrors the forward walk.
        let forward = oracle.tree.content();
        let mut backward = Vec::new();
        if !oracle.tree.is_empty() {
            let mut walker = ReverseTreeWalker::with_offset(&oracle.tree, oracle.tree.length() - 1);
            while !walker.exhausted() {
                backward.push(walker.next());
            }
            backward.reverse();
        }
        assert_eq!(forward, backward);
    }
}

#[test]
fn random_undo_redo_restores_states() {
    for seed in 0..10u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = PieceTree::new();
        // Snapshot of the content before each recorded undo entry.
        let mut states: Vec<Vec<CodeUnit>> = Vec::new();
        // Model of the coalescing rule: an insert continuing at the
        // previous insert's end point shares its undo entry.
        let mut coalesce_end: Option<usize> = None;

        for _ in 0..30 {
            let len = tree.length();
            let before = tree.content();
            if len == 0 || rng.gen_bool(0.7) {
                let at = rng.gen_range(0..=len);
                let unit = encode("znl\n");
                let count = rng.gen_range(1..5);
                let units: Vec<CodeUnit> =
                    (0..count).map(|_| unit[rng.gen_range(0..unit.len())]).collect();
                let records = coalesce_end != Some(at) || tree.is_empty();
                tree.insert(at, &units, SuppressHistory::No);
                if records {
                    states.push(before);
                }
                coalesce_end = Some(at + units.len());
            } else {
                let at = rng.gen_range(0..len);
                let count = rng.gen_range(1..=(len - at).min(6));
                tree.remove(at, count, SuppressHistory::No);
                states.push(before);
            }
        }

        // Unwind everything; each undo must restore the exact prior
        // content.
        while let Some(expected) = states.pop() {
            let result = tree.try_undo(0);
            assert!(result.success);
            assert_eq!(tree.content(), expected);
        }
        assert!(!tree.try_undo(0).success);
    }
}

#[test]
fn snapshot_isolation_under_random_edits() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut tree = PieceTree::new();
    ins(&mut tree, 0, "base\ncontent\nhere");
    let snap = tree.owning_snap();
    let frozen = text(&snap);

    for _ in 0..40 {
        let len = tree.length();
        if len == 0 || rng.gen_bool(0.5) {
            let at = rng.gen_range(0..=len);
            tree.insert(at, &encode("x\n"), SuppressHistory::No);
        } else {
            let at = rng.gen_range(0..len);
            tree.remove(at, 1, SuppressHistory::No);
        }
        assert_eq!(text(&snap), frozen);
    }
}
