//! Integration tests for the editable sequence.
//!
//! Run with `RUST_LOG=kiroku_vfs=debug cargo test -- --nocapture` to see
//! the rewrite and index-reset traces.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use kiroku_vfs::sequence::{Stream, StreamLock};
use kiroku_vfs::{
    Cursor, DEFAULT_UNIT_SIZE, EditableSequence, RandomAccess, SequenceMode, Sequential, Target,
    VfsError,
};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// Shared test setup
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Scratch file with `content`, plus the directory keeping it alive.
fn scratch(content: &[u8]) -> (PathBuf, TempDir) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data");
    std::fs::write(&path, content).unwrap();
    (path, dir)
}

fn open(path: &Path, mode: SequenceMode, unit_size: usize) -> EditableSequence {
    let file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    EditableSequence::with_label(file, path.display().to_string(), mode, unit_size).unwrap()
}

fn contents(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

// ============================================================================
// Chunk mode
// ============================================================================

#[test]
fn chunk_append_then_get() {
    let (path, _dir) = scratch(b"");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    seq.set(Target::Append, Some(b"foo")).unwrap();
    assert_eq!(seq.get(0).unwrap().unwrap(), b"foo");
    assert!(!seq.exists(1).unwrap());
}

#[test]
fn chunk_same_width_overwrite_keeps_length() {
    let (path, _dir) = scratch(b"abcdwxyz");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    seq.set(Target::Index(0), Some(b"1234")).unwrap();
    assert_eq!(contents(&path), b"1234wxyz");
    assert_eq!(seq.get(1).unwrap().unwrap(), b"wxyz");
}

#[test]
fn chunk_last_shrinks_in_place() {
    let (path, _dir) = scratch(b"abcdwxyz");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    seq.set(Target::Index(1), Some(b"w")).unwrap();
    assert_eq!(contents(&path), b"abcdw");
    // the one remaining byte is still chunk 1
    assert!(seq.exists(1).unwrap());
    assert_eq!(seq.get(1).unwrap().unwrap(), b"w");
    assert!(!seq.exists(2).unwrap());
}

#[test]
fn chunk_middle_width_change_rewrites() {
    let (path, _dir) = scratch(b"abcdwxyzefgh");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    seq.set(Target::Index(1), Some(b"WXY")).unwrap();
    assert_eq!(contents(&path), b"abcdWXYefgh");
    assert_eq!(contents(&path).len(), 11);
    // everything after the edit moved back one byte
    assert_eq!(seq.get(1).unwrap().unwrap(), b"WXYe");
    assert_eq!(seq.get(2).unwrap().unwrap(), b"fgh");
}

#[test]
fn chunk_delete_middle_shifts_forward() {
    let (path, _dir) = scratch(b"aaaabbbbcc");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    seq.delete(1).unwrap();
    assert_eq!(contents(&path), b"aaaacc");
    assert_eq!(seq.get(1).unwrap().unwrap(), b"cc");
}

// ============================================================================
// Line mode
// ============================================================================

#[test]
fn line_append_then_random_get() {
    let (path, _dir) = scratch(b"");
    let mut seq = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);

    seq.set(Target::Append, Some(b"alpha")).unwrap();
    seq.set(Target::Append, Some(b"beta")).unwrap();

    assert_eq!(seq.get(0).unwrap().unwrap(), b"alpha");
    assert_eq!(seq.get(1).unwrap().unwrap(), b"beta");
    assert!(!seq.exists(2).unwrap());
    assert_eq!(contents(&path), b"alpha\nbeta\n");
}

#[test]
fn line_sparse_write_pads_with_blanks() {
    for start in [&b"x"[..], &b"x\n"[..]] {
        let (path, _dir) = scratch(start);
        let mut seq = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);

        seq.set(Target::Index(3), Some(b"y")).unwrap();
        assert_eq!(contents(&path), b"x\n\n\ny\n");

        let records: Vec<_> = (0..4).map(|i| seq.get(i).unwrap().unwrap()).collect();
        assert_eq!(records, vec![b"x".to_vec(), vec![], vec![], b"y".to_vec()]);
        assert!(!seq.exists(4).unwrap());
    }
}

#[test]
fn line_write_normalizes_terminator() {
    let (path, _dir) = scratch(b"a\nb\n");
    let mut seq = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);

    seq.set(Target::Index(0), Some(b"A\n\n")).unwrap();
    seq.push(b"c\n").unwrap();
    assert_eq!(contents(&path), b"A\nb\nc\n");
}

#[test]
fn line_longer_than_unit_size_splits() {
    let (path, _dir) = scratch(b"abcdefg\nh\n");
    let mut seq = open(&path, SequenceMode::Line, 4);

    assert_eq!(seq.get(0).unwrap().unwrap(), b"abcd");
    assert_eq!(seq.get(1).unwrap().unwrap(), b"efg");
    assert_eq!(seq.get(2).unwrap().unwrap(), b"h");

    seq.push(b"ijklmn").unwrap();
    assert_eq!(seq.get(3).unwrap().unwrap(), b"ijkl");
    assert_eq!(seq.get(4).unwrap().unwrap(), b"mn");
}

#[test]
fn line_value_with_interior_separator_moves_later_lines() {
    let (path, _dir) = scratch(b"xyz\nrest\n");
    let mut seq = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);

    // learn line 1's offset before the edit
    assert_eq!(seq.get(1).unwrap().unwrap(), b"rest");

    seq.set(Target::Index(0), Some(b"a\nb")).unwrap();
    assert_eq!(contents(&path), b"a\nb\nrest\n");

    assert_eq!(seq.get(0).unwrap().unwrap(), b"a");
    assert_eq!(seq.get(1).unwrap().unwrap(), b"b");
    assert_eq!(seq.get(2).unwrap().unwrap(), b"rest");
    assert!(!seq.exists(3).unwrap());

    let mut fresh = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);
    assert_eq!(fresh.get(1).unwrap().unwrap(), b"b");
}

#[test]
fn line_index_beyond_file_offsets_is_invalid() {
    let (path, _dir) = scratch(b"x\n");
    let mut seq = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);

    for line in [u64::MAX, i64::MAX as u64] {
        let err = seq.set(Target::Index(line), Some(b"y")).unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)), "{line}");
    }
    assert_eq!(contents(&path), b"x\n");

    seq.set(Target::Index(2), Some(b"y")).unwrap();
    assert_eq!(contents(&path), b"x\n\ny\n");
}

// ============================================================================
// Shift invariant, checked against an in-memory model
// ============================================================================

/// Small deterministic generator so failures are reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn word(&mut self, max_len: u64) -> Vec<u8> {
        let len = self.below(max_len + 1);
        (0..len).map(|_| b'a' + self.below(26) as u8).collect()
    }
}

#[test]
fn line_edits_match_model() {
    let (path, _dir) = scratch(b"");
    let mut seq = open(&path, SequenceMode::Line, 64);
    let mut model: Vec<Vec<u8>> = Vec::new();
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);

    for step in 0..400 {
        let len = model.len() as u64;
        match rng.below(4) {
            0 => {
                let value = rng.word(10);
                seq.push(&value).unwrap();
                model.push(value);
            }
            1 => {
                let index = rng.below(len + 3);
                let value = rng.word(10);
                seq.set(Target::Index(index), Some(&value)).unwrap();
                let index = index as usize;
                if index < model.len() {
                    model[index] = value;
                } else {
                    model.resize(index, Vec::new());
                    model.push(value);
                }
            }
            _ => {
                let index = rng.below(len + 2);
                seq.delete(index).unwrap();
                if (index as usize) < model.len() {
                    model.remove(index as usize);
                }
            }
        }

        for (i, expected) in model.iter().enumerate() {
            let got = seq.get(i as u64).unwrap();
            assert_eq!(got.as_ref(), Some(expected), "step {step}, line {i}");
        }
        assert!(!seq.exists(model.len() as u64).unwrap(), "step {step}");
    }

    let mut expected = Vec::new();
    for line in &model {
        expected.extend_from_slice(line);
        expected.push(b'\n');
    }
    assert_eq!(contents(&path), expected);
}

#[test]
fn chunk_edits_match_model() {
    const UNIT: usize = 4;

    let (path, _dir) = scratch(b"");
    let mut seq = open(&path, SequenceMode::Chunk, UNIT);
    let mut model: Vec<u8> = Vec::new();
    let mut rng = XorShift(0x2545_f491_4f6c_dd1d);

    for step in 0..400 {
        let chunks = model.len().div_ceil(UNIT) as u64;
        match rng.below(3) {
            0 => {
                let value = rng.word(6);
                seq.push(&value).unwrap();
                model.extend_from_slice(&value);
            }
            op => {
                let index = rng.below(chunks + 2);
                let value = if op == 1 { rng.word(6) } else { Vec::new() };
                let write = if op == 1 { Some(&value[..]) } else { None };
                seq.set(Target::Index(index), write).unwrap();

                let offset = index as usize * UNIT;
                if offset >= model.len() {
                    model.extend_from_slice(&value);
                } else {
                    let rest = model.split_off((offset + UNIT).min(model.len()));
                    model.truncate(offset);
                    model.extend_from_slice(&value);
                    model.extend_from_slice(&rest);
                }
            }
        }

        assert_eq!(contents(&path), model, "step {step}");
    }
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn traversal_survives_interleaved_random_access() {
    let (path, _dir) = scratch(b"");
    let mut lines = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);
    lines.set(Target::Index(0), Some(b"bar")).unwrap();
    lines.set(Target::Index(1), Some(b"ba")).unwrap();
    lines.set(Target::Index(2), Some(b"baz")).unwrap();
    lines.set(Target::Index(10), Some(b"qux")).unwrap();

    let mut seen = Vec::new();
    lines.rewind().unwrap();
    while lines.is_valid().unwrap() {
        seen.push((lines.position(), lines.current().unwrap()));
        // moves the shared file pointer behind the cursor's back
        assert_eq!(lines.get(1).unwrap().unwrap(), b"ba");
        lines.advance();
    }

    let values: Vec<_> = seen.iter().map(|(_, v)| v.as_slice()).collect();
    assert_eq!(
        values,
        vec![
            &b"bar"[..], b"ba", b"baz", b"", b"", b"", b"", b"", b"", b"", b"qux"
        ]
    );
    assert_eq!(seen.last().unwrap().0, 10);
}

#[test]
fn chunk_traversal_with_standalone_cursor() {
    let (path, _dir) = scratch(b"barabazr");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    let mut cursor = Cursor::new();
    cursor.rewind(&mut seq).unwrap();
    let mut chunks = Vec::new();
    while cursor.is_valid(&mut seq).unwrap() {
        chunks.push(cursor.current(&mut seq).unwrap());
        assert_eq!(seq.get(1).unwrap().unwrap(), b"bazr");
        cursor.advance();
    }

    assert_eq!(chunks, vec![b"bara".to_vec(), b"bazr".to_vec()]);
    // the sequence's own cursor was never moved
    assert_eq!(seq.position(), 0);
}

#[test]
fn records_restart_from_the_top() {
    let (path, _dir) = scratch(b"one\ntwo\n");
    let mut seq = open(&path, SequenceMode::Line, DEFAULT_UNIT_SIZE);

    let first: Vec<_> = seq.records().map(Result::unwrap).collect();
    seq.push(b"three").unwrap();
    let second: Vec<_> = seq.records().map(Result::unwrap).collect();

    assert_eq!(first.len(), 2);
    assert_eq!(second, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
}

// ============================================================================
// Lifecycle and locking
// ============================================================================

#[test]
fn close_twice_then_use() {
    let (path, _dir) = scratch(b"abcd");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    seq.close();
    seq.close();
    assert!(seq.is_closed());
    assert!(matches!(seq.exists(0), Err(VfsError::Closed)));
    assert!(matches!(seq.set(Target::Append, Some(b"x")), Err(VfsError::Closed)));
    assert!(matches!(seq.is_valid(), Err(VfsError::Closed)));
    assert_eq!(contents(&path), b"abcd");
}

#[test]
fn zero_unit_size_is_invalid() {
    let (path, _dir) = scratch(b"");
    let file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    let err = EditableSequence::new(file, SequenceMode::Line, 0).unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));
}

#[test]
fn write_fails_fast_while_another_handle_holds_the_lock() {
    let (path, _dir) = scratch(b"abcdwxyz");
    let mut seq = open(&path, SequenceMode::Chunk, 4);

    let other = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    let mut other = Stream::new(other, "other");
    let guard = StreamLock::acquire(&mut other).unwrap();

    let err = seq.set(Target::Index(0), Some(b"ab")).unwrap_err();
    assert!(matches!(err, VfsError::LockContention(_)));
    assert!(err.is_retryable());
    assert!(seq.push(b"!").is_err());
    assert_eq!(contents(&path), b"abcdwxyz");

    // reads never take the lock
    assert_eq!(seq.get(1).unwrap().unwrap(), b"wxyz");

    drop(guard);
    seq.set(Target::Index(0), Some(b"ab")).unwrap();
    assert_eq!(contents(&path), b"abwxyz");
}

#[test]
fn lock_is_released_after_each_write() {
    let (path, _dir) = scratch(b"");
    let mut first = open(&path, SequenceMode::Line, 64);
    let mut second = open(&path, SequenceMode::Line, 64);

    first.push(b"one").unwrap();
    second.push(b"two").unwrap();
    first.push(b"three").unwrap();

    assert_eq!(contents(&path), b"one\ntwo\nthree\n");
}
