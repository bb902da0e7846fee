//! Text store consistency against a reference rope.

use editor_kernel::{LineEndingPolicy, Position, TextError, TextStore};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ropey::Rope;

/// Generate a text blob of roughly `size_kb` kilobytes.
fn generate_text(size_kb: usize) -> String {
    let target_bytes = size_kb * 1024;
    let sample = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
                  Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.\n";
    let mut text = String::with_capacity(target_bytes + sample.len());
    while text.len() < target_bytes {
        text.push_str(sample);
    }
    text
}

#[test]
fn test_random_edits_match_rope() {
    let original = generate_text(8);
    let (mut store, mut state) = TextStore::open(original.as_bytes());
    let mut reference = Rope::from_str(&original);
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..400 {
        if rng.gen_bool(0.6) || reference.len_chars() == 0 {
            let text = match rng.gen_range(0..4) {
                0 => "X",
                1 => "你好",
                2 => "👋",
                _ => "test\n",
            };
            let char_index = rng.gen_range(0..=reference.len_chars());
            let offset = reference.char_to_byte(char_index);
            state = store.insert(state, offset, text.as_bytes()).unwrap();
            reference.insert(char_index, text);
        } else {
            let start = rng.gen_range(0..reference.len_chars());
            let end = (start + rng.gen_range(1..20)).min(reference.len_chars());
            let range = reference.char_to_byte(start)..reference.char_to_byte(end);
            let expected = reference.slice(start..end).to_string();
            let (next, removed) = store.delete(state, range).unwrap();
            assert_eq!(String::from_utf8(removed).unwrap(), expected);
            state = next;
            reference.remove(start..end);
        }
    }

    assert_eq!(store.to_string_lossy(&state), reference.to_string());
    assert_eq!(state.len(), reference.len_bytes());
    assert_eq!(state.line_count(), reference.len_lines());
    for line in 0..reference.len_lines() {
        assert_eq!(store.line_start(&state, line).unwrap(), reference.line_to_byte(line));
    }
    for _ in 0..200 {
        let char_index = rng.gen_range(0..=reference.len_chars());
        let offset = reference.char_to_byte(char_index);
        let line = reference.char_to_line(char_index);
        let column = char_index - reference.line_to_char(line);
        assert_eq!(store.line_of_offset(&state, offset).unwrap(), line);
        assert_eq!(store.offset_to_line_col(&state, offset).unwrap(), Position::new(line, column));
        assert_eq!(store.line_col_to_offset(&state, line, column).unwrap(), offset);
    }
}

#[test]
fn test_insert_then_delete_restores_content() {
    let (mut store, s0) = TextStore::open("The quick brown fox\njumps over\nthe lazy dog");
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let offset = rng.gen_range(0..=s0.len());
        let bytes = b"inserted\ntext";
        let s1 = store.insert(s0, offset, bytes).unwrap();
        let (s2, removed) = store.delete(s1, offset..offset + bytes.len()).unwrap();
        assert_eq!(removed, bytes);
        assert_eq!(
            store.bytes(&s2, LineEndingPolicy::Preserve),
            store.bytes(&s0, LineEndingPolicy::Preserve)
        );
        assert_eq!(s2.line_count(), s0.line_count());
    }
}

#[test]
fn test_snapshots_are_independent() {
    let (mut store, s0) = TextStore::open("0123456789");
    let mut states = vec![s0];
    for i in 0..20 {
        let last = *states.last().unwrap();
        let next = if i % 3 == 0 {
            store.delete(last, 0..1).unwrap().0
        } else {
            store.insert(last, last.len() / 2, b"ab").unwrap()
        };
        states.push(next);
    }
    // Replaying the same script on a fresh store reproduces every version.
    let (mut fresh, f0) = TextStore::open("0123456789");
    let mut expected = vec![fresh.to_string_lossy(&f0)];
    let mut cur = f0;
    for i in 0..20 {
        cur = if i % 3 == 0 {
            fresh.delete(cur, 0..1).unwrap().0
        } else {
            fresh.insert(cur, cur.len() / 2, b"ab").unwrap()
        };
        expected.push(fresh.to_string_lossy(&cur));
    }
    let actual: Vec<String> = states.iter().map(|s| store.to_string_lossy(s)).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_slices_and_chunks() {
    let (mut store, state) = TextStore::open("hello world");
    let state = store.insert(state, 5, b",").unwrap();
    assert_eq!(store.slice(&state, 3..8).unwrap(), b"lo, w");
    let joined: Vec<u8> = store.chunks(&state, 0..state.len()).flatten().copied().collect();
    assert_eq!(joined, b"hello, world");
    assert_eq!(store.byte_at(&state, 5), Some(b','));
    assert_eq!(store.byte_at(&state, 99), None);
    assert_eq!(
        store.slice(&state, 5..99),
        Err(TextError::InvalidRange { start: 5, end: 99, len: 12 })
    );
}

#[test]
fn test_line_iteration_restarts_anywhere() {
    let (store, state) = TextStore::open("alpha\nbeta\r\ngamma\n");
    let all: Vec<String> = store
        .lines(&state, 0)
        .map(|span| String::from_utf8(store.slice(&state, span.content()).unwrap()).unwrap())
        .collect();
    assert_eq!(all, vec!["alpha", "beta", "gamma", ""]);
    let tail: Vec<usize> = store.lines(&state, 2).map(|span| span.index).collect();
    assert_eq!(tail, vec![2, 3]);
    assert_eq!(store.line_text(&state, 1).unwrap(), "beta");
}

#[test]
fn test_many_small_edits_grow_add_buffer_only() {
    let (mut store, mut state) = TextStore::open("");
    for i in 0..10_000 {
        state = store.insert(state, i, b"x").unwrap();
    }
    assert_eq!(state.len(), 10_000);
    assert_eq!(store.add_buffer_len(), 10_000);
    // Appends extend the last piece instead of growing the tree.
    assert!(store.node_count() < 10_000 * 2);
}

#[test]
fn test_compact_rewrites_live_states() {
    let (mut store, mut state) = TextStore::open("fn main() {}\n");
    let mut kept = state;
    for i in 0..500 {
        state = store.insert(state, 11, format!("{} ", i % 10).as_bytes()).unwrap();
        if i == 249 {
            kept = state;
        }
    }
    let kept_text = store.to_string_lossy(&kept);
    let text = store.to_string_lossy(&state);
    let before = store.node_count();

    let freed = store.compact([&mut state, &mut kept]);
    assert!(freed > 0);
    assert_eq!(store.node_count(), before - freed);
    assert_eq!(store.to_string_lossy(&state), text);
    assert_eq!(store.to_string_lossy(&kept), kept_text);
    assert_eq!(state.line_count(), 2);

    let (state, removed) = store.delete(state, 0..3).unwrap();
    assert_eq!(removed, b"fn ");
    assert!(store.to_string_lossy(&state).starts_with("main() "));
}
