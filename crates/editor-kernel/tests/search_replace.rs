use editor_kernel::{
    CoreConfig, Document, LineEndingPolicy, MatchContext, SearchConfig, SearchController,
    SearchError, UndoError,
};
use monster_regex::MatchError;
use pretty_assertions::assert_eq;

fn controller() -> SearchController {
    SearchController::new(SearchConfig::default())
}

#[test]
fn test_replace_all_is_one_undo_step() {
    let mut doc = Document::from_str("aa bb aaa");
    let mut search = controller();
    let re = search.compile("a+", "g").unwrap();

    let outcome = search.replace_all(&mut doc, &re, "X").unwrap();
    assert_eq!(outcome.count, 2);
    assert_eq!(doc.text_lossy(), "X bb X");
    assert_eq!(outcome.state, doc.state());
    assert_eq!(doc.history_snapshot()[1].summary, "replace 2 matches");

    doc.undo().unwrap();
    assert_eq!(doc.text_lossy(), "aa bb aaa");
    assert_eq!(doc.undo(), Err(UndoError::NothingToUndo));
    doc.redo().unwrap();
    assert_eq!(doc.text_lossy(), "X bb X");
}

#[test]
fn test_find_next_past_last_match_wraps() {
    let doc = Document::from_str("needle in a haystack with a needle");
    let mut search = controller();
    let re = search.compile("needle", "").unwrap();
    let ctx = MatchContext::default();

    let hit = search.find_next(&doc.view(), &re, 29, &ctx).unwrap().unwrap();
    assert_eq!((hit.matched.start, hit.wrapped), (0, true));

    let hit = search.find_next(&doc.view(), &re, 1, &ctx).unwrap().unwrap();
    assert_eq!((hit.matched.start, hit.wrapped), (28, false));
}

#[test]
fn test_search_across_edited_pieces() {
    let mut doc = Document::from_str("hello world");
    doc.insert(5, b" big").unwrap();
    doc.insert(0, b"oh, ").unwrap();
    let search = controller();
    let re = search.compile("\\w\\s\\w", "g").unwrap();
    let view = doc.view();
    let found: Vec<_> = search
        .find_all(&view, &re, &MatchContext::default())
        .unwrap()
        .into_iter()
        .map(|m| m.text(&view))
        .collect();
    assert_eq!(found, vec!["o b", "g w"]);
}

#[test]
fn test_multiline_anchors_over_document() {
    let mut doc = Document::from_str("fn a()\n  fn b()\nfn c()\n");
    let mut search = controller();
    let re = search.compile("^fn", "mg").unwrap();
    let outcome = search.replace_all(&mut doc, &re, "pub fn").unwrap();
    assert_eq!(outcome.count, 2);
    assert_eq!(doc.text_lossy(), "pub fn a()\n  fn b()\npub fn c()\n");
}

#[test]
fn test_match_span_markers_in_replacement() {
    let mut doc = Document::from_str("foo(bar) foo(baz)");
    let mut search = controller();
    let re = search.compile("foo\\(\\zs\\w+\\ze\\)", "g").unwrap();
    search.replace_all(&mut doc, &re, "[&]").unwrap();
    assert_eq!(doc.text_lossy(), "foo([bar]) foo([baz])");
}

#[test]
fn test_position_anchors_use_context() {
    let doc = Document::from_str("x x\nx x\nx x");
    let mut search = controller();
    let re = search.compile("\\%.lx", "").unwrap();
    let ctx = MatchContext {
        current_line: 1,
        current_column: 0,
        cursor_offset: 4,
    };
    let hit = search.find_next(&doc.view(), &re, 0, &ctx).unwrap().unwrap();
    assert_eq!(hit.matched.range(), 4..5);
}

#[test]
fn test_budget_exhaustion_is_reported() {
    let doc = Document::from_str(&format!("{}b", "a".repeat(30)));
    let mut search = SearchController::new(SearchConfig {
        backtrack_limit: 1_000,
        ..SearchConfig::default()
    });
    let re = search.compile("(a|aa)*c", "").unwrap();
    let err = search
        .find_next(&doc.view(), &re, 0, &MatchContext::default())
        .unwrap_err();
    assert_eq!(
        err,
        SearchError::TooComplex(MatchError::BacktrackLimitExceeded { limit: 1_000 })
    );
    assert!(err.is_user_facing());
    assert!(err.to_string().contains("too complex"));
}

#[test]
fn test_replace_keeps_invalid_utf8_intact() {
    let mut doc = Document::open(b"a\xFFb c".to_vec(), CoreConfig::default()).unwrap();
    let mut search = controller();
    let re = search.compile("a.b", "g").unwrap();
    let outcome = search.replace_all(&mut doc, &re, "X").unwrap();
    assert_eq!(outcome.count, 1);
    assert_eq!(doc.bytes(LineEndingPolicy::Preserve), b"X c");
    doc.undo().unwrap();
    assert_eq!(doc.bytes(LineEndingPolicy::Preserve), b"a\xFFb c");

    // The whole-match token copies the invalid byte through unchanged.
    search.replace_all(&mut doc, &re, "[&]").unwrap();
    assert_eq!(doc.bytes(LineEndingPolicy::Preserve), b"[a\xFFb] c");
}

#[test]
fn test_empty_match_after_match_is_replaced() {
    let mut doc = Document::from_str("baaac");
    let mut search = controller();
    let re = search.compile("a*", "g").unwrap();
    let outcome = search.replace_all(&mut doc, &re, "-").unwrap();
    assert_eq!(outcome.count, 4);
    assert_eq!(doc.text_lossy(), "-b--c-");
}

#[test]
fn test_lookbehind_search_respects_budget() {
    let doc = Document::from_str(&"z".repeat(20_000));
    let mut search = SearchController::new(SearchConfig {
        backtrack_limit: 10_000,
        ..SearchConfig::default()
    });
    let re = search.compile("(?<=x.*)y", "").unwrap();
    let err = search
        .find_next(&doc.view(), &re, 0, &MatchContext::default())
        .unwrap_err();
    assert_eq!(
        err,
        SearchError::TooComplex(MatchError::BacktrackLimitExceeded { limit: 10_000 })
    );
}

#[test]
fn test_replace_current_undo_and_redo() {
    let mut doc = Document::from_str("one two one");
    let mut search = controller();
    let re = search.compile("one", "").unwrap();
    let ctx = MatchContext::default();

    let outcome = search.replace_current(&mut doc, &re, "1", 8, &ctx).unwrap();
    assert_eq!(outcome.count, 1);
    assert_eq!(doc.text_lossy(), "one two 1");
    assert_eq!(doc.history_snapshot()[1].summary, "replace 1 match");

    doc.undo().unwrap();
    assert_eq!(doc.text_lossy(), "one two one");
    doc.redo().unwrap();
    assert_eq!(doc.text_lossy(), "one two 1");
    assert_eq!(doc.redo(), Err(UndoError::NothingToRedo));
}

#[test]
fn test_find_prev_wraps_to_last_match() {
    let doc = Document::from_str("abc\nabc\n");
    let mut search = controller();
    let re = search.compile("abc", "").unwrap();
    let ctx = MatchContext::default();

    let hit = search.find_prev(&doc.view(), &re, 0, &ctx).unwrap().unwrap();
    assert_eq!((hit.matched.start, hit.wrapped), (4, true));
    let hit = search.find_prev(&doc.view(), &re, 4, &ctx).unwrap().unwrap();
    assert_eq!((hit.matched.start, hit.wrapped), (0, false));

    // `N` after a backward search runs forward.
    let hit = search.repeat(&doc.view(), 1, true, &ctx).unwrap().unwrap();
    assert_eq!((hit.matched.start, hit.wrapped), (4, false));
}
