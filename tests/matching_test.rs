//! Integration tests for the three matching operations, groups, flags and
//! the pattern-level helpers built on them.

use pcre2_compat::{
    Binding, DfaOptions, Error, Flags, MatchContext, Pattern, Pcre2, SubstituteOptions,
};
use std::sync::Arc;

fn engine() -> Binding {
    Arc::new(Pcre2::new())
}

fn compile(regex: &str) -> Pattern {
    Pattern::builder(regex).engine(engine()).build().unwrap()
}

fn compile_with(regex: &str, flags: Flags) -> Pattern {
    Pattern::builder(regex)
        .flags(flags)
        .engine(engine())
        .build()
        .unwrap()
}

fn interpreted(regex: &str) -> Pattern {
    Pattern::builder(regex)
        .engine(engine())
        .jit(false)
        .build()
        .unwrap()
}

#[test]
fn test_phone_number_groups() {
    let pattern = compile(r"\d{3}-(\d{3})-(\d{4})");
    let mut matcher = pattern.matcher("Call 555-123-4567 today").unwrap();

    assert!(matcher.find().unwrap());
    assert_eq!(matcher.start(), Some(5));
    assert_eq!(matcher.end(), Some(17));
    assert_eq!(matcher.as_str(), Some("555-123-4567"));
    assert_eq!(matcher.group(1), Some("123"));
    assert_eq!(matcher.group(2), Some("4567"));
    assert_eq!(matcher.group(3), None);
    assert_eq!(matcher.group_count(), 2);

    assert!(!matcher.find().unwrap());
    assert_eq!(matcher.start(), None);
}

#[test]
fn test_whole_string_match() {
    let pattern = compile("^[a-z]+$");
    assert!(pattern.matcher("hello").unwrap().matches().unwrap());
    assert!(!pattern.matcher("Hello").unwrap().matches().unwrap());

    let caseless = compile_with("^[a-z]+$", Flags::CASE_INSENSITIVE);
    assert!(caseless.matcher("Hello").unwrap().matches().unwrap());
}

#[test]
fn test_matches_requires_entire_input() {
    for pattern in [compile("a|ab"), interpreted("a|ab")] {
        // The first alternative matches a prefix only; the whole-string
        // attempt must still find "ab".
        assert!(pattern.matcher("ab").unwrap().matches().unwrap());
        assert!(!pattern.matcher("abc").unwrap().matches().unwrap());
    }
}

#[test]
fn test_looking_at() {
    for pattern in [compile(r"\w+"), interpreted(r"\w+")] {
        let mut matcher = pattern.matcher("abc def").unwrap();
        assert!(matcher.looking_at().unwrap());
        assert_eq!(matcher.range(), Some(0..3));

        let mut matcher = pattern.matcher(" abc").unwrap();
        assert!(!matcher.looking_at().unwrap());
    }
}

#[test]
fn test_jit_and_interpreter_agree() {
    let subject = "id=17, id=4, name=x, id=256";
    let jit = compile(r"id=(\d+)");
    let plain = interpreted(r"id=(\d+)");

    assert_eq!(
        jit.find_all(subject).unwrap(),
        plain.find_all(subject).unwrap()
    );
    assert_eq!(jit.find_all(subject).unwrap(), vec![0..5, 7..11, 21..27]);
}

#[test]
fn test_empty_matches_advance() {
    let pattern = compile("a*");
    assert_eq!(
        pattern.find_all("baab").unwrap(),
        vec![0..0, 1..3, 3..3, 4..4]
    );
}

#[test]
fn test_multibyte_subject_offsets() {
    let pattern = compile("ü+");
    let mut matcher = pattern.matcher("grüüße").unwrap();
    assert!(matcher.find().unwrap());
    assert_eq!(matcher.as_str(), Some("üü"));
    assert_eq!(matcher.range(), Some(2..6));
}

#[test]
fn test_find_at() {
    let pattern = compile("o");
    let mut matcher = pattern.matcher("foo").unwrap();
    assert!(matcher.find_at(2).unwrap());
    assert_eq!(matcher.start(), Some(2));
    assert!(matches!(matcher.find_at(9), Err(Error::Argument(_))));
}

#[test]
fn test_named_groups() {
    let pattern = compile(r"(?<year>\d{4})-(?<month>\d{2})");
    assert_eq!(pattern.group_index("month").unwrap(), 2);
    assert!(pattern.group_index("day").is_err());

    let mut names = pattern.group_names();
    names.sort_unstable();
    assert_eq!(names, vec!["month", "year"]);

    let mut matcher = pattern.matcher("due 2024-06").unwrap();
    assert!(matcher.find().unwrap());
    assert_eq!(matcher.named_group("year").unwrap(), Some("2024"));
    assert_eq!(matcher.named_group("month").unwrap(), Some("06"));
}

#[test]
fn test_duplicate_names_pick_participating_group() {
    let pattern = Pattern::builder(r"(?<n>a)|(?<n>b)")
        .engine(engine())
        .allow_duplicate_names()
        .build()
        .unwrap();
    let mut matcher = pattern.matcher("b").unwrap();
    assert!(matcher.find().unwrap());
    assert_eq!(matcher.named_group("n").unwrap(), Some("b"));
}

#[test]
fn test_flags() {
    let multiline = compile_with("^b", Flags::MULTILINE);
    assert!(multiline.is_match("a\nb").unwrap());
    assert!(!compile("^b").is_match("a\nb").unwrap());

    let dotall = compile_with("a.b", Flags::DOTALL);
    assert!(dotall.is_match("a\nb").unwrap());
    assert!(!compile("a.b").is_match("a\nb").unwrap());

    // Only LF terminates a line with UNIX_LINES, so '.' matches CR.
    let unix = compile_with("a.b", Flags::UNIX_LINES);
    assert!(unix.is_match("a\rb").unwrap());
    assert!(!compile("a.b").is_match("a\rb").unwrap());

    let literal = compile_with("a.b(", Flags::LITERAL);
    assert!(literal.is_match("xa.b(").unwrap());
    assert!(!literal.is_match("axb(").unwrap());

    let comments = compile_with("a b # trailing comment", Flags::COMMENTS);
    assert!(comments.matcher("ab").unwrap().matches().unwrap());
}

#[test]
fn test_unsupported_flags_rejected() {
    let err = Pattern::builder("a")
        .flags(Flags::CANON_EQ)
        .engine(engine())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Argument(_)));
    assert!(Flags::from_bits(0x8000).is_err());
}

#[test]
fn test_compile_error_details() {
    let err = Pattern::builder("abc(def")
        .engine(engine())
        .build()
        .unwrap_err();
    match err {
        Error::Compile(details) => {
            assert_eq!(details.pattern, "abc(def");
            assert_eq!(details.offset, 7);
            assert!(details.code > 0);
            assert!(!details.message.is_empty());
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn test_quote() {
    let quoted = Pattern::quote(r"1+1=2 \E?");
    let pattern = compile(&quoted);
    assert!(pattern.matcher(r"1+1=2 \E?").unwrap().matches().unwrap());
    assert!(!pattern.is_match("11=2").unwrap());
}

#[test]
fn test_split() {
    let comma = compile(",");
    assert_eq!(comma.split("a,b,,c,,", 0).unwrap(), vec!["a", "b", "", "c"]);
    assert_eq!(
        comma.split("a,b,,c,,", -1).unwrap(),
        vec!["a", "b", "", "c", "", ""]
    );
    assert_eq!(comma.split("a,b,,c,,", 2).unwrap(), vec!["a", "b,,c,,"]);
    assert_eq!(comma.split("abc", 0).unwrap(), vec!["abc"]);

    let empty = compile("");
    assert_eq!(empty.split("abc", 0).unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_substitute() {
    let pattern = compile(r"(\w+)@(\w+)");
    let swapped = pattern
        .substitute("x@y and p@q", "$2 at $1", SubstituteOptions::all())
        .unwrap();
    assert_eq!(swapped, "y at x and q at p");

    let first = pattern
        .substitute("x@y and p@q", "${1}!", SubstituteOptions::first())
        .unwrap();
    assert_eq!(first, "x! and p@q");

    // Output longer than the initial buffer guess.
    let grow = compile("a");
    let long = grow
        .substitute(&"a".repeat(50), "0123456789", SubstituteOptions::all())
        .unwrap();
    assert_eq!(long.len(), 500);

    let err = pattern
        .substitute("x@y", "$9", SubstituteOptions::all())
        .unwrap_err();
    assert!(matches!(err, Error::Substitute { .. }));
}

#[test]
fn test_dfa_reports_all_lengths() {
    let pattern = compile("a+");
    let found = pattern
        .dfa_match("xaaa", DfaOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(found, vec![1..4, 1..3, 1..2]);

    let shortest = pattern
        .dfa_match("xaaa", DfaOptions::default().with_shortest(true))
        .unwrap()
        .unwrap();
    assert_eq!(shortest, vec![1..2]);

    assert!(pattern
        .dfa_match("bbb", DfaOptions::default())
        .unwrap()
        .is_none());
}

#[test]
fn test_hit_end_and_require_end() {
    let digits = compile(r"\d+");
    let mut matcher = digits.matcher("abc 123").unwrap();
    assert!(matcher.find().unwrap());
    assert!(matcher.hit_end());
    assert!(!matcher.require_end());

    // A failed search could have succeeded with more input.
    let mut matcher = digits.matcher("abc").unwrap();
    assert!(!matcher.find().unwrap());
    assert!(matcher.hit_end());

    let anchored = compile("end$");
    let mut matcher = anchored.matcher("the end").unwrap();
    assert!(matcher.find().unwrap());
    assert!(matcher.require_end());
    assert!(!matcher.hit_end());

    let absolute = compile(r"end\z");
    assert!(!absolute.could_invalidate());
}

#[test]
fn test_convenience_matches() {
    let engine = engine();
    let _scope = pcre2_compat::backend::enter_scope(engine);
    assert!(Pattern::matches(r"\d+", "2024").unwrap());
    assert!(!Pattern::matches(r"\d+", "2024a").unwrap());
}

#[test]
fn test_offset_limit() {
    for jit in [true, false] {
        let pattern = Pattern::builder("b")
            .engine(engine())
            .jit(jit)
            .use_offset_limit()
            .build()
            .unwrap();
        let mut context = MatchContext::new(pattern.engine()).unwrap();
        context.set_offset_limit(1).unwrap();

        let mut matcher = pattern.matcher("aab").unwrap();
        assert!(matcher.find().unwrap());
        matcher.reset();
        matcher.set_match_context(context).unwrap();
        assert!(!matcher.find().unwrap(), "jit={jit}");

        let mut matcher = pattern.matcher("ab").unwrap();
        let mut context = MatchContext::new(pattern.engine()).unwrap();
        context.set_offset_limit(1).unwrap();
        matcher.set_match_context(context).unwrap();
        assert!(matcher.find().unwrap());
        assert_eq!(matcher.start(), Some(1));
    }

    // Without the compile option the interpreter refuses the limit.
    let plain = interpreted("b");
    let mut context = MatchContext::new(plain.engine()).unwrap();
    context.set_offset_limit(1).unwrap();
    let mut matcher = plain.matcher("aab").unwrap();
    matcher.set_match_context(context).unwrap();
    assert!(matches!(matcher.find(), Err(Error::Match { .. })));
}

#[test]
fn test_compiled_size() {
    let jit = compile(r"(\w+)@(\w+)\.com");
    let plain = interpreted(r"(\w+)@(\w+)\.com");

    assert!(plain.primary_code().size().unwrap() > 0);
    assert_eq!(plain.primary_code().jit_size().unwrap(), 0);
    assert_eq!(
        plain.compiled_size().unwrap(),
        plain.primary_code().size().unwrap()
    );

    if jit.is_jit() {
        assert!(jit.primary_code().jit_size().unwrap() > 0);
        assert!(jit.compiled_size().unwrap() > plain.compiled_size().unwrap());
    }
}
