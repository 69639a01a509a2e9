//! Resource ceilings: configured, explicit and environment-derived limits,
//! and how a stopped match is reported.

use pcre2_compat::config::{DEPTH_LIMIT_ENV, HEAP_LIMIT_ENV, MATCH_LIMIT_ENV};
use pcre2_compat::{
    Binding, CompatConfig, Error, Limit, MatchContext, MatchLimits, Pattern, Pcre2,
    SubstituteOptions,
};
use std::collections::HashMap;
use std::sync::Arc;

const CATASTROPHIC: &str = "(a+)+b";

fn engine() -> Binding {
    Arc::new(Pcre2::new())
}

fn catastrophic(config: CompatConfig) -> Pattern {
    Pattern::builder(CATASTROPHIC)
        .engine(engine())
        .config(config)
        .disable_start_optimization()
        .build()
        .unwrap()
}

#[test]
fn test_match_limit_stops_backtracking() {
    for jit in [true, false] {
        let pattern = catastrophic(CompatConfig::new().with_jit(jit).with_match_limit(500));
        let subject = "a".repeat(40);
        let err = pattern.matcher(&subject).unwrap().find().unwrap_err();
        assert!(err.is_limit_exceeded(), "jit={jit}: {err}");
        assert_eq!(err.limit(), Some(Limit::MatchSteps));
        assert_eq!(err.code(), -47);
    }
}

#[test]
fn test_start_optimization_can_answer_before_limits() {
    for jit in [true, false] {
        let pattern = Pattern::builder(CATASTROPHIC)
            .engine(engine())
            .config(CompatConfig::new().with_jit(jit).with_match_limit(500))
            .build()
            .unwrap();

        // No 'b' anywhere: the required-character check rejects the subject
        // before any backtracking, so no ceiling is reached.
        let subject = "a".repeat(40);
        let mut matcher = pattern.matcher(&subject).unwrap();
        assert!(!matcher.find().unwrap(), "jit={jit}");

        // With the 'b' present the engine has to backtrack and stops.
        let subject = format!("{}!b", "a".repeat(40));
        let err = pattern.matcher(&subject).unwrap().find().unwrap_err();
        assert_eq!(err.limit(), Some(Limit::MatchSteps), "jit={jit}");
    }
}

#[test]
fn test_depth_limit_interpreted() {
    let pattern = catastrophic(CompatConfig::interpreted().with_depth_limit(5));
    let err = pattern
        .matcher(&"a".repeat(12))
        .unwrap()
        .find()
        .unwrap_err();
    assert!(err.is_limit_exceeded());
}

#[test]
fn test_limit_error_is_not_a_failed_match() {
    let pattern = catastrophic(CompatConfig::new().with_match_limit(500));
    let subject = "a".repeat(24);
    let mut matcher = pattern.matcher(&subject).unwrap();
    assert!(matcher.find().is_err());
    assert!(matcher.range().is_none());

    // Input that fails quickly is an ordinary non-match.
    let mut matcher = pattern.matcher("c").unwrap();
    assert!(!matcher.find().unwrap());
}

#[test]
fn test_explicit_context_overrides_pattern() {
    let pattern = Pattern::builder(CATASTROPHIC)
        .engine(engine())
        .disable_start_optimization()
        .build()
        .unwrap();
    let subject = "a".repeat(12);

    assert!(!pattern.matcher(&subject).unwrap().find().unwrap());

    let mut context = MatchContext::new(pattern.engine()).unwrap();
    context.set_match_limit(500).unwrap();
    let mut matcher = pattern.matcher(&subject).unwrap();
    matcher.set_match_context(context).unwrap();
    let err = matcher.find().unwrap_err();
    assert_eq!(err.limit(), Some(Limit::MatchSteps));
}

#[test]
fn test_limits_from_json_config() {
    let config = CompatConfig::from_json(r#"{"matching": {"limits": {"match_limit": 500}}}"#)
        .unwrap();
    assert_eq!(config.matching.limits.match_limit, Some(500));
    assert_eq!(config.matching.limits.depth_limit, None);

    let pattern = catastrophic(config);
    assert!(pattern
        .matcher(&"a".repeat(24))
        .unwrap()
        .find()
        .unwrap_err()
        .is_limit_exceeded());

    assert!(matches!(
        CompatConfig::from_json("{not json"),
        Err(Error::Argument(_))
    ));
}

#[test]
fn test_substitution_respects_limits() {
    let pattern = catastrophic(CompatConfig::new().with_match_limit(500));
    let err = pattern
        .substitute(&"a".repeat(24), "x", SubstituteOptions::all())
        .unwrap_err();
    assert!(err.is_limit_exceeded());
}

#[test]
fn test_untrusted_input_compile_ceilings() {
    let deep = format!("{}a{}", "(".repeat(100), ")".repeat(100));
    let err = Pattern::builder(deep)
        .engine(engine())
        .config(CompatConfig::untrusted_input())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Compile(_)));

    let long = "a".repeat(20 * 1024);
    let err = Pattern::builder(long)
        .engine(engine())
        .config(CompatConfig::untrusted_input())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
}

#[test]
fn test_environment_lookup() {
    let env: HashMap<&str, &str> = HashMap::from([
        (MATCH_LIMIT_ENV, "1000"),
        (DEPTH_LIMIT_ENV, " 250 "),
        (HEAP_LIMIT_ENV, "lots"),
    ]);
    let limits = MatchLimits::from_lookup(|key| env.get(key).map(|v| v.to_string()));
    assert_eq!(limits.match_limit, Some(1000));
    assert_eq!(limits.depth_limit, Some(250));
    assert_eq!(limits.heap_limit_kib, None);

    let empty = MatchLimits::from_lookup(|_| None);
    assert!(empty.is_empty());
}
