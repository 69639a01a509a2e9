//! Engine binding resolution through registries and thread scopes.

use pcre2_compat::backend::{self, current_scope, enter_scope, same_binding, with_engine};
use pcre2_compat::{Binding, Error, Instrumented, Pattern, Pcre2, Registry};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

fn native() -> Binding {
    Arc::new(Pcre2::new())
}

#[test]
fn test_no_binding_is_a_configuration_error() {
    let registry = Registry::new();
    let err = std::thread::spawn(move || registry.resolve().unwrap_err())
        .join()
        .unwrap();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_scope_restored_after_panic() {
    let default = backend::install_native_default();
    let outer = native();

    {
        let _guard = enter_scope(outer.clone());
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            with_engine(native(), || {
                assert!(!same_binding(&backend::resolve().unwrap(), &outer));
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert!(same_binding(&current_scope().unwrap(), &outer));
        assert!(same_binding(&backend::resolve().unwrap(), &outer));
    }

    assert!(current_scope().is_none());
    assert!(same_binding(&backend::resolve().unwrap(), &default));
}

#[test]
fn test_guards_dropped_out_of_order() {
    let default = backend::install_native_default();
    let outer = native();
    let inner = native();

    let outer_guard = enter_scope(outer);
    let inner_guard = enter_scope(inner.clone());
    assert!(same_binding(&backend::resolve().unwrap(), &inner));

    // Ending the outer scope ends the one nested in it too.
    drop(outer_guard);
    assert!(same_binding(&backend::resolve().unwrap(), &default));

    // The stale inner guard must not bring the outer binding back.
    drop(inner_guard);
    assert!(current_scope().is_none());
    assert!(same_binding(&backend::resolve().unwrap(), &default));
}

#[test]
fn test_patterns_keep_the_binding_they_were_built_with() {
    let counted = Arc::new(Instrumented::new(Pcre2::new()));
    let scoped: Binding = counted.clone();

    let pattern = with_engine(scoped.clone(), || Pattern::compile("a+").unwrap());
    assert!(same_binding(pattern.engine(), &scoped));

    // Matching after the scope ended still uses the pattern's binding.
    let before = counted.counts().matches;
    assert!(pattern.is_match("baa").unwrap());
    assert!(counted.counts().matches > before);
}

#[test]
fn test_explicit_engine_beats_scope() {
    let scoped = native();
    let explicit = native();
    let _guard = enter_scope(scoped);
    let pattern = Pattern::builder("x")
        .engine(explicit.clone())
        .build()
        .unwrap();
    assert!(same_binding(pattern.engine(), &explicit));
}

#[test]
fn test_process_default() {
    let installed = backend::install_native_default();
    let again = backend::install_native_default();
    assert!(same_binding(&installed, &again));

    // A fresh thread has no scope and falls back to the default.
    let resolved = std::thread::spawn(|| backend::resolve().unwrap())
        .join()
        .unwrap();
    assert!(same_binding(&resolved, &installed));
}

#[test]
fn test_injected_registry() {
    let default = native();
    let registry = Registry::with_default(default.clone());
    let resolved = std::thread::spawn(move || registry.resolve().unwrap())
        .join()
        .unwrap();
    assert!(same_binding(&resolved, &default));
}

#[test]
fn test_bindings_give_identical_results() {
    let counted = Arc::new(Instrumented::new(Pcre2::new()));
    let bindings: [Binding; 2] = [native(), counted.clone()];
    let subject = "id=17 name=ann\nid=4 name=bob";

    let outcomes: Vec<_> = bindings
        .iter()
        .map(|binding| {
            let pattern = Pattern::builder(r"^id=(\d+) name=(?<name>\w+)$")
                .flags(pcre2_compat::Flags::MULTILINE)
                .engine(binding.clone())
                .build()
                .unwrap();
            let mut matcher = pattern.matcher(subject).unwrap();
            let mut found = Vec::new();
            while matcher.find().unwrap() {
                found.push((
                    matcher.captures(),
                    matcher.named_group("name").unwrap().map(str::to_string),
                    matcher.hit_end(),
                    matcher.require_end(),
                ));
            }
            matcher.region(15, subject.len()).unwrap();
            let whole = matcher.matches().unwrap();
            (found, whole, pattern.find_all(subject).unwrap())
        })
        .collect();

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0].0.len(), 2);
    assert!(outcomes[0].1);

    // The second binding really served its pattern.
    let counts = counted.counts();
    assert!(counts.compiles >= 1);
    assert!(counts.matches >= 4);
}
