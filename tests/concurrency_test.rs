//! One pattern shared by many threads.

use pcre2_compat::{Binding, Instrumented, Pattern, Pcre2};
use rayon::prelude::*;
use std::sync::{Arc, Barrier};

#[test]
fn test_shared_pattern_parallel_matching() {
    let engine: Binding = Arc::new(Pcre2::new());
    let pattern = Pattern::builder(r"user-(\d+)")
        .engine(engine)
        .build()
        .unwrap();

    let subjects: Vec<String> = (0..2000).map(|i| format!("id user-{i} end")).collect();
    let ids: Vec<String> = subjects
        .par_iter()
        .map(|subject| {
            let mut matcher = pattern.matcher(subject).unwrap();
            assert!(matcher.find().unwrap());
            matcher.group(1).unwrap().to_string()
        })
        .collect();

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(id, &i.to_string());
    }
}

#[test]
fn test_variant_initialization_race() {
    let counted = Arc::new(Instrumented::new(Pcre2::new()));
    let engine: Binding = counted.clone();
    let pattern = Arc::new(
        Pattern::builder("[a-z]+[0-9]")
            .engine(engine)
            .build()
            .unwrap(),
    );

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pattern = Arc::clone(&pattern);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                pattern.matcher("abc1").unwrap().matches().unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    // Losing compilations are discarded, never leaked.
    let stored_variants = if pattern.is_jit() { 1 } else { 0 };
    let counts = counted.counts();
    assert_eq!(
        counts.codes_created - counts.codes_freed,
        1 + stored_variants
    );
}

#[test]
fn test_matchers_are_independent() {
    let engine: Binding = Arc::new(Pcre2::new());
    let pattern = Pattern::builder("o").engine(engine).build().unwrap();

    let mut first = pattern.matcher("foo").unwrap();
    let mut second = pattern.matcher("boo").unwrap();
    assert!(first.find().unwrap());
    assert!(second.find().unwrap());
    assert!(first.find().unwrap());
    assert_eq!(first.start(), Some(2));
    assert_eq!(second.start(), Some(1));
}
