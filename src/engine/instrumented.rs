//! A tracing, counting decorator over another binding.
//!
//! [`Instrumented`] forwards every call unchanged and emits a `trace` event
//! per native call. Calls that compile patterns, run matches, or create and
//! release native resources are also counted, so callers can observe how
//! often the engine is actually reached (variant caching, leak checks).

use super::{
    CodeHandle, CompileContextHandle, ConvertContextHandle, Engine, JitStackHandle,
    MatchContextHandle, MatchDataHandle, NativeFailure,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Point-in-time copy of an [`Instrumented`] binding's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub compiles: usize,
    pub jit_compiles: usize,
    pub matches: usize,
    pub codes_created: usize,
    pub codes_freed: usize,
    pub match_data_created: usize,
    pub match_data_freed: usize,
    pub contexts_created: usize,
    pub contexts_freed: usize,
    pub jit_stacks_created: usize,
    pub jit_stacks_freed: usize,
}

impl CallCounts {
    /// Native objects created but not yet released.
    pub fn live_objects(&self) -> usize {
        let created = self.codes_created
            + self.match_data_created
            + self.contexts_created
            + self.jit_stacks_created;
        let freed =
            self.codes_freed + self.match_data_freed + self.contexts_freed + self.jit_stacks_freed;
        created.saturating_sub(freed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    compiles: AtomicUsize,
    jit_compiles: AtomicUsize,
    matches: AtomicUsize,
    codes_created: AtomicUsize,
    codes_freed: AtomicUsize,
    match_data_created: AtomicUsize,
    match_data_freed: AtomicUsize,
    contexts_created: AtomicUsize,
    contexts_freed: AtomicUsize,
    jit_stacks_created: AtomicUsize,
    jit_stacks_freed: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn bump_if<T>(counter: &AtomicUsize, created: &Option<T>) {
    if created.is_some() {
        bump(counter);
    }
}

/// Wraps `E`, tracing and counting the calls made through it.
///
/// It is a binding in its own right: patterns built with it hold the
/// wrapper, and every native call they make passes through it. Results are
/// whatever `E` returns.
///
/// # Example
/// ```rust,ignore
/// use pcre2_compat::{Binding, Instrumented, Pattern, Pcre2};
/// use std::sync::Arc;
///
/// let counted = Arc::new(Instrumented::new(Pcre2::new()));
/// let binding: Binding = counted.clone();
/// {
///     let pattern = Pattern::builder("a+").engine(binding).build()?;
///     assert!(pattern.is_match("baa")?);
/// }
/// let counts = counted.counts();
/// assert_eq!(counts.compiles, 1);
/// assert_eq!(counts.live_objects(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Instrumented<E> {
    inner: E,
    counters: Counters,
}

impl<E: Engine> Instrumented<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            counters: Counters::default(),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn counts(&self) -> CallCounts {
        let c = &self.counters;
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        CallCounts {
            compiles: load(&c.compiles),
            jit_compiles: load(&c.jit_compiles),
            matches: load(&c.matches),
            codes_created: load(&c.codes_created),
            codes_freed: load(&c.codes_freed),
            match_data_created: load(&c.match_data_created),
            match_data_freed: load(&c.match_data_freed),
            contexts_created: load(&c.contexts_created),
            contexts_freed: load(&c.contexts_freed),
            jit_stacks_created: load(&c.jit_stacks_created),
            jit_stacks_freed: load(&c.jit_stacks_freed),
        }
    }
}

impl<E: Engine> Engine for Instrumented<E> {
    fn name(&self) -> &str {
        "instrumented"
    }

    fn config(&self, what: u32) -> Result<u32, i32> {
        trace!(binding = self.inner.name(), what, "config");
        self.inner.config(what)
    }

    fn version(&self) -> String {
        self.inner.version()
    }

    fn error_message(&self, code: i32) -> String {
        self.inner.error_message(code)
    }

    fn compile_context_create(&self) -> Option<CompileContextHandle> {
        trace!(binding = self.inner.name(), "compile_context_create");
        let ctx = self.inner.compile_context_create();
        bump_if(&self.counters.contexts_created, &ctx);
        ctx
    }

    fn compile_context_copy(&self, ctx: CompileContextHandle) -> Option<CompileContextHandle> {
        trace!(binding = self.inner.name(), "compile_context_copy");
        let copy = self.inner.compile_context_copy(ctx);
        bump_if(&self.counters.contexts_created, &copy);
        copy
    }

    fn compile_context_free(&self, ctx: CompileContextHandle) {
        trace!(binding = self.inner.name(), "compile_context_free");
        bump(&self.counters.contexts_freed);
        self.inner.compile_context_free(ctx)
    }

    fn set_newline(&self, ctx: CompileContextHandle, newline: u32) -> i32 {
        trace!(binding = self.inner.name(), newline, "set_newline");
        self.inner.set_newline(ctx, newline)
    }

    fn set_parens_nest_limit(&self, ctx: CompileContextHandle, limit: u32) -> i32 {
        trace!(binding = self.inner.name(), limit, "set_parens_nest_limit");
        self.inner.set_parens_nest_limit(ctx, limit)
    }

    fn set_max_pattern_length(&self, ctx: CompileContextHandle, length: usize) -> i32 {
        trace!(binding = self.inner.name(), length, "set_max_pattern_length");
        self.inner.set_max_pattern_length(ctx, length)
    }

    fn match_context_create(&self) -> Option<MatchContextHandle> {
        trace!(binding = self.inner.name(), "match_context_create");
        let ctx = self.inner.match_context_create();
        bump_if(&self.counters.contexts_created, &ctx);
        ctx
    }

    fn match_context_copy(&self, ctx: MatchContextHandle) -> Option<MatchContextHandle> {
        trace!(binding = self.inner.name(), "match_context_copy");
        let copy = self.inner.match_context_copy(ctx);
        bump_if(&self.counters.contexts_created, &copy);
        copy
    }

    fn match_context_free(&self, ctx: MatchContextHandle) {
        trace!(binding = self.inner.name(), "match_context_free");
        bump(&self.counters.contexts_freed);
        self.inner.match_context_free(ctx)
    }

    fn set_match_limit(&self, ctx: MatchContextHandle, limit: u32) -> i32 {
        trace!(binding = self.inner.name(), limit, "set_match_limit");
        self.inner.set_match_limit(ctx, limit)
    }

    fn set_depth_limit(&self, ctx: MatchContextHandle, limit: u32) -> i32 {
        trace!(binding = self.inner.name(), limit, "set_depth_limit");
        self.inner.set_depth_limit(ctx, limit)
    }

    fn set_heap_limit(&self, ctx: MatchContextHandle, kib: u32) -> i32 {
        trace!(binding = self.inner.name(), kib, "set_heap_limit");
        self.inner.set_heap_limit(ctx, kib)
    }

    fn set_offset_limit(&self, ctx: MatchContextHandle, limit: usize) -> i32 {
        trace!(binding = self.inner.name(), limit, "set_offset_limit");
        self.inner.set_offset_limit(ctx, limit)
    }

    fn compile(
        &self,
        pattern: &[u8],
        options: u32,
        ctx: Option<CompileContextHandle>,
    ) -> Result<CodeHandle, NativeFailure> {
        trace!(
            binding = self.inner.name(),
            pattern = %String::from_utf8_lossy(pattern),
            options = format_args!("{options:#x}"),
            "compile"
        );
        bump(&self.counters.compiles);
        let code = self.inner.compile(pattern, options, ctx);
        if code.is_ok() {
            bump(&self.counters.codes_created);
        }
        code
    }

    fn code_copy(&self, code: CodeHandle) -> Option<CodeHandle> {
        trace!(binding = self.inner.name(), "code_copy");
        let copy = self.inner.code_copy(code);
        bump_if(&self.counters.codes_created, &copy);
        copy
    }

    fn code_free(&self, code: CodeHandle) {
        trace!(binding = self.inner.name(), "code_free");
        bump(&self.counters.codes_freed);
        self.inner.code_free(code)
    }

    fn pattern_info_u32(&self, code: CodeHandle, what: u32) -> Result<u32, i32> {
        self.inner.pattern_info_u32(code, what)
    }

    fn pattern_info_size(&self, code: CodeHandle, what: u32) -> Result<usize, i32> {
        self.inner.pattern_info_size(code, what)
    }

    fn name_table(&self, code: CodeHandle) -> Result<Vec<(u32, String)>, i32> {
        self.inner.name_table(code)
    }

    fn jit_compile(&self, code: CodeHandle, options: u32) -> i32 {
        trace!(binding = self.inner.name(), options, "jit_compile");
        bump(&self.counters.jit_compiles);
        self.inner.jit_compile(code, options)
    }

    fn jit_match(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
    ) -> i32 {
        bump(&self.counters.matches);
        let rc = self.inner.jit_match(code, subject, start, options, data, ctx);
        trace!(binding = self.inner.name(), start, options, rc, "jit_match");
        rc
    }

    fn jit_stack_create(&self, start_size: usize, max_size: usize) -> Option<JitStackHandle> {
        trace!(binding = self.inner.name(), start_size, max_size, "jit_stack_create");
        let stack = self.inner.jit_stack_create(start_size, max_size);
        bump_if(&self.counters.jit_stacks_created, &stack);
        stack
    }

    fn jit_stack_assign(&self, ctx: MatchContextHandle, stack: Option<JitStackHandle>) {
        trace!(binding = self.inner.name(), assigned = stack.is_some(), "jit_stack_assign");
        self.inner.jit_stack_assign(ctx, stack)
    }

    fn jit_stack_free(&self, stack: JitStackHandle) {
        trace!(binding = self.inner.name(), "jit_stack_free");
        bump(&self.counters.jit_stacks_freed);
        self.inner.jit_stack_free(stack)
    }

    fn match_data_create(&self, pairs: u32) -> Option<MatchDataHandle> {
        trace!(binding = self.inner.name(), pairs, "match_data_create");
        let data = self.inner.match_data_create(pairs);
        bump_if(&self.counters.match_data_created, &data);
        data
    }

    fn match_data_create_from_pattern(&self, code: CodeHandle) -> Option<MatchDataHandle> {
        trace!(binding = self.inner.name(), "match_data_create_from_pattern");
        let data = self.inner.match_data_create_from_pattern(code);
        bump_if(&self.counters.match_data_created, &data);
        data
    }

    fn match_data_free(&self, data: MatchDataHandle) {
        trace!(binding = self.inner.name(), "match_data_free");
        bump(&self.counters.match_data_freed);
        self.inner.match_data_free(data)
    }

    fn ovector_count(&self, data: MatchDataHandle) -> u32 {
        self.inner.ovector_count(data)
    }

    fn read_ovector(&self, data: MatchDataHandle, out: &mut [usize]) {
        self.inner.read_ovector(data, out)
    }

    fn match_subject(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
    ) -> i32 {
        bump(&self.counters.matches);
        let rc = self.inner.match_subject(code, subject, start, options, data, ctx);
        trace!(binding = self.inner.name(), start, options, rc, "match");
        rc
    }

    fn dfa_match(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
        workspace: &mut [i32],
    ) -> i32 {
        bump(&self.counters.matches);
        let rc = self
            .inner
            .dfa_match(code, subject, start, options, data, ctx, workspace);
        trace!(binding = self.inner.name(), start, options, rc, "dfa_match");
        rc
    }

    fn substring_number_from_name(&self, code: CodeHandle, name: &str) -> i32 {
        self.inner.substring_number_from_name(code, name)
    }

    fn substring_length_by_number(&self, data: MatchDataHandle, number: u32) -> Result<usize, i32> {
        self.inner.substring_length_by_number(data, number)
    }

    fn substring_copy_by_number(
        &self,
        data: MatchDataHandle,
        number: u32,
        buffer: &mut [u8],
    ) -> Result<usize, i32> {
        self.inner.substring_copy_by_number(data, number, buffer)
    }

    fn substring_length_by_name(&self, data: MatchDataHandle, name: &str) -> Result<usize, i32> {
        self.inner.substring_length_by_name(data, name)
    }

    fn substring_copy_by_name(
        &self,
        data: MatchDataHandle,
        name: &str,
        buffer: &mut [u8],
    ) -> Result<usize, i32> {
        self.inner.substring_copy_by_name(data, name, buffer)
    }

    fn substitute(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: Option<MatchDataHandle>,
        ctx: Option<MatchContextHandle>,
        replacement: &[u8],
        output: &mut [u8],
    ) -> (i32, usize) {
        bump(&self.counters.matches);
        let (rc, length) = self
            .inner
            .substitute(code, subject, start, options, data, ctx, replacement, output);
        trace!(binding = self.inner.name(), options, rc, length, "substitute");
        (rc, length)
    }

    fn serialize_encode(&self, codes: &[CodeHandle]) -> Result<Vec<u8>, i32> {
        trace!(binding = self.inner.name(), count = codes.len(), "serialize_encode");
        self.inner.serialize_encode(codes)
    }

    fn serialize_decode(&self, bytes: &[u8]) -> Result<Vec<CodeHandle>, i32> {
        trace!(binding = self.inner.name(), size = bytes.len(), "serialize_decode");
        let codes = self.inner.serialize_decode(bytes);
        if let Ok(codes) = &codes {
            self.counters
                .codes_created
                .fetch_add(codes.len(), Ordering::Relaxed);
        }
        codes
    }

    fn serialize_code_count(&self, bytes: &[u8]) -> i32 {
        self.inner.serialize_code_count(bytes)
    }

    fn convert_context_create(&self) -> Option<ConvertContextHandle> {
        trace!(binding = self.inner.name(), "convert_context_create");
        let ctx = self.inner.convert_context_create();
        bump_if(&self.counters.contexts_created, &ctx);
        ctx
    }

    fn convert_context_free(&self, ctx: ConvertContextHandle) {
        trace!(binding = self.inner.name(), "convert_context_free");
        bump(&self.counters.contexts_freed);
        self.inner.convert_context_free(ctx)
    }

    fn set_glob_separator(&self, ctx: ConvertContextHandle, separator: u32) -> i32 {
        self.inner.set_glob_separator(ctx, separator)
    }

    fn set_glob_escape(&self, ctx: ConvertContextHandle, escape: u32) -> i32 {
        self.inner.set_glob_escape(ctx, escape)
    }

    fn pattern_convert(
        &self,
        pattern: &[u8],
        options: u32,
        ctx: Option<ConvertContextHandle>,
    ) -> Result<Vec<u8>, NativeFailure> {
        trace!(binding = self.inner.name(), options, "pattern_convert");
        self.inner.pattern_convert(pattern, options, ctx)
    }
}
