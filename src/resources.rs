//! Owning wrappers around native engine objects.
//!
//! Every wrapper holds the binding that created its handle and releases the
//! handle through that binding exactly once, when the wrapper is dropped.
//! Nothing else ever frees a handle, so a native object lives exactly as
//! long as its wrapper.
//!
//! Thread-safety follows the engine's rules:
//! - [`Code`] and [`CompileContext`] are read-only after creation and may
//!   be shared between threads.
//! - [`MatchData`] is written by every match and needs `&mut` access.
//! - [`MatchContext`] is `Send` but not `Sync`; give each thread its own,
//!   via [`MatchContext::try_clone`] if needed.

use crate::config::{CompileConfig, JitStackConfig, MatchConfig, MatchLimits, Newline};
use crate::engine::options::{
    ERROR_NOMEMORY, ERROR_NOSUBSTRING, ERROR_NOUNIQUESUBSTRING, ERROR_UNAVAILABLE, ERROR_UNSET,
    INFO_CAPTURECOUNT, INFO_JITSIZE, INFO_SIZE,
};
use crate::engine::{
    CodeHandle, CompileContextHandle, ConvertContextHandle, Engine, JitStackHandle,
    MatchContextHandle, MatchDataHandle,
};
use crate::error::{CompileError, Error, Result, SubstringErrorKind};
use crate::limits;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

fn allocation_failure(what: &str) -> Error {
    Error::Internal {
        code: ERROR_NOMEMORY,
        message: format!("engine could not allocate {what}"),
    }
}

fn setter_result(engine: &dyn Engine, rc: i32, what: &str) -> Result<()> {
    if rc < 0 {
        Err(Error::Argument(format!(
            "{what}: {}",
            engine.error_message(rc)
        )))
    } else {
        Ok(())
    }
}

/// A compiled pattern.
pub struct Code {
    engine: Arc<dyn Engine>,
    handle: CodeHandle,
    jit: bool,
}

impl Code {
    /// Compile `pattern`. Failures carry the engine message and an excerpt
    /// of the pattern around the offending offset.
    pub fn compile(
        engine: &Arc<dyn Engine>,
        pattern: &str,
        options: u32,
        context: Option<&CompileContext>,
    ) -> Result<Self> {
        match engine.compile(pattern.as_bytes(), options, context.map(CompileContext::handle)) {
            Ok(handle) => Ok(Self::adopt(engine.clone(), handle)),
            Err(failure) => Err(CompileError::new(
                pattern,
                failure.offset,
                engine.error_message(failure.code),
                failure.code,
            )
            .into()),
        }
    }

    /// Take ownership of a handle produced by `engine`.
    pub(crate) fn adopt(engine: Arc<dyn Engine>, handle: CodeHandle) -> Self {
        Self {
            engine,
            handle,
            jit: false,
        }
    }

    /// JIT-compile the pattern. On failure the code stays usable through
    /// the interpreter and the native code is returned.
    pub fn jit_compile(&mut self, options: u32) -> std::result::Result<(), i32> {
        let rc = self.engine.jit_compile(self.handle, options);
        if rc < 0 {
            return Err(rc);
        }
        self.jit = true;
        Ok(())
    }

    pub fn is_jit(&self) -> bool {
        self.jit
    }

    pub fn handle(&self) -> CodeHandle {
        self.handle
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn capture_count(&self) -> Result<u32> {
        self.info_u32(INFO_CAPTURECOUNT)
    }

    pub fn info_u32(&self, what: u32) -> Result<u32> {
        self.engine
            .pattern_info_u32(self.handle, what)
            .map_err(|code| self.info_error(code, what))
    }

    pub fn info_size(&self, what: u32) -> Result<usize> {
        self.engine
            .pattern_info_size(self.handle, what)
            .map_err(|code| self.info_error(code, what))
    }

    /// Bytes used by the compiled pattern, excluding JIT code.
    pub fn size(&self) -> Result<usize> {
        self.info_size(INFO_SIZE)
    }

    /// Bytes of JIT code, 0 when the pattern was not JIT-compiled.
    pub fn jit_size(&self) -> Result<usize> {
        self.info_size(INFO_JITSIZE)
    }

    /// Named groups as `(name, group number)`, sorted by name.
    pub fn names(&self) -> Result<Vec<(String, u32)>> {
        let table = self
            .engine
            .name_table(self.handle)
            .map_err(|code| self.info_error(code, crate::engine::options::INFO_NAMETABLE))?;
        let mut names: Vec<(String, u32)> =
            table.into_iter().map(|(number, name)| (name, number)).collect();
        names.sort();
        Ok(names)
    }

    /// Copy the compiled pattern. JIT data is not copied.
    pub fn try_clone(&self) -> Result<Self> {
        let handle = self
            .engine
            .code_copy(self.handle)
            .ok_or_else(|| allocation_failure("a pattern copy"))?;
        Ok(Self::adopt(self.engine.clone(), handle))
    }

    fn info_error(&self, code: i32, what: u32) -> Error {
        Error::Internal {
            code,
            message: format!("pattern info {what}: {}", self.engine.error_message(code)),
        }
    }
}

impl Drop for Code {
    fn drop(&mut self) {
        self.engine.code_free(self.handle);
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("engine", &self.engine.name())
            .field("jit", &self.jit)
            .finish()
    }
}

/// Storage for the result of a match.
pub struct MatchData {
    engine: Arc<dyn Engine>,
    handle: MatchDataHandle,
    pairs: u32,
}

impl MatchData {
    /// Match data sized for every group of `code`.
    pub fn for_code(code: &Code) -> Result<Self> {
        let handle = code
            .engine
            .match_data_create_from_pattern(code.handle)
            .ok_or_else(|| allocation_failure("match data"))?;
        Ok(Self::adopt(code.engine.clone(), handle))
    }

    /// Match data holding `pairs` offset pairs.
    pub fn with_pairs(engine: &Arc<dyn Engine>, pairs: u32) -> Result<Self> {
        let handle = engine
            .match_data_create(pairs)
            .ok_or_else(|| allocation_failure("match data"))?;
        Ok(Self::adopt(engine.clone(), handle))
    }

    fn adopt(engine: Arc<dyn Engine>, handle: MatchDataHandle) -> Self {
        let pairs = engine.ovector_count(handle);
        Self {
            engine,
            handle,
            pairs,
        }
    }

    pub fn pair_count(&self) -> u32 {
        self.pairs
    }

    pub fn handle(&self) -> MatchDataHandle {
        self.handle
    }

    /// Handle for a call that writes match results.
    pub(crate) fn handle_mut(&mut self) -> MatchDataHandle {
        self.handle
    }

    /// The raw offset vector: start and end for each pair.
    pub fn ovector(&self) -> Vec<usize> {
        let mut out = vec![0; self.pairs as usize * 2];
        self.engine.read_ovector(self.handle, &mut out);
        out
    }

    /// Read the offset vector into caller storage sized by
    /// [`pair_count`](Self::pair_count).
    pub fn read_ovector_into(&self, out: &mut [usize]) {
        self.engine.read_ovector(self.handle, out);
    }

    /// Copy out group `number` of the last match.
    pub fn substring(&self, number: u32) -> Result<String> {
        let length = self
            .engine
            .substring_length_by_number(self.handle, number)
            .map_err(|code| substring_error(&*self.engine, code, false))?;
        let mut buffer = vec![0u8; length + 1];
        let copied = self
            .engine
            .substring_copy_by_number(self.handle, number, &mut buffer)
            .map_err(|code| substring_error(&*self.engine, code, false))?;
        into_string(buffer, copied)
    }

    /// Copy out the group called `name`. With duplicate names, the first
    /// set group carrying the name.
    pub fn substring_by_name(&self, name: &str) -> Result<String> {
        let length = self
            .engine
            .substring_length_by_name(self.handle, name)
            .map_err(|code| substring_error(&*self.engine, code, true))?;
        let mut buffer = vec![0u8; length + 1];
        let copied = self
            .engine
            .substring_copy_by_name(self.handle, name, &mut buffer)
            .map_err(|code| substring_error(&*self.engine, code, true))?;
        into_string(buffer, copied)
    }
}

impl Drop for MatchData {
    fn drop(&mut self) {
        self.engine.match_data_free(self.handle);
    }
}

impl fmt::Debug for MatchData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchData")
            .field("pairs", &self.pairs)
            .finish()
    }
}

fn into_string(mut buffer: Vec<u8>, length: usize) -> Result<String> {
    buffer.truncate(length);
    String::from_utf8(buffer).map_err(|err| Error::Internal {
        code: 0,
        message: format!("substring is not valid UTF-8: {err}"),
    })
}

pub(crate) fn substring_error(engine: &dyn Engine, code: i32, by_name: bool) -> Error {
    let kind = match code {
        ERROR_NOSUBSTRING if by_name => SubstringErrorKind::NoSuchName,
        ERROR_NOUNIQUESUBSTRING => SubstringErrorKind::AmbiguousName,
        ERROR_UNSET => SubstringErrorKind::Unset,
        ERROR_UNAVAILABLE => SubstringErrorKind::Unavailable,
        _ => SubstringErrorKind::NoSuchGroup,
    };
    Error::Substring {
        kind,
        code,
        message: engine.error_message(code),
    }
}

/// Compile-time settings.
pub struct CompileContext {
    engine: Arc<dyn Engine>,
    handle: CompileContextHandle,
}

impl CompileContext {
    pub fn new(engine: &Arc<dyn Engine>) -> Result<Self> {
        let handle = engine
            .compile_context_create()
            .ok_or_else(|| allocation_failure("a compile context"))?;
        Ok(Self {
            engine: engine.clone(),
            handle,
        })
    }

    /// A context carrying `config`, with `newline` used when the config
    /// leaves the newline convention open.
    pub fn from_config(
        engine: &Arc<dyn Engine>,
        config: &CompileConfig,
        newline: Newline,
    ) -> Result<Self> {
        let mut context = Self::new(engine)?;
        context.set_newline(config.newline.unwrap_or(newline))?;
        if let Some(limit) = config.parens_nest_limit {
            context.set_parens_nest_limit(limit)?;
        }
        if let Some(length) = config.max_pattern_length {
            context.set_max_pattern_length(length)?;
        }
        Ok(context)
    }

    pub fn set_newline(&mut self, newline: Newline) -> Result<()> {
        let rc = self.engine.set_newline(self.handle, newline.native());
        setter_result(&*self.engine, rc, "newline")
    }

    pub fn set_parens_nest_limit(&mut self, limit: u32) -> Result<()> {
        let rc = self.engine.set_parens_nest_limit(self.handle, limit);
        setter_result(&*self.engine, rc, "parenthesis nesting limit")
    }

    pub fn set_max_pattern_length(&mut self, length: usize) -> Result<()> {
        let rc = self.engine.set_max_pattern_length(self.handle, length);
        setter_result(&*self.engine, rc, "maximum pattern length")
    }

    pub fn try_clone(&self) -> Result<Self> {
        let handle = self
            .engine
            .compile_context_copy(self.handle)
            .ok_or_else(|| allocation_failure("a compile context copy"))?;
        Ok(Self {
            engine: self.engine.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> CompileContextHandle {
        self.handle
    }
}

impl Drop for CompileContext {
    fn drop(&mut self) {
        self.engine.compile_context_free(self.handle);
    }
}

impl fmt::Debug for CompileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileContext").finish_non_exhaustive()
    }
}

/// A machine stack for JIT-compiled matching.
pub struct JitStack {
    engine: Arc<dyn Engine>,
    handle: JitStackHandle,
}

impl JitStack {
    pub fn new(engine: &Arc<dyn Engine>, start_size: usize, max_size: usize) -> Result<Self> {
        if start_size == 0 || start_size > max_size {
            return Err(Error::Argument(format!(
                "JIT stack sizes must satisfy 0 < start ({start_size}) <= max ({max_size})"
            )));
        }
        let handle = engine
            .jit_stack_create(start_size, max_size)
            .ok_or_else(|| allocation_failure("a JIT stack"))?;
        Ok(Self {
            engine: engine.clone(),
            handle,
        })
    }

    pub fn from_config(engine: &Arc<dyn Engine>, config: &JitStackConfig) -> Result<Self> {
        Self::new(engine, config.start_size, config.max_size)
    }

    pub fn handle(&self) -> JitStackHandle {
        self.handle
    }
}

impl Drop for JitStack {
    fn drop(&mut self) {
        self.engine.jit_stack_free(self.handle);
    }
}

impl fmt::Debug for JitStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JitStack").finish_non_exhaustive()
    }
}

/// Match-time settings: resource ceilings and an optional JIT stack.
///
/// The engine mutates nothing in a context during a match, but contexts
/// are not documented as shareable, so this type is not `Sync`.
pub struct MatchContext {
    engine: Arc<dyn Engine>,
    handle: MatchContextHandle,
    limits: MatchLimits,
    jit_stack: Option<JitStack>,
    _not_sync: PhantomData<Cell<()>>,
}

impl MatchContext {
    pub fn new(engine: &Arc<dyn Engine>) -> Result<Self> {
        let handle = engine
            .match_context_create()
            .ok_or_else(|| allocation_failure("a match context"))?;
        Ok(Self {
            engine: engine.clone(),
            handle,
            limits: MatchLimits::none(),
            jit_stack: None,
            _not_sync: PhantomData,
        })
    }

    pub fn with_limits(engine: &Arc<dyn Engine>, limits: &MatchLimits) -> Result<Self> {
        let mut context = Self::new(engine)?;
        limits::apply_limits(&mut context, limits)?;
        Ok(context)
    }

    pub fn from_config(engine: &Arc<dyn Engine>, config: &MatchConfig) -> Result<Self> {
        let mut context = Self::with_limits(engine, &config.limits)?;
        if let Some(stack) = &config.jit_stack {
            context.assign_jit_stack(JitStack::from_config(engine, stack)?);
        }
        Ok(context)
    }

    pub fn set_match_limit(&mut self, limit: u32) -> Result<()> {
        let rc = self.engine.set_match_limit(self.handle, limit);
        setter_result(&*self.engine, rc, "match limit")?;
        self.limits.match_limit = Some(limit);
        Ok(())
    }

    pub fn set_depth_limit(&mut self, limit: u32) -> Result<()> {
        let rc = self.engine.set_depth_limit(self.handle, limit);
        setter_result(&*self.engine, rc, "depth limit")?;
        self.limits.depth_limit = Some(limit);
        Ok(())
    }

    pub fn set_heap_limit_kib(&mut self, kib: u32) -> Result<()> {
        let rc = self.engine.set_heap_limit(self.handle, kib);
        setter_result(&*self.engine, rc, "heap limit")?;
        self.limits.heap_limit_kib = Some(kib);
        Ok(())
    }

    /// Cap how far into the subject an unanchored match may start. Patterns
    /// must be built with [`PatternBuilder::use_offset_limit`]; matching any
    /// other pattern through this context fails.
    ///
    /// [`PatternBuilder::use_offset_limit`]: crate::PatternBuilder::use_offset_limit
    pub fn set_offset_limit(&mut self, limit: usize) -> Result<()> {
        let rc = self.engine.set_offset_limit(self.handle, limit);
        setter_result(&*self.engine, rc, "offset limit")
    }

    /// Ceilings set on this context.
    pub fn limits(&self) -> &MatchLimits {
        &self.limits
    }

    /// Use `stack` for JIT matching through this context. Replaces (and
    /// releases) any stack assigned before.
    pub fn assign_jit_stack(&mut self, stack: JitStack) {
        self.engine.jit_stack_assign(self.handle, Some(stack.handle()));
        self.jit_stack = Some(stack);
    }

    pub fn has_jit_stack(&self) -> bool {
        self.jit_stack.is_some()
    }

    /// Copy the context. The copy keeps the ceilings but falls back to the
    /// default JIT stack, since a stack cannot be shared between threads.
    pub fn try_clone(&self) -> Result<Self> {
        let handle = self
            .engine
            .match_context_copy(self.handle)
            .ok_or_else(|| allocation_failure("a match context copy"))?;
        self.engine.jit_stack_assign(handle, None);
        Ok(Self {
            engine: self.engine.clone(),
            handle,
            limits: self.limits,
            jit_stack: None,
            _not_sync: PhantomData,
        })
    }

    pub fn handle(&self) -> MatchContextHandle {
        self.handle
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }
}

impl Drop for MatchContext {
    fn drop(&mut self) {
        self.engine.match_context_free(self.handle);
        // The JIT stack, if any, is released after the context by field drop.
    }
}

impl fmt::Debug for MatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchContext")
            .field("limits", &self.limits)
            .field("jit_stack", &self.jit_stack.is_some())
            .finish()
    }
}

/// Pattern conversion settings.
pub struct ConvertContext {
    engine: Arc<dyn Engine>,
    handle: ConvertContextHandle,
}

impl ConvertContext {
    pub fn new(engine: &Arc<dyn Engine>) -> Result<Self> {
        let handle = engine
            .convert_context_create()
            .ok_or_else(|| allocation_failure("a convert context"))?;
        Ok(Self {
            engine: engine.clone(),
            handle,
        })
    }

    /// Path separator for glob conversion: one of `/`, `\` or `.`.
    pub fn set_glob_separator(&mut self, separator: char) -> Result<()> {
        let rc = self.engine.set_glob_separator(self.handle, separator as u32);
        setter_result(&*self.engine, rc, "glob separator")
    }

    /// Escape character for glob conversion; `None` disables escaping.
    pub fn set_glob_escape(&mut self, escape: Option<char>) -> Result<()> {
        let rc = self
            .engine
            .set_glob_escape(self.handle, escape.map_or(0, |c| c as u32));
        setter_result(&*self.engine, rc, "glob escape")
    }

    pub fn handle(&self) -> ConvertContextHandle {
        self.handle
    }
}

impl Drop for ConvertContext {
    fn drop(&mut self) {
        self.engine.convert_context_free(self.handle);
    }
}

impl fmt::Debug for ConvertContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::options::{ERROR_NOMATCH, UTF};
    use crate::engine::{Instrumented, Pcre2};

    fn instrumented() -> (Arc<Instrumented<Pcre2>>, Arc<dyn Engine>) {
        let counted = Arc::new(Instrumented::new(Pcre2::new()));
        let engine: Arc<dyn Engine> = counted.clone();
        (counted, engine)
    }

    #[test]
    fn test_code_freed_on_drop() {
        let (counted, engine) = instrumented();
        let code = Code::compile(&engine, "a+b", UTF, None).unwrap();
        assert_eq!(counted.counts().live_objects(), 1);
        drop(code);
        assert_eq!(counted.counts().codes_freed, 1);
        assert_eq!(counted.counts().live_objects(), 0);
    }

    #[test]
    fn test_compile_error_carries_excerpt() {
        let (_, engine) = instrumented();
        let err = Code::compile(&engine, "abc(def", UTF, None).unwrap_err();
        match err {
            Error::Compile(compile) => {
                assert_eq!(compile.pattern, "abc(def");
                assert_eq!(compile.offset, 7);
                assert_eq!(compile.excerpt, "abc(def");
                assert!(compile.code > 0);
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_names_sorted() {
        let (_, engine) = instrumented();
        let code = Code::compile(&engine, "(?<z>a)(?<b>b)(c)", UTF, None).unwrap();
        assert_eq!(code.capture_count().unwrap(), 3);
        assert_eq!(
            code.names().unwrap(),
            vec![("b".to_string(), 2), ("z".to_string(), 1)]
        );
    }

    #[test]
    fn test_match_data_substrings() {
        let (_, engine) = instrumented();
        let code = Code::compile(&engine, r"(?<word>\w+)(x)?", UTF, None).unwrap();
        let mut data = MatchData::for_code(&code).unwrap();
        assert_eq!(data.pair_count(), 3);

        let rc = engine.match_subject(code.handle(), b"  hi", 0, 0, data.handle_mut(), None);
        assert_eq!(rc, 2);
        assert_eq!(data.substring(1).unwrap(), "hi");
        assert_eq!(data.substring_by_name("word").unwrap(), "hi");
        assert_eq!(&data.ovector()[..4], &[2, 4, 2, 4]);

        let unset = data.substring(2).unwrap_err();
        assert!(matches!(
            unset,
            Error::Substring {
                kind: SubstringErrorKind::Unset,
                ..
            }
        ));
        assert!(matches!(
            data.substring(9).unwrap_err(),
            Error::Substring {
                kind: SubstringErrorKind::NoSuchGroup,
                ..
            }
        ));
        let missing = data.substring_by_name("nope").unwrap_err();
        assert!(matches!(
            missing,
            Error::Substring {
                kind: SubstringErrorKind::NoSuchName,
                ..
            }
        ));

        let rc = engine.match_subject(code.handle(), b"  ", 0, 0, data.handle_mut(), None);
        assert_eq!(rc, ERROR_NOMATCH);
    }

    #[test]
    fn test_match_context_records_limits() {
        let (_, engine) = instrumented();
        let limits = MatchLimits::none().with_match_limit(10).with_depth_limit(5);
        let context = MatchContext::with_limits(&engine, &limits).unwrap();
        assert_eq!(context.limits(), &limits);

        let copy = context.try_clone().unwrap();
        assert_eq!(copy.limits(), &limits);
        assert!(!copy.has_jit_stack());
    }

    #[test]
    fn test_match_context_owns_jit_stack() {
        let (counted, engine) = instrumented();
        let mut context = MatchContext::new(&engine).unwrap();
        context.assign_jit_stack(JitStack::new(&engine, 4096, 65536).unwrap());
        assert!(context.has_jit_stack());

        let copy = context.try_clone().unwrap();
        drop(context);
        drop(copy);

        let counts = counted.counts();
        assert_eq!(counts.jit_stacks_created, 1);
        assert_eq!(counts.jit_stacks_freed, 1);
        assert_eq!(counts.live_objects(), 0);
    }

    #[test]
    fn test_jit_stack_rejects_bad_sizes() {
        let (_, engine) = instrumented();
        assert!(matches!(
            JitStack::new(&engine, 0, 10),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            JitStack::new(&engine, 100, 10),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_compile_context_parens_limit() {
        let (_, engine) = instrumented();
        let mut context = CompileContext::new(&engine).unwrap();
        context.set_parens_nest_limit(3).unwrap();

        let deep = "((((((a))))))";
        assert!(Code::compile(&engine, "(a)", UTF, Some(&context)).is_ok());
        assert!(Code::compile(&engine, deep, UTF, Some(&context)).is_err());

        let copy = context.try_clone().unwrap();
        assert!(Code::compile(&engine, deep, UTF, Some(&copy)).is_err());
        assert!(Code::compile(&engine, deep, UTF, None).is_ok());
    }

    #[test]
    fn test_code_clone_is_independent() {
        let (counted, engine) = instrumented();
        let code = Code::compile(&engine, "x", UTF, None).unwrap();
        let copy = code.try_clone().unwrap();
        drop(code);
        assert_eq!(copy.capture_count().unwrap(), 0);
        drop(copy);
        assert_eq!(counted.counts().codes_freed, 2);
    }
}
