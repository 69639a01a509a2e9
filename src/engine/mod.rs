//! The native engine contract.
//!
//! [`Engine`] is the fixed operation set a backtracking/DFA engine binding
//! implements. Everything above this module speaks to the engine only
//! through it, on opaque numeric handles, so the rest of the crate is
//! agnostic to which binding services a call.
//!
//! Two bindings ship with the crate:
//! - [`Pcre2`] - the native PCRE2 library.
//! - [`Instrumented`] - wraps another binding, traces every call and
//!   counts the ones that create or release native resources.
//!
//! Operations that write into caller storage (ovector reads, substring
//! copies, substitution output, DFA workspace) expect that storage to be
//! preallocated by the caller to a size obtained from a prior query.

pub mod instrumented;
pub mod options;
mod pcre2;

pub use self::instrumented::{CallCounts, Instrumented};
pub use self::pcre2::Pcre2;

use crate::error::{Error, Result};
use serde::Serialize;
use std::num::NonZeroUsize;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Wrap a raw handle value; 0 is the engine's "no handle".
            pub fn from_raw(raw: usize) -> Option<Self> {
                NonZeroUsize::new(raw).map(Self)
            }

            pub fn as_raw(self) -> usize {
                self.0.get()
            }
        }
    };
}

native_handle!(
    /// A compiled pattern.
    CodeHandle
);
native_handle!(
    /// Match result storage (the ovector and friends).
    MatchDataHandle
);
native_handle!(
    /// Match-time settings: resource ceilings, offset limit, JIT stack.
    MatchContextHandle
);
native_handle!(
    /// Compile-time settings: newline convention, nesting limit.
    CompileContextHandle
);
native_handle!(
    /// Pattern conversion settings.
    ConvertContextHandle
);
native_handle!(
    /// Machine stack used by JIT-compiled code.
    JitStackHandle
);

/// A native failure that reports an offset alongside its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFailure {
    pub code: i32,
    pub offset: usize,
}

/// The native engine contract.
///
/// Return conventions follow the engine: negative integers are error codes,
/// [`options::ERROR_NOMATCH`] is the ordinary "no match" outcome, and
/// creation functions return `None` when the engine could not allocate.
pub trait Engine: Send + Sync {
    /// Binding name used in logs.
    fn name(&self) -> &str;

    // Configuration
    fn config(&self, what: u32) -> std::result::Result<u32, i32>;
    fn version(&self) -> String;
    fn error_message(&self, code: i32) -> String;

    // Compile contexts
    fn compile_context_create(&self) -> Option<CompileContextHandle>;
    fn compile_context_copy(&self, ctx: CompileContextHandle) -> Option<CompileContextHandle>;
    fn compile_context_free(&self, ctx: CompileContextHandle);
    fn set_newline(&self, ctx: CompileContextHandle, newline: u32) -> i32;
    fn set_parens_nest_limit(&self, ctx: CompileContextHandle, limit: u32) -> i32;
    fn set_max_pattern_length(&self, ctx: CompileContextHandle, length: usize) -> i32;

    // Match contexts
    fn match_context_create(&self) -> Option<MatchContextHandle>;
    fn match_context_copy(&self, ctx: MatchContextHandle) -> Option<MatchContextHandle>;
    fn match_context_free(&self, ctx: MatchContextHandle);
    fn set_match_limit(&self, ctx: MatchContextHandle, limit: u32) -> i32;
    fn set_depth_limit(&self, ctx: MatchContextHandle, limit: u32) -> i32;
    fn set_heap_limit(&self, ctx: MatchContextHandle, kib: u32) -> i32;
    fn set_offset_limit(&self, ctx: MatchContextHandle, limit: usize) -> i32;

    // Compiled patterns
    fn compile(
        &self,
        pattern: &[u8],
        options: u32,
        ctx: Option<CompileContextHandle>,
    ) -> std::result::Result<CodeHandle, NativeFailure>;
    fn code_copy(&self, code: CodeHandle) -> Option<CodeHandle>;
    fn code_free(&self, code: CodeHandle);
    fn pattern_info_u32(&self, code: CodeHandle, what: u32) -> std::result::Result<u32, i32>;
    fn pattern_info_size(&self, code: CodeHandle, what: u32) -> std::result::Result<usize, i32>;
    /// Named groups as `(group number, name)` in the engine's table order.
    fn name_table(&self, code: CodeHandle) -> std::result::Result<Vec<(u32, String)>, i32>;

    // JIT
    fn jit_compile(&self, code: CodeHandle, options: u32) -> i32;
    fn jit_match(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
    ) -> i32;
    fn jit_stack_create(&self, start_size: usize, max_size: usize) -> Option<JitStackHandle>;
    /// Attach `stack` to `ctx`, or restore the default stack with `None`.
    fn jit_stack_assign(&self, ctx: MatchContextHandle, stack: Option<JitStackHandle>);
    fn jit_stack_free(&self, stack: JitStackHandle);

    // Match data
    fn match_data_create(&self, pairs: u32) -> Option<MatchDataHandle>;
    fn match_data_create_from_pattern(&self, code: CodeHandle) -> Option<MatchDataHandle>;
    fn match_data_free(&self, data: MatchDataHandle);
    fn ovector_count(&self, data: MatchDataHandle) -> u32;
    /// Copy up to `out.len()` ovector slots into `out`.
    fn read_ovector(&self, data: MatchDataHandle, out: &mut [usize]);

    // Matching
    fn match_subject(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
    ) -> i32;
    #[allow(clippy::too_many_arguments)]
    fn dfa_match(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
        workspace: &mut [i32],
    ) -> i32;

    // Substrings. Copies need room for a terminating zero.
    fn substring_number_from_name(&self, code: CodeHandle, name: &str) -> i32;
    fn substring_length_by_number(
        &self,
        data: MatchDataHandle,
        number: u32,
    ) -> std::result::Result<usize, i32>;
    fn substring_copy_by_number(
        &self,
        data: MatchDataHandle,
        number: u32,
        buffer: &mut [u8],
    ) -> std::result::Result<usize, i32>;
    fn substring_length_by_name(
        &self,
        data: MatchDataHandle,
        name: &str,
    ) -> std::result::Result<usize, i32>;
    fn substring_copy_by_name(
        &self,
        data: MatchDataHandle,
        name: &str,
        buffer: &mut [u8],
    ) -> std::result::Result<usize, i32>;

    /// Returns `(result code, output length)`. With
    /// [`options::SUBSTITUTE_OVERFLOW_LENGTH`] and an undersized `output`,
    /// the result is [`options::ERROR_NOMEMORY`] and the length is the size
    /// the output buffer needs.
    #[allow(clippy::too_many_arguments)]
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
    ) -> (i32, usize);

    // Serialization
    fn serialize_encode(&self, codes: &[CodeHandle]) -> std::result::Result<Vec<u8>, i32>;
    /// The data is trusted: the engine does not validate it beyond its header.
    fn serialize_decode(&self, bytes: &[u8]) -> std::result::Result<Vec<CodeHandle>, i32>;
    fn serialize_code_count(&self, bytes: &[u8]) -> i32;

    // Pattern conversion
    fn convert_context_create(&self) -> Option<ConvertContextHandle>;
    fn convert_context_free(&self, ctx: ConvertContextHandle);
    fn set_glob_separator(&self, ctx: ConvertContextHandle, separator: u32) -> i32;
    fn set_glob_escape(&self, ctx: ConvertContextHandle, escape: u32) -> i32;
    fn pattern_convert(
        &self,
        pattern: &[u8],
        options: u32,
        ctx: Option<ConvertContextHandle>,
    ) -> std::result::Result<Vec<u8>, NativeFailure>;
}

impl std::fmt::Debug for dyn Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("name", &self.name()).finish()
    }
}

/// Build-time facts about an engine binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub binding: String,
    pub version: String,
    pub jit: bool,
    pub unicode: bool,
    pub match_limit: u32,
    pub depth_limit: u32,
    pub heap_limit_kib: u32,
    pub newline: u32,
    pub parens_limit: u32,
}

impl EngineInfo {
    pub fn query(engine: &dyn Engine) -> Result<Self> {
        let config = |what: u32| {
            engine.config(what).map_err(|code| Error::Internal {
                code,
                message: format!("configuration query {what}: {}", engine.error_message(code)),
            })
        };

        Ok(Self {
            binding: engine.name().to_string(),
            version: engine.version(),
            jit: config(options::CONFIG_JIT)? == 1,
            unicode: config(options::CONFIG_UNICODE)? == 1,
            match_limit: config(options::CONFIG_MATCHLIMIT)?,
            depth_limit: config(options::CONFIG_DEPTHLIMIT)?,
            heap_limit_kib: config(options::CONFIG_HEAPLIMIT)?,
            newline: config(options::CONFIG_NEWLINE)?,
            parens_limit: config(options::CONFIG_PARENSLIMIT)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_rejects_zero() {
        assert!(CodeHandle::from_raw(0).is_none());
        let handle = CodeHandle::from_raw(0x1000).unwrap();
        assert_eq!(handle.as_raw(), 0x1000);
    }

    #[test]
    fn test_engine_info_query() {
        let engine = Pcre2::new();
        let info = EngineInfo::query(&engine).unwrap();

        assert_eq!(info.binding, "pcre2");
        assert!(info.version.starts_with("10."));
        assert!(info.unicode);
        assert!(info.match_limit > 0);
        assert!(info.parens_limit > 0);
    }
}
