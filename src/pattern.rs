//! Compiled patterns.
//!
//! A [`Pattern`] owns its primary compiled code plus up to three lazily
//! compiled variants:
//!
//! - **full-match**: anchored at both ends, used by [`Matcher::matches`].
//! - **prefix**: anchored at the start, used by [`Matcher::looking_at`].
//! - **region**: the pattern with `^` rebound to the search start, used
//!   when a matcher has anchoring bounds and a region that does not start
//!   at 0. `$` needs no rewrite: the matcher truncates the subject at the
//!   region end, where the engine's own `$` already matches.
//!
//! With JIT on, anchoring must be baked in at compile time because JIT
//! code ignores match-time anchoring options, hence the full-match and
//! prefix variants. With JIT off they are never compiled; the primary code
//! is reused with match-time anchoring options instead.
//!
//! Each variant is compiled at most once per pattern and is safe to
//! initialise from several threads: a thread that loses the race drops its
//! copy and uses the winner's.
//!
//! # Examples
//!
//! ```rust,ignore
//! use pcre2_compat::{Flags, Pattern};
//!
//! let pattern = Pattern::compile_with_flags(r"^hello", Flags::CASE_INSENSITIVE)?;
//! let mut matcher = pattern.matcher("Hello, world")?;
//! assert!(matcher.looking_at()?);
//! ```
//!
//! [`Matcher::matches`]: crate::Matcher::matches
//! [`Matcher::looking_at`]: crate::Matcher::looking_at

use crate::backend::{self, Binding};
use crate::config::{CompatConfig, CompileConfig, MatchConfig, Newline};
use crate::engine::options::{
    ANCHORED, CASELESS, DFA_SHORTEST, DOTALL, DUPNAMES, ENDANCHORED, ERROR_NOMATCH,
    ERROR_NOMEMORY, EXTENDED, JIT_COMPLETE, LITERAL, LITERAL_COMPATIBLE, MULTILINE,
    NO_START_OPTIMIZE, SUBSTITUTE_EXTENDED, SUBSTITUTE_GLOBAL, SUBSTITUTE_OVERFLOW_LENGTH,
    SUBSTITUTE_UNKNOWN_UNSET, SUBSTITUTE_UNSET_EMPTY, UCP, UNSET, USE_OFFSET_LIMIT, UTF,
};
use crate::error::{Error, Result};
use crate::limits;
use crate::matcher::Matcher;
use crate::resources::{Code, CompileContext, MatchContext, MatchData};
use crate::syntax::{self, Analysis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Range};
use std::sync::OnceLock;
use tracing::debug;

/// Pattern flags, with the bit values of `java.util.regex.Pattern`.
///
/// Flags combine with `|` and map onto native compile options when the
/// pattern is built. Every pattern is compiled in UTF mode whatever the
/// flags say.
///
/// # Example
/// ```rust,ignore
/// use pcre2_compat::{Flags, Pattern};
///
/// let flags = Flags::CASE_INSENSITIVE | Flags::MULTILINE;
/// let pattern = Pattern::compile_with_flags("^error", flags)?;
/// assert!(pattern.is_match("ok\nERROR: disk full")?);
///
/// // Bits as stored by callers that speak the Java API.
/// assert_eq!(Flags::from_bits(0x0a)?, flags);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(u32);

impl Flags {
    /// Only `\n` is a line terminator.
    pub const UNIX_LINES: Flags = Flags(0x01);
    /// Case-insensitive matching. Unicode-aware, since patterns are
    /// compiled in UTF mode.
    pub const CASE_INSENSITIVE: Flags = Flags(0x02);
    /// Whitespace and `#` comments are ignored in the pattern.
    pub const COMMENTS: Flags = Flags(0x04);
    /// `^` and `$` also match at line terminators.
    pub const MULTILINE: Flags = Flags(0x08);
    /// The pattern is matched as literal text.
    pub const LITERAL: Flags = Flags(0x10);
    /// `.` matches line terminators too.
    pub const DOTALL: Flags = Flags(0x20);
    /// Accepted for compatibility. Caseless matching already folds Unicode.
    pub const UNICODE_CASE: Flags = Flags(0x40);
    /// Canonical equivalence. Not supported by the engine; rejected.
    pub const CANON_EQ: Flags = Flags(0x80);
    /// Character classes and `\w`, `\d`, `\s`, `\b` follow Unicode.
    pub const UNICODE_CHARACTER_CLASS: Flags = Flags(0x100);

    const ALL: u32 = 0x1ff;

    /// No flags set.
    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Flags from raw bits. Bits outside the known flags are an
    /// [`Error::Argument`].
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL != 0 {
            return Err(Error::Argument(format!("unknown flag bits {:#x}", bits & !Self::ALL)));
        }
        Ok(Flags(bits))
    }

    /// True when every flag in `other` is set.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

/// Native compile options for `flags`. Patterns are always compiled in
/// UTF mode.
fn native_options(flags: Flags) -> Result<u32> {
    if flags.contains(Flags::CANON_EQ) {
        return Err(Error::Argument(
            "CANON_EQ is not supported by the engine".to_string(),
        ));
    }

    let mut options = UTF;
    if flags.contains(Flags::CASE_INSENSITIVE) {
        options |= CASELESS;
    }
    if flags.contains(Flags::COMMENTS) {
        options |= EXTENDED;
    }
    if flags.contains(Flags::MULTILINE) {
        options |= MULTILINE;
    }
    if flags.contains(Flags::DOTALL) {
        options |= DOTALL;
    }
    if flags.contains(Flags::UNICODE_CHARACTER_CLASS) {
        options |= UCP;
    }
    if flags.contains(Flags::LITERAL) {
        options = (options & LITERAL_COMPATIBLE) | LITERAL;
    }
    Ok(options)
}

/// Options for [`Pattern::substitute`].
///
/// Replacement strings use `$n`, `${n}` and `${name}` for groups and `$$`
/// for a literal dollar sign.
///
/// # Example
/// ```rust,ignore
/// use pcre2_compat::{Pattern, SubstituteOptions};
///
/// let pattern = Pattern::compile(r"(?<key>\w+)=(\d+)")?;
/// let out = pattern.substitute("a=1 b=2", "${key}:$2", SubstituteOptions::all())?;
/// assert_eq!(out, "a:1 b:2");
///
/// let once = pattern.substitute("a=1 b=2", "_", SubstituteOptions::first())?;
/// assert_eq!(once, "_ b=2");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstituteOptions {
    /// Replace every match rather than only the first.
    pub global: bool,
    /// Enable extended replacement syntax: backslash escapes, case
    /// folding and conditional substitutions.
    pub extended: bool,
    /// Unset groups insert nothing instead of failing.
    pub unset_empty: bool,
    /// Unknown groups are treated as unset instead of failing.
    pub unknown_unset: bool,
    /// Byte offset at which to start matching.
    pub start: usize,
}

impl SubstituteOptions {
    /// Replace every match.
    pub fn all() -> Self {
        Self {
            global: true,
            ..Self::default()
        }
    }

    /// Replace the first match only.
    pub fn first() -> Self {
        Self::default()
    }

    pub fn with_extended(mut self, enable: bool) -> Self {
        self.extended = enable;
        self
    }

    pub fn with_unset_empty(mut self, enable: bool) -> Self {
        self.unset_empty = enable;
        self
    }

    pub fn with_unknown_unset(mut self, enable: bool) -> Self {
        self.unknown_unset = enable;
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    fn native(&self) -> u32 {
        let mut options = SUBSTITUTE_OVERFLOW_LENGTH;
        if self.global {
            options |= SUBSTITUTE_GLOBAL;
        }
        if self.extended {
            options |= SUBSTITUTE_EXTENDED;
        }
        if self.unset_empty {
            options |= SUBSTITUTE_UNSET_EMPTY;
        }
        if self.unknown_unset {
            options |= SUBSTITUTE_UNKNOWN_UNSET;
        }
        options
    }
}

/// Options for [`Pattern::dfa_match`].
///
/// The DFA matcher reports every match length found at the leftmost
/// starting position, longest first, and never backtracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfaOptions {
    /// Stop at the shortest match instead of collecting all of them.
    pub shortest: bool,
    /// Number of ints in the DFA workspace. Too small a workspace fails
    /// the match rather than being grown.
    pub workspace_size: usize,
    /// Maximum number of alternative matches reported.
    pub max_matches: u32,
    /// Byte offset at which to start matching.
    pub start: usize,
}

impl Default for DfaOptions {
    fn default() -> Self {
        Self {
            shortest: false,
            workspace_size: 1000,
            max_matches: 10,
            start: 0,
        }
    }
}

impl DfaOptions {
    pub fn with_shortest(mut self, enable: bool) -> Self {
        self.shortest = enable;
        self
    }

    pub fn with_workspace_size(mut self, size: usize) -> Self {
        self.workspace_size = size;
        self
    }

    pub fn with_max_matches(mut self, max: u32) -> Self {
        self.max_matches = max;
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }
}

/// Builder for [`Pattern`].
///
/// Collects the source, flags, binding and configuration, then compiles
/// once in [`build`](Self::build). Without an explicit
/// [`engine`](Self::engine) the binding is resolved from the current
/// thread's scope, then the process default.
///
/// # Example
/// ```rust,ignore
/// use pcre2_compat::{CompatConfig, Flags, Pattern};
///
/// let pattern = Pattern::builder(r"(?<user>[\w.]+)@(?<host>[\w.]+)")
///     .flags(Flags::CASE_INSENSITIVE)
///     .config(CompatConfig::untrusted_input())
///     .jit(false)
///     .build()?;
/// assert_eq!(pattern.capture_count(), 2);
/// ```
#[derive(Clone)]
pub struct PatternBuilder {
    source: String,
    flags: Flags,
    engine: Option<Binding>,
    config: CompatConfig,
    extra_options: u32,
}

impl PatternBuilder {
    /// Start a builder for `source` with no flags and the default
    /// configuration.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: Flags::empty(),
            engine: None,
            config: CompatConfig::default(),
            extra_options: 0,
        }
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Compile with `engine` instead of resolving the scoped or default
    /// binding.
    pub fn engine(mut self, engine: Binding) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replace the whole configuration. Later `compile_config`,
    /// `match_config` and `jit` calls adjust it.
    pub fn config(mut self, config: CompatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn compile_config(mut self, config: CompileConfig) -> Self {
        self.config.compile = config;
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.config.matching = config;
        self
    }

    /// JIT-compile the pattern when the engine supports it. On by default.
    pub fn jit(mut self, enable: bool) -> Self {
        self.config.compile.jit = enable;
        self
    }

    /// Native compile options OR-ed into those derived from the flags.
    pub fn native_options(mut self, options: u32) -> Self {
        self.extra_options |= options;
        self
    }

    /// Allow several groups to share a name.
    pub fn allow_duplicate_names(self) -> Self {
        self.native_options(DUPNAMES)
    }

    /// Turn off the engine's start-of-match optimizations, so every start
    /// position is actually attempted.
    pub fn disable_start_optimization(self) -> Self {
        self.native_options(NO_START_OPTIMIZE)
    }

    /// Honour the offset limit of a match context set with
    /// [`MatchContext::set_offset_limit`].
    pub fn use_offset_limit(self) -> Self {
        self.native_options(USE_OFFSET_LIMIT)
    }

    /// Resolve the binding and compile.
    ///
    /// Fails with [`Error::Configuration`] when no binding is available,
    /// [`Error::Argument`] for unsupported flags and [`Error::Compile`] when
    /// the engine rejects the pattern. A failed JIT compile is not an
    /// error; the pattern runs interpreted.
    pub fn build(self) -> Result<Pattern> {
        let engine = backend::resolve_with(self.engine.as_ref())?;
        Pattern::assemble(
            engine,
            self.source,
            self.flags,
            self.extra_options,
            self.config,
            None,
        )
    }
}

/// A compiled regular expression.
///
/// A pattern is immutable and can be shared between threads; each thread
/// matches through its own [`Matcher`]. It keeps the binding it was
/// compiled with, so later matches use that binding whatever scope is
/// active at the time.
///
/// # Example
/// ```rust,ignore
/// use pcre2_compat::{backend, Pattern};
///
/// backend::install_native_default();
///
/// let pattern = Pattern::compile(r"\d{3}-(\d{4})")?;
/// let mut matcher = pattern.matcher("call 555-1234 now")?;
/// assert!(matcher.find()?);
/// assert_eq!(matcher.group(1), Some("1234"));
///
/// assert_eq!(pattern.split("a1b22c", 0)?, vec!["a1b22c"]);
/// assert_eq!(pattern.find_all("555-1234, 555-9876")?, vec![0..8, 10..18]);
/// ```
pub struct Pattern {
    engine: Binding,
    source: String,
    flags: Flags,
    extra_options: u32,
    options: u32,
    config: CompatConfig,
    compile_context: CompileContext,
    primary: Code,
    jit: bool,
    full_match: OnceLock<Code>,
    prefix_match: OnceLock<Code>,
    region: OnceLock<Code>,
    capture_count: usize,
    names: Vec<(String, u32)>,
    analysis: Analysis,
}

impl Pattern {
    /// Compile `regex` with no flags, using the scoped or default binding.
    pub fn compile(regex: &str) -> Result<Self> {
        Self::builder(regex).build()
    }

    /// Compile `regex` with `flags`, using the scoped or default binding.
    pub fn compile_with_flags(regex: &str, flags: Flags) -> Result<Self> {
        Self::builder(regex).flags(flags).build()
    }

    /// Start a [`PatternBuilder`] for `regex`.
    pub fn builder(regex: impl Into<String>) -> PatternBuilder {
        PatternBuilder::new(regex)
    }

    /// Compile `regex` and match it against the whole of `input`.
    pub fn matches(regex: &str, input: &str) -> Result<bool> {
        Self::compile(regex)?.matcher(input)?.matches()
    }

    /// A pattern matching `text` literally.
    pub fn quote(text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 4);
        out.push_str(r"\Q");
        let mut rest = text;
        while let Some(at) = rest.find(r"\E") {
            out.push_str(&rest[..at]);
            out.push_str(r"\E\\E\Q");
            rest = &rest[at + 2..];
        }
        out.push_str(rest);
        out.push_str(r"\E");
        out
    }

    /// Build a pattern around `primary`, compiling it first when `None`.
    pub(crate) fn assemble(
        engine: Binding,
        source: String,
        flags: Flags,
        extra_options: u32,
        config: CompatConfig,
        primary: Option<Code>,
    ) -> Result<Self> {
        let options = native_options(flags)? | extra_options;
        let default_newline = if flags.contains(Flags::UNIX_LINES) {
            Newline::Lf
        } else {
            Newline::Any
        };
        let compile_context = CompileContext::from_config(&engine, &config.compile, default_newline)?;

        let mut primary = match primary {
            Some(code) => code,
            None => Code::compile(&engine, &source, options, Some(&compile_context))?,
        };
        let jit = config.compile.jit && try_jit(&mut primary, &source);

        let capture_count = primary.capture_count()? as usize;
        let names = primary.names()?;
        let analysis = if flags.contains(Flags::LITERAL) {
            Analysis::default()
        } else {
            Analysis::of(&source, flags.contains(Flags::COMMENTS))
        };

        debug!(
            binding = engine.name(),
            pattern = %source,
            flags = flags.bits(),
            jit,
            capture_count,
            "compiled pattern"
        );

        Ok(Self {
            engine,
            source,
            flags,
            extra_options,
            options,
            config,
            compile_context,
            primary,
            jit,
            full_match: OnceLock::new(),
            prefix_match: OnceLock::new(),
            region: OnceLock::new(),
            capture_count,
            names,
            analysis,
        })
    }

    /// The pattern text as given to the builder.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Native options OR-ed in through [`PatternBuilder::native_options`].
    pub fn extra_options(&self) -> u32 {
        self.extra_options
    }

    /// The native compile options of the primary code.
    pub fn native_options(&self) -> u32 {
        self.options
    }

    /// The binding the pattern was compiled with.
    pub fn engine(&self) -> &Binding {
        &self.engine
    }

    pub fn config(&self) -> &CompatConfig {
        &self.config
    }

    pub fn match_config(&self) -> &MatchConfig {
        &self.config.matching
    }

    /// True when the primary code was JIT-compiled.
    pub fn is_jit(&self) -> bool {
        self.jit
    }

    /// Number of capturing groups, not counting group 0.
    pub fn capture_count(&self) -> usize {
        self.capture_count
    }

    /// Group names, sorted.
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(|(name, _)| name.as_str()).collect();
        names.dedup();
        names
    }

    /// Numbers of the groups called `name`, in ascending order.
    pub(crate) fn group_numbers(&self, name: &str) -> Vec<usize> {
        let mut numbers: Vec<usize> = self
            .names
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, number)| *number as usize)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// The number of the group called `name`. Fails for unknown names and
    /// for names shared by several groups.
    pub fn group_index(&self, name: &str) -> Result<usize> {
        let rc = self
            .engine
            .substring_number_from_name(self.primary.handle(), name);
        if rc < 0 {
            return Err(crate::resources::substring_error(&*self.engine, rc, true));
        }
        Ok(rc as usize)
    }

    /// True when a match ending at the end of input might extend with more
    /// input.
    pub fn could_extend(&self) -> bool {
        self.analysis.could_extend
    }

    /// True when more input might turn a match into a non-match.
    pub fn could_invalidate(&self) -> bool {
        self.analysis.could_invalidate
    }

    pub(crate) fn has_start_anchor(&self) -> bool {
        self.analysis.has_start_anchor
    }

    pub fn primary_code(&self) -> &Code {
        &self.primary
    }

    /// Bytes held by the primary code, JIT code included. Lazily compiled
    /// variants are not counted.
    pub fn compiled_size(&self) -> Result<usize> {
        Ok(self.primary.size()? + self.primary.jit_size()?)
    }

    /// Code anchored at both ends. Without JIT this is the primary code,
    /// anchored at match time instead.
    pub fn full_match_variant(&self) -> Result<&Code> {
        if !self.jit {
            return Ok(&self.primary);
        }
        init_once(&self.full_match, || {
            self.compile_variant(&self.source, ANCHORED | ENDANCHORED, "full-match")
        })
    }

    /// Code anchored at the start. Without JIT this is the primary code,
    /// anchored at match time instead.
    pub fn prefix_match_variant(&self) -> Result<&Code> {
        if !self.jit {
            return Ok(&self.primary);
        }
        init_once(&self.prefix_match, || {
            self.compile_variant(&self.source, ANCHORED, "prefix")
        })
    }

    pub(crate) fn region_variant(&self) -> Result<&Code> {
        init_once(&self.region, || {
            let rewrite = syntax::rewrite_for_region(
                &self.source,
                self.flags.contains(Flags::COMMENTS),
                self.flags.contains(Flags::MULTILINE),
            );
            self.compile_variant(&rewrite.pattern, 0, "region")
        })
    }

    fn compile_variant(&self, text: &str, extra: u32, variant: &'static str) -> Result<Code> {
        let mut code = Code::compile(
            &self.engine,
            text,
            self.options | extra,
            Some(&self.compile_context),
        )
        .map_err(|err| Error::Internal {
            code: err.code(),
            message: format!("{variant} variant of a compiled pattern failed to compile: {err}"),
        })?;
        if self.jit {
            try_jit(&mut code, text);
        }
        debug!(pattern = %self.source, variant, "compiled pattern variant");
        Ok(code)
    }

    /// A matcher over `subject`.
    pub fn matcher<'s>(&self, subject: &'s str) -> Result<Matcher<'_, 's>> {
        Matcher::new(self, subject)
    }

    /// True when the pattern matches anywhere in `subject`.
    pub fn is_match(&self, subject: &str) -> Result<bool> {
        self.matcher(subject)?.find()
    }

    /// Byte ranges of all successive matches in `subject`.
    pub fn find_all(&self, subject: &str) -> Result<Vec<Range<usize>>> {
        let mut matcher = self.matcher(subject)?;
        let mut found = Vec::new();
        while matcher.find()? {
            if let Some(range) = matcher.range() {
                found.push(range);
            }
        }
        Ok(found)
    }

    /// Split `input` around matches.
    ///
    /// With `limit > 0` at most `limit` pieces are returned, the last one
    /// holding the unsplit rest. With `limit == 0` trailing empty pieces
    /// are dropped; with `limit < 0` they are kept. A zero-width match at
    /// the start of `input` never produces a leading empty piece.
    pub fn split<'s>(&self, input: &'s str, limit: i32) -> Result<Vec<&'s str>> {
        let limited = limit > 0;
        let max_pieces = if limited { limit as usize } else { usize::MAX };
        let mut pieces = Vec::new();
        let mut index = 0;
        let mut matcher = self.matcher(input)?;

        while matcher.find()? {
            let Some(found) = matcher.range() else {
                break;
            };
            if !limited || pieces.len() < max_pieces - 1 {
                if index == 0 && found.start == 0 && found.is_empty() {
                    continue;
                }
                pieces.push(&input[index..found.start]);
                index = found.end;
            } else {
                break;
            }
        }

        if index == 0 {
            return Ok(vec![input]);
        }
        pieces.push(&input[index..]);

        if limit == 0 {
            while pieces.last().map_or(false, |piece| piece.is_empty()) {
                pieces.pop();
            }
        }
        Ok(pieces)
    }

    /// Replace matches in `subject` with `replacement`.
    pub fn substitute(
        &self,
        subject: &str,
        replacement: &str,
        options: SubstituteOptions,
    ) -> Result<String> {
        let context = limits::context_for(&self.engine, self.match_config())?;
        self.substitute_with(subject, replacement, options, context.as_ref())
    }

    pub(crate) fn substitute_with(
        &self,
        subject: &str,
        replacement: &str,
        options: SubstituteOptions,
        context: Option<&MatchContext>,
    ) -> Result<String> {
        check_offset(subject, options.start)?;
        let native = options.native();
        let context = context.map(MatchContext::handle);

        let mut output = vec![0u8; subject.len() + replacement.len() + 1];
        let (mut rc, mut length) = self.engine.substitute(
            self.primary.handle(),
            subject.as_bytes(),
            options.start,
            native,
            None,
            context,
            replacement.as_bytes(),
            &mut output,
        );
        if rc == ERROR_NOMEMORY {
            // The reported length is exactly what the output needs.
            debug!(needed = length, "growing substitution buffer");
            output = vec![0u8; length];
            (rc, length) = self.engine.substitute(
                self.primary.handle(),
                subject.as_bytes(),
                options.start,
                native,
                None,
                context,
                replacement.as_bytes(),
                &mut output,
            );
        }
        if rc < 0 {
            return Err(limits::substitute_error(&*self.engine, rc));
        }

        output.truncate(length);
        String::from_utf8(output).map_err(|err| Error::Internal {
            code: 0,
            message: format!("substitution produced invalid UTF-8: {err}"),
        })
    }

    /// Run the alternative (DFA) matching algorithm at or after
    /// `options.start`. Returns every match found at the first matching
    /// position, longest first, or `None` when nothing matches.
    pub fn dfa_match(&self, subject: &str, options: DfaOptions) -> Result<Option<Vec<Range<usize>>>> {
        check_offset(subject, options.start)?;
        if options.workspace_size == 0 || options.max_matches == 0 {
            return Err(Error::Argument(
                "DFA workspace and match count must be non-zero".to_string(),
            ));
        }

        let mut data = MatchData::with_pairs(&self.engine, options.max_matches)?;
        let mut workspace = vec![0i32; options.workspace_size];
        let context = limits::context_for(&self.engine, self.match_config())?;
        let native = if options.shortest { DFA_SHORTEST } else { 0 };

        let rc = self.engine.dfa_match(
            self.primary.handle(),
            subject.as_bytes(),
            options.start,
            native,
            data.handle_mut(),
            context.as_ref().map(MatchContext::handle),
            &mut workspace,
        );
        if rc == ERROR_NOMATCH {
            return Ok(None);
        }
        if rc < 0 {
            return Err(limits::match_error(&*self.engine, rc));
        }

        // 0 means more matches were found than the match data can hold.
        let count = if rc == 0 {
            data.pair_count() as usize
        } else {
            rc as usize
        };
        let ovector = data.ovector();
        let ranges = ovector
            .chunks_exact(2)
            .take(count)
            .filter(|pair| pair[0] != UNSET)
            .map(|pair| pair[0]..pair[1])
            .collect();
        Ok(Some(ranges))
    }
}

/// JIT-compile `code`, falling back to the interpreter on failure.
fn try_jit(code: &mut Code, pattern: &str) -> bool {
    match code.jit_compile(JIT_COMPLETE) {
        Ok(()) => true,
        Err(rc) => {
            debug!(pattern, rc, "JIT compilation failed; using the interpreter");
            false
        }
    }
}

fn init_once<T, F>(cell: &OnceLock<T>, build: F) -> Result<&T>
where
    F: FnOnce() -> Result<T>,
{
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = build()?;
    if cell.set(value).is_err() {
        debug!("discarded a concurrently compiled pattern variant");
    }
    cell.get().ok_or_else(|| Error::Internal {
        code: 0,
        message: "pattern variant missing after initialization".to_string(),
    })
}

pub(crate) fn check_offset(subject: &str, offset: usize) -> Result<()> {
    if offset > subject.len() || !subject.is_char_boundary(offset) {
        return Err(Error::Argument(format!(
            "offset {offset} is not a character boundary of a {}-byte subject",
            subject.len()
        )));
    }
    Ok(())
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .field("jit", &self.jit)
            .field("capture_count", &self.capture_count)
            .finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, Instrumented, Pcre2};
    use std::sync::Arc;

    fn engine() -> Binding {
        Arc::new(Pcre2::new())
    }

    fn compile(regex: &str) -> Pattern {
        Pattern::builder(regex).engine(engine()).build().unwrap()
    }

    #[test]
    fn test_native_options() {
        assert_eq!(native_options(Flags::empty()).unwrap(), UTF);
        assert_eq!(
            native_options(Flags::CASE_INSENSITIVE | Flags::MULTILINE).unwrap(),
            UTF | CASELESS | MULTILINE
        );
        assert_eq!(
            native_options(Flags::LITERAL | Flags::COMMENTS | Flags::CASE_INSENSITIVE).unwrap(),
            UTF | CASELESS | LITERAL
        );
        assert!(matches!(
            native_options(Flags::CANON_EQ),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_flags_from_bits() {
        let flags = Flags::from_bits(0x0a).unwrap();
        assert!(flags.contains(Flags::CASE_INSENSITIVE));
        assert!(flags.contains(Flags::MULTILINE));
        assert!(!flags.contains(Flags::DOTALL));
        assert!(Flags::from_bits(0x1000).is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(Pattern::quote("a.b"), r"\Qa.b\E");
        assert_eq!(Pattern::quote(r"x\Ey"), r"\Qx\E\\E\Qy\E");

        let quoted = compile(&Pattern::quote(r"1+1=2 \E?"));
        assert!(quoted.matcher(r"1+1=2 \E?").unwrap().matches().unwrap());
        assert!(!quoted.matcher("11=2").unwrap().matches().unwrap());
    }

    #[test]
    fn test_capture_count_and_names() {
        let pattern = compile(r"(?<area>\d{3})-(\d{3})-(?<line>\d{4})");
        assert_eq!(pattern.capture_count(), 3);
        assert_eq!(pattern.group_names(), vec!["area", "line"]);
        assert_eq!(pattern.group_index("line").unwrap(), 3);
        assert!(pattern.group_index("nope").is_err());
    }

    #[test]
    fn test_duplicate_names() {
        let pattern = Pattern::builder("(?<n>a)|(?<n>b)")
            .engine(engine())
            .allow_duplicate_names()
            .build()
            .unwrap();
        assert_eq!(pattern.group_names(), vec!["n"]);
        assert_eq!(pattern.group_numbers("n"), vec![1, 2]);
        assert!(matches!(
            pattern.group_index("n"),
            Err(Error::Substring {
                kind: crate::error::SubstringErrorKind::AmbiguousName,
                ..
            })
        ));
    }

    #[test]
    fn test_variants_compiled_once() {
        let counted = Arc::new(Instrumented::new(Pcre2::new()));
        let binding: Binding = counted.clone();
        let pattern = Pattern::builder("a+b").engine(binding).build().unwrap();
        assert_eq!(counted.counts().compiles, 1);

        let first = pattern.full_match_variant().unwrap().handle();
        let second = pattern.full_match_variant().unwrap().handle();
        assert_eq!(first, second);
        pattern.prefix_match_variant().unwrap();
        pattern.prefix_match_variant().unwrap();

        let expected = if pattern.is_jit() { 3 } else { 1 };
        assert_eq!(counted.counts().compiles, expected);
    }

    #[test]
    fn test_no_variants_without_jit() {
        let counted = Arc::new(Instrumented::new(Pcre2::new()));
        let binding: Binding = counted.clone();
        let pattern = Pattern::builder("a+b")
            .engine(binding)
            .jit(false)
            .build()
            .unwrap();

        assert!(!pattern.is_jit());
        let full = pattern.full_match_variant().unwrap().handle();
        let prefix = pattern.prefix_match_variant().unwrap().handle();
        assert_eq!(full, pattern.primary_code().handle());
        assert_eq!(prefix, pattern.primary_code().handle());
        assert_eq!(counted.counts().compiles, 1);
        assert_eq!(counted.counts().jit_compiles, 0);
    }

    #[test]
    fn test_patterns_release_all_native_objects() {
        let counted = Arc::new(Instrumented::new(Pcre2::new()));
        let binding: Binding = counted.clone();
        {
            let pattern = Pattern::builder("^(x+)$").engine(binding).build().unwrap();
            pattern.full_match_variant().unwrap();
            let mut matcher = pattern.matcher("xxx").unwrap();
            assert!(matcher.find().unwrap());
        }
        assert_eq!(counted.counts().live_objects(), 0);
    }

    #[test]
    fn test_compile_error() {
        let err = Pattern::builder("a)").engine(engine()).build().unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.code() > 0);
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
        let out = pattern
            .substitute("a@b c@d", "$2 at $1", SubstituteOptions::all())
            .unwrap();
        assert_eq!(out, "b at a d at c");

        let out = pattern
            .substitute("a@b c@d", "<$0>", SubstituteOptions::first())
            .unwrap();
        assert_eq!(out, "<a@b> c@d");
    }

    #[test]
    fn test_substitute_grows_output() {
        let pattern = compile("x");
        let long = "y".repeat(500);
        let out = pattern
            .substitute("xxx", &long, SubstituteOptions::all())
            .unwrap();
        assert_eq!(out.len(), 1500);
    }

    #[test]
    fn test_substitute_bad_replacement() {
        let pattern = compile("a");
        let err = pattern
            .substitute("a", "$9", SubstituteOptions::first())
            .unwrap_err();
        assert!(matches!(err, Error::Substitute { .. }));
    }

    #[test]
    fn test_dfa_match_reports_all_lengths() {
        let pattern = compile("<.*>");
        let found = pattern
            .dfa_match("<a> <b>", DfaOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(found, vec![0..7, 0..3]);

        let shortest = pattern
            .dfa_match("<a> <b>", DfaOptions::default().with_shortest(true))
            .unwrap()
            .unwrap();
        assert_eq!(shortest, vec![0..3]);

        assert_eq!(pattern.dfa_match("none", DfaOptions::default()).unwrap(), None);
    }

    #[test]
    fn test_dfa_workspace_too_small() {
        let pattern = compile("(a|b|c|d|e)*(f|g|h)*z");
        let err = pattern
            .dfa_match(
                "abcdefghabcdefghz",
                DfaOptions::default().with_workspace_size(10),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Match { .. }));
    }

    #[test]
    fn test_offset_validation() {
        let pattern = compile("b");
        assert!(matches!(
            pattern.substitute("éb", "x", SubstituteOptions::all().with_start(1)),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            pattern.dfa_match("b", DfaOptions::default().with_start(5)),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_engine_name_visible() {
        let pattern = compile("x");
        assert_eq!(pattern.engine().name(), "pcre2");
    }
}
