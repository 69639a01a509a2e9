//! Configuration for pattern compilation and matching.
//!
//! Settings are grouped the way the engine consumes them: [`CompileConfig`]
//! is applied once per compiled pattern, [`MatchConfig`] to every match a
//! pattern's matchers run. [`CompatConfig`] bundles both and offers presets
//! for common deployments.
//!
//! Resource ceilings ([`MatchLimits`]) resolve in three tiers:
//!
//! 1. A match context handed to a matcher explicitly.
//! 2. Limits configured on the pattern through [`MatchConfig`].
//! 3. Ambient limits read once from the environment (see
//!    [`MatchLimits::from_env`]).
//!
//! The first tier that supplies anything wins; tiers are not merged.
//!
//! # Examples
//!
//! ```rust,ignore
//! use pcre2_compat::{CompatConfig, Pattern};
//!
//! // Tight ceilings for patterns or subjects from untrusted sources
//! let pattern = Pattern::builder("(a+)+b")
//!     .config(CompatConfig::untrusted_input())
//!     .build()?;
//! ```

use crate::engine::options::{
    NEWLINE_ANY, NEWLINE_ANYCRLF, NEWLINE_CR, NEWLINE_CRLF, NEWLINE_LF, NEWLINE_NUL,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable holding the ambient match step ceiling.
pub const MATCH_LIMIT_ENV: &str = "PCRE2_COMPAT_MATCH_LIMIT";
/// Environment variable holding the ambient backtracking depth ceiling.
pub const DEPTH_LIMIT_ENV: &str = "PCRE2_COMPAT_DEPTH_LIMIT";
/// Environment variable holding the ambient heap ceiling, in KiB.
pub const HEAP_LIMIT_ENV: &str = "PCRE2_COMPAT_HEAP_LIMIT_KIB";

/// Line terminator convention recognised by `^`, `$` and `.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Newline {
    Cr,
    Lf,
    CrLf,
    /// Any Unicode line terminator.
    Any,
    AnyCrLf,
    Nul,
}

impl Newline {
    pub fn native(self) -> u32 {
        match self {
            Newline::Cr => NEWLINE_CR,
            Newline::Lf => NEWLINE_LF,
            Newline::CrLf => NEWLINE_CRLF,
            Newline::Any => NEWLINE_ANY,
            Newline::AnyCrLf => NEWLINE_ANYCRLF,
            Newline::Nul => NEWLINE_NUL,
        }
    }

    pub fn from_native(value: u32) -> Option<Self> {
        match value {
            NEWLINE_CR => Some(Newline::Cr),
            NEWLINE_LF => Some(Newline::Lf),
            NEWLINE_CRLF => Some(Newline::CrLf),
            NEWLINE_ANY => Some(Newline::Any),
            NEWLINE_ANYCRLF => Some(Newline::AnyCrLf),
            NEWLINE_NUL => Some(Newline::Nul),
            _ => None,
        }
    }
}

/// Engine resource ceilings for a single match.
///
/// `None` leaves the engine's built-in default in place.
///
/// Ceilings only bound the work the engine actually does. Its start
/// optimizations, such as rejecting a subject that lacks a character every
/// match requires, can answer "no match" before any backtracking, so a
/// pathological pattern does not reach its ceiling on every input. Build
/// with [`PatternBuilder::disable_start_optimization`] to make every start
/// position run (and count against the ceilings).
///
/// ```no_run
/// use pcre2_compat::{CompatConfig, MatchLimits};
///
/// let limits = MatchLimits::none().with_match_limit(10_000).with_depth_limit(500);
/// assert!(!limits.is_empty());
///
/// let mut config = CompatConfig::new();
/// config.matching.limits = limits;
/// ```
///
/// [`PatternBuilder::disable_start_optimization`]: crate::PatternBuilder::disable_start_optimization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchLimits {
    /// Maximum number of internal match steps.
    pub match_limit: Option<u32>,
    /// Maximum backtracking depth.
    pub depth_limit: Option<u32>,
    /// Maximum heap used for backtracking, in KiB.
    pub heap_limit_kib: Option<u32>,
}

impl MatchLimits {
    pub fn none() -> Self {
        Self::default()
    }

    /// True when no ceiling is set.
    pub fn is_empty(&self) -> bool {
        self.match_limit.is_none() && self.depth_limit.is_none() && self.heap_limit_kib.is_none()
    }

    pub fn with_match_limit(mut self, limit: u32) -> Self {
        self.match_limit = Some(limit);
        self
    }

    pub fn with_depth_limit(mut self, limit: u32) -> Self {
        self.depth_limit = Some(limit);
        self
    }

    pub fn with_heap_limit_kib(mut self, kib: u32) -> Self {
        self.heap_limit_kib = Some(kib);
        self
    }

    /// Read ceilings from [`MATCH_LIMIT_ENV`], [`DEPTH_LIMIT_ENV`] and
    /// [`HEAP_LIMIT_ENV`]. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            let raw = lookup(key)?;
            match raw.trim().parse::<u32>() {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(key, value = %raw, error = %err, "ignoring unparseable limit");
                    None
                }
            }
        };

        Self {
            match_limit: read(MATCH_LIMIT_ENV),
            depth_limit: read(DEPTH_LIMIT_ENV),
            heap_limit_kib: read(HEAP_LIMIT_ENV),
        }
    }
}

/// Size of a dedicated JIT machine stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitStackConfig {
    pub start_size: usize,
    pub max_size: usize,
}

impl Default for JitStackConfig {
    fn default() -> Self {
        Self {
            start_size: 32 * 1024,
            max_size: 1024 * 1024,
        }
    }
}

/// Settings applied when a pattern is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Newline convention. `None` derives it from the pattern flags:
    /// `UNIX_LINES` selects [`Newline::Lf`], otherwise [`Newline::Any`].
    pub newline: Option<Newline>,
    /// Maximum parenthesis nesting depth.
    pub parens_nest_limit: Option<u32>,
    /// Maximum pattern length, in bytes.
    pub max_pattern_length: Option<usize>,
    /// JIT-compile patterns (and their anchored variants).
    pub jit: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            newline: None,
            parens_nest_limit: None,
            max_pattern_length: None,
            jit: true,
        }
    }
}

/// Settings applied to every match run by a pattern's matchers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub limits: MatchLimits,
    /// Give each match context its own JIT stack instead of the engine's
    /// small default one.
    pub jit_stack: Option<JitStackConfig>,
}

impl MatchConfig {
    /// True when nothing is configured and ambient limits apply.
    pub fn is_unset(&self) -> bool {
        self.limits.is_empty() && self.jit_stack.is_none()
    }
}

/// Complete compile and match configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatConfig {
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub matching: MatchConfig,
}

impl CompatConfig {
    /// Create a configuration with JIT on and engine-default ceilings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for patterns or subjects from untrusted sources.
    ///
    /// Caps match steps, depth and heap well below the engine defaults and
    /// bounds pattern size and nesting, trading worst-case throughput for
    /// predictable latency.
    ///
    /// Start optimizations stay on, so a subject the engine can reject up
    /// front returns no match without touching the ceilings; see
    /// [`MatchLimits`].
    pub fn untrusted_input() -> Self {
        Self {
            compile: CompileConfig {
                parens_nest_limit: Some(64),
                max_pattern_length: Some(16 * 1024),
                ..CompileConfig::default()
            },
            matching: MatchConfig {
                limits: MatchLimits {
                    match_limit: Some(100_000),
                    depth_limit: Some(10_000),
                    heap_limit_kib: Some(4 * 1024),
                },
                jit_stack: None,
            },
        }
    }

    /// Configuration for long subjects or deeply recursive patterns.
    ///
    /// Gives every matcher a large JIT stack so JIT matching does not run
    /// out of stack on heavy backtracking.
    pub fn high_throughput() -> Self {
        Self {
            compile: CompileConfig::default(),
            matching: MatchConfig {
                limits: MatchLimits::none(),
                jit_stack: Some(JitStackConfig {
                    start_size: 64 * 1024,
                    max_size: 8 * 1024 * 1024,
                }),
            },
        }
    }

    /// Configuration that never JIT-compiles.
    ///
    /// Useful when debugging, and on platforms where executable memory is
    /// restricted.
    pub fn interpreted() -> Self {
        Self {
            compile: CompileConfig {
                jit: false,
                ..CompileConfig::default()
            },
            matching: MatchConfig::default(),
        }
    }

    /// Parse a configuration from JSON. Missing sections take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| Error::Argument(format!("invalid configuration: {err}")))
    }

    pub fn with_jit(mut self, enable: bool) -> Self {
        self.compile.jit = enable;
        self
    }

    pub fn with_newline(mut self, newline: Newline) -> Self {
        self.compile.newline = Some(newline);
        self
    }

    pub fn with_parens_nest_limit(mut self, limit: u32) -> Self {
        self.compile.parens_nest_limit = Some(limit);
        self
    }

    pub fn with_max_pattern_length(mut self, length: usize) -> Self {
        self.compile.max_pattern_length = Some(length);
        self
    }

    pub fn with_match_limit(mut self, limit: u32) -> Self {
        self.matching.limits.match_limit = Some(limit);
        self
    }

    pub fn with_depth_limit(mut self, limit: u32) -> Self {
        self.matching.limits.depth_limit = Some(limit);
        self
    }

    pub fn with_heap_limit_kib(mut self, kib: u32) -> Self {
        self.matching.limits.heap_limit_kib = Some(kib);
        self
    }

    pub fn with_limits(mut self, limits: MatchLimits) -> Self {
        self.matching.limits = limits;
        self
    }

    pub fn with_jit_stack(mut self, start_size: usize, max_size: usize) -> Self {
        self.matching.jit_stack = Some(JitStackConfig {
            start_size,
            max_size,
        });
        self
    }
}
