//! Error types for the pcre2-compat crate.
//!
//! Every native failure is translated into [`Error`] at the point of the
//! native call. Each variant carries the originating native code so callers
//! can dispatch programmatically; [`Error::code`] returns 0 for failures that
//! did not originate in the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Number of characters shown on either side of a compile error offset.
const EXCERPT_CONTEXT: usize = 12;

/// The resource ceiling that stopped a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limit {
    /// Maximum number of internal match steps (backtracking points).
    MatchSteps,
    /// Maximum backtracking depth.
    Depth,
    /// Maximum heap memory for backtracking, in KiB.
    Heap,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::MatchSteps => write!(f, "match step limit"),
            Limit::Depth => write!(f, "depth limit"),
            Limit::Heap => write!(f, "heap limit"),
        }
    }
}

/// Refinement of a failed substring lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstringErrorKind {
    /// The group number is out of range for the pattern.
    NoSuchGroup,
    /// No group carries the requested name.
    NoSuchName,
    /// The name is shared by several groups and none of them is set.
    AmbiguousName,
    /// The group exists but did not participate in the match.
    Unset,
    /// The group exists but the match data is too small to hold it.
    Unavailable,
}

impl fmt::Display for SubstringErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstringErrorKind::NoSuchGroup => write!(f, "no such group"),
            SubstringErrorKind::NoSuchName => write!(f, "no such name"),
            SubstringErrorKind::AmbiguousName => write!(f, "ambiguous name"),
            SubstringErrorKind::Unset => write!(f, "unset"),
            SubstringErrorKind::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A pattern that the engine refused to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}: {excerpt}")]
pub struct CompileError {
    /// The offending pattern text.
    pub pattern: String,
    /// Byte offset of the error within `pattern`.
    pub offset: usize,
    /// A bounded window of the pattern around `offset`, with `...` where
    /// the window does not reach the pattern's edges.
    pub excerpt: String,
    /// The engine's message for `code`.
    pub message: String,
    /// The native error code.
    pub code: i32,
}

impl CompileError {
    pub fn new(pattern: &str, offset: usize, message: impl Into<String>, code: i32) -> Self {
        Self {
            pattern: pattern.to_string(),
            offset,
            excerpt: excerpt(pattern, offset),
            message: message.into(),
            code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No engine binding could be resolved for the call.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("match error: {message} (code {code})")]
    Match { code: i32, message: String },

    /// A configured ceiling stopped the match.
    #[error("{limit} exceeded: {message} (code {code})")]
    LimitExceeded {
        limit: Limit,
        code: i32,
        message: String,
    },

    #[error("conversion error at offset {offset}: {message} (code {code})")]
    Convert {
        code: i32,
        offset: usize,
        message: String,
    },

    #[error("substitution error: {message} (code {code})")]
    Substitute { code: i32, message: String },

    #[error("substring error ({kind}): {message} (code {code})")]
    Substring {
        kind: SubstringErrorKind,
        code: i32,
        message: String,
    },

    #[error("serialization error: {message} (code {code})")]
    Serialize { code: i32, message: String },

    /// A condition that cannot happen for a pattern that compiled
    /// successfully, such as an anchored recompilation failing.
    #[error("internal error: {message} (code {code})")]
    Internal { code: i32, message: String },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("illegal state: {0}")]
    State(String),
}

impl Error {
    /// The originating native code, or 0 when not applicable.
    pub fn code(&self) -> i32 {
        match self {
            Error::Compile(err) => err.code,
            Error::Match { code, .. }
            | Error::LimitExceeded { code, .. }
            | Error::Convert { code, .. }
            | Error::Substitute { code, .. }
            | Error::Substring { code, .. }
            | Error::Serialize { code, .. }
            | Error::Internal { code, .. } => *code,
            Error::Configuration(_) | Error::Argument(_) | Error::State(_) => 0,
        }
    }

    /// The ceiling that was exceeded, if this is a limit failure.
    pub fn limit(&self) -> Option<Limit> {
        match self {
            Error::LimitExceeded { limit, .. } => Some(*limit),
            _ => None,
        }
    }

    pub fn is_limit_exceeded(&self) -> bool {
        self.limit().is_some()
    }
}

/// Cut a window of the pattern around `offset` for error reporting.
pub(crate) fn excerpt(pattern: &str, offset: usize) -> String {
    let mut offset = offset.min(pattern.len());
    while !pattern.is_char_boundary(offset) {
        offset -= 1;
    }
    let (head, tail) = pattern.split_at(offset);
    let head_chars = head.chars().count();
    let tail_chars = tail.chars().count();

    let mut out = String::new();
    if head_chars > EXCERPT_CONTEXT {
        out.push_str("...");
    }
    out.extend(head.chars().skip(head_chars.saturating_sub(EXCERPT_CONTEXT)));
    out.extend(tail.chars().take(EXCERPT_CONTEXT));
    if tail_chars > EXCERPT_CONTEXT {
        out.push_str("...");
    }
    out
}
