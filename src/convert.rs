//! Glob and POSIX pattern conversion.
//!
//! The engine's converter rewrites shell globs and POSIX basic or extended
//! regular expressions into its own syntax. The result is plain pattern
//! text, ready for [`Pattern::compile`](crate::Pattern::compile).

use crate::backend::{self, Binding};
use crate::engine::options::{
    CONVERT_GLOB, CONVERT_GLOB_NO_STARSTAR, CONVERT_GLOB_NO_WILD_SEPARATOR,
    CONVERT_POSIX_BASIC, CONVERT_POSIX_EXTENDED, CONVERT_UTF,
};
use crate::engine::NativeFailure;
use crate::error::{Error, Result};
use crate::pattern::Pattern;
use crate::resources::ConvertContext;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Glob conversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobOptions {
    /// Path separator: `/`, `\` or `.`.
    pub separator: char,
    /// Escape character, `None` for no escaping.
    pub escape: Option<char>,
    /// Wildcards never match the separator.
    pub no_wild_separator: bool,
    /// `**` is an ordinary pair of stars.
    pub no_starstar: bool,
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self {
            separator: '/',
            escape: Some('\\'),
            no_wild_separator: false,
            no_starstar: false,
        }
    }
}

impl GlobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Windows-style paths: `\` separates, and so cannot escape.
    pub fn windows() -> Self {
        Self {
            separator: '\\',
            escape: None,
            ..Self::default()
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_escape(mut self, escape: Option<char>) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_no_wild_separator(mut self, enable: bool) -> Self {
        self.no_wild_separator = enable;
        self
    }

    pub fn with_no_starstar(mut self, enable: bool) -> Self {
        self.no_starstar = enable;
        self
    }

    fn native(&self) -> u32 {
        let mut options = CONVERT_UTF | CONVERT_GLOB;
        if self.no_wild_separator {
            options |= CONVERT_GLOB_NO_WILD_SEPARATOR;
        }
        if self.no_starstar {
            options |= CONVERT_GLOB_NO_STARSTAR;
        }
        options
    }
}

/// POSIX regular expression dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PosixSyntax {
    Basic,
    Extended,
}

impl PosixSyntax {
    fn native(self) -> u32 {
        CONVERT_UTF
            | match self {
                PosixSyntax::Basic => CONVERT_POSIX_BASIC,
                PosixSyntax::Extended => CONVERT_POSIX_EXTENDED,
            }
    }
}

/// Convert a shell glob into pattern text.
pub fn glob_to_pattern(glob: &str, options: &GlobOptions) -> Result<String> {
    glob_to_pattern_with(glob, options, None)
}

/// Convert a glob using `engine`, or the resolved binding when `None`.
pub fn glob_to_pattern_with(
    glob: &str,
    options: &GlobOptions,
    engine: Option<&Binding>,
) -> Result<String> {
    let engine = backend::resolve_with(engine)?;
    let mut context = ConvertContext::new(&engine)?;
    context.set_glob_separator(options.separator)?;
    context.set_glob_escape(options.escape)?;
    let converted = engine.pattern_convert(glob.as_bytes(), options.native(), Some(context.handle()));
    finish(&engine, glob, converted)
}

/// Convert a POSIX regular expression into pattern text.
pub fn posix_to_pattern(text: &str, syntax: PosixSyntax) -> Result<String> {
    posix_to_pattern_with(text, syntax, None)
}

pub fn posix_to_pattern_with(
    text: &str,
    syntax: PosixSyntax,
    engine: Option<&Binding>,
) -> Result<String> {
    let engine = backend::resolve_with(engine)?;
    let converted = engine.pattern_convert(text.as_bytes(), syntax.native(), None);
    finish(&engine, text, converted)
}

/// Convert `glob` and compile the result on the same binding.
pub fn compile_glob(glob: &str, options: &GlobOptions, engine: Option<&Binding>) -> Result<Pattern> {
    let engine = backend::resolve_with(engine)?;
    let text = glob_to_pattern_with(glob, options, Some(&engine))?;
    Pattern::builder(text).engine(engine).build()
}

fn finish(
    engine: &Binding,
    input: &str,
    converted: std::result::Result<Vec<u8>, NativeFailure>,
) -> Result<String> {
    let bytes = converted.map_err(|failure| Error::Convert {
        code: failure.code,
        offset: failure.offset,
        message: engine.error_message(failure.code),
    })?;
    let text = String::from_utf8(bytes).map_err(|err| Error::Internal {
        code: 0,
        message: format!("converted pattern is not UTF-8: {err}"),
    })?;
    debug!(input, converted = %text, "converted pattern");
    Ok(text)
}
