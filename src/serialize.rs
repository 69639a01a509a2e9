//! Saving compiled patterns and loading them without recompiling.
//!
//! The native engine serializes a set of compiled codes into one opaque
//! byte block. That block is wrapped in a JSON envelope carrying what the
//! engine does not store: the pattern text, flags, extra native options and
//! configuration of every pattern. Loading decodes the block, adopts each
//! code as the primary of a rebuilt [`Pattern`] and JIT-compiles it again
//! when the configuration asks for JIT.
//!
//! Serialized codes are only portable between builds of the same engine
//! version; the envelope records the version for diagnostics.

use crate::backend::{self, Binding};
use crate::config::CompatConfig;
use crate::error::{Error, Result};
use crate::pattern::{Flags, Pattern};
use crate::resources::Code;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Envelope layout version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    format: u32,
    engine_version: String,
    patterns: Vec<PatternMeta>,
    /// Base64 of the engine's serialized code block.
    codes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PatternMeta {
    source: String,
    flags: Flags,
    extra_options: u32,
    jit: bool,
    config: CompatConfig,
}

/// Serialize `patterns`, which must share one engine binding.
pub fn to_bytes(patterns: &[&Pattern]) -> Result<Vec<u8>> {
    let Some(first) = patterns.first() else {
        return Err(Error::Argument(
            "at least one pattern is required".to_string(),
        ));
    };
    let engine = first.engine();
    if patterns
        .iter()
        .any(|pattern| !backend::same_binding(pattern.engine(), engine))
    {
        return Err(Error::Argument(
            "patterns serialized together must share an engine binding".to_string(),
        ));
    }

    let handles: Vec<_> = patterns
        .iter()
        .map(|pattern| pattern.primary_code().handle())
        .collect();
    let block = engine
        .serialize_encode(&handles)
        .map_err(|code| Error::Serialize {
            code,
            message: engine.error_message(code),
        })?;

    let envelope = Envelope {
        format: FORMAT_VERSION,
        engine_version: engine.version(),
        patterns: patterns
            .iter()
            .map(|pattern| PatternMeta {
                source: pattern.as_str().to_string(),
                flags: pattern.flags(),
                extra_options: pattern.extra_options(),
                jit: pattern.is_jit(),
                config: pattern.config().clone(),
            })
            .collect(),
        codes: STANDARD.encode(&block),
    };
    debug!(
        count = patterns.len(),
        bytes = block.len(),
        "serialized patterns"
    );
    serde_json::to_vec(&envelope).map_err(|err| Error::Serialize {
        code: 0,
        message: format!("failed to encode envelope: {err}"),
    })
}

/// Rebuild the patterns in `bytes` on `engine`, or on the resolved binding
/// when `None`.
pub fn from_bytes(bytes: &[u8], engine: Option<&Binding>) -> Result<Vec<Pattern>> {
    let engine = backend::resolve_with(engine)?;
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|err| Error::Serialize {
        code: 0,
        message: format!("malformed envelope: {err}"),
    })?;
    if envelope.format != FORMAT_VERSION {
        return Err(Error::Serialize {
            code: 0,
            message: format!("unsupported envelope format {}", envelope.format),
        });
    }
    let block = STANDARD
        .decode(envelope.codes.as_bytes())
        .map_err(|err| Error::Serialize {
            code: 0,
            message: format!("invalid code block encoding: {err}"),
        })?;

    let count = engine.serialize_code_count(&block);
    if count < 0 {
        return Err(Error::Serialize {
            code: count,
            message: engine.error_message(count),
        });
    }
    if count as usize != envelope.patterns.len() {
        return Err(Error::Serialize {
            code: 0,
            message: format!(
                "code block holds {count} patterns but the envelope describes {}",
                envelope.patterns.len()
            ),
        });
    }

    // Own every handle before anything else can fail, so all are freed.
    let codes: Vec<Code> = engine
        .serialize_decode(&block)
        .map_err(|code| Error::Serialize {
            code,
            message: engine.error_message(code),
        })?
        .into_iter()
        .map(|handle| Code::adopt(engine.clone(), handle))
        .collect();
    if codes.len() != envelope.patterns.len() {
        return Err(Error::Serialize {
            code: 0,
            message: format!("decoded {} codes, expected {count}", codes.len()),
        });
    }
    if envelope.engine_version != engine.version() {
        debug!(
            saved = %envelope.engine_version,
            running = %engine.version(),
            "loading patterns serialized by another engine version"
        );
    }

    envelope
        .patterns
        .into_iter()
        .zip(codes)
        .map(|(meta, code)| {
            let mut config = meta.config;
            config.compile.jit = meta.jit;
            Pattern::assemble(
                engine.clone(),
                meta.source,
                meta.flags,
                meta.extra_options,
                config,
                Some(code),
            )
        })
        .collect()
}

/// Write `patterns` to `path`.
pub fn save(path: impl AsRef<Path>, patterns: &[&Pattern]) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(patterns)?;
    fs::write(path, &bytes).map_err(|err| Error::Serialize {
        code: 0,
        message: format!("failed to write {}: {err}", path.display()),
    })?;
    info!(path = %path.display(), count = patterns.len(), "saved compiled patterns");
    Ok(())
}

/// Read patterns previously written with [`save`].
pub fn load(path: impl AsRef<Path>, engine: Option<&Binding>) -> Result<Vec<Pattern>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| Error::Serialize {
        code: 0,
        message: format!("failed to read {}: {err}", path.display()),
    })?;
    let patterns = from_bytes(&bytes, engine)?;
    info!(path = %path.display(), count = patterns.len(), "loaded compiled patterns");
    Ok(patterns)
}
