//! Resource-limit enforcement.
//!
//! Translates configured ceilings onto match contexts, picks the context a
//! matcher runs with, and maps the engine's limit failures onto
//! [`Error::LimitExceeded`] so callers can tell a stopped match from a
//! failed one.

use crate::config::{MatchConfig, MatchLimits};
use crate::engine::options::{ERROR_DEPTHLIMIT, ERROR_HEAPLIMIT, ERROR_MATCHLIMIT};
use crate::engine::Engine;
use crate::error::{Error, Limit, Result};
use crate::resources::MatchContext;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Set every ceiling in `limits` on `context`.
pub fn apply_limits(context: &mut MatchContext, limits: &MatchLimits) -> Result<()> {
    if let Some(limit) = limits.match_limit {
        context.set_match_limit(limit)?;
    }
    if let Some(limit) = limits.depth_limit {
        context.set_depth_limit(limit)?;
    }
    if let Some(kib) = limits.heap_limit_kib {
        context.set_heap_limit_kib(kib)?;
    }
    Ok(())
}

/// Ceilings from the environment, read on first use.
pub fn ambient_limits() -> MatchLimits {
    static AMBIENT: OnceLock<MatchLimits> = OnceLock::new();
    *AMBIENT.get_or_init(|| {
        let limits = MatchLimits::from_env();
        if !limits.is_empty() {
            debug!(?limits, "ambient match limits from environment");
        }
        limits
    })
}

/// The limit a native result code reports, if any.
pub fn limit_for_code(code: i32) -> Option<Limit> {
    match code {
        ERROR_MATCHLIMIT => Some(Limit::MatchSteps),
        ERROR_DEPTHLIMIT => Some(Limit::Depth),
        ERROR_HEAPLIMIT => Some(Limit::Heap),
        _ => None,
    }
}

/// The context a match runs with when none is supplied explicitly.
///
/// Ceilings come from `config` when it sets any, otherwise from the ambient
/// limits. A configured JIT stack is used either way. Returns `None` when
/// neither source sets anything.
pub(crate) fn context_for(
    engine: &Arc<dyn Engine>,
    config: &MatchConfig,
) -> Result<Option<MatchContext>> {
    context_with_ambient(engine, config, &ambient_limits())
}

pub(crate) fn context_with_ambient(
    engine: &Arc<dyn Engine>,
    config: &MatchConfig,
    ambient: &MatchLimits,
) -> Result<Option<MatchContext>> {
    let effective = MatchConfig {
        limits: if config.limits.is_empty() {
            *ambient
        } else {
            config.limits
        },
        jit_stack: config.jit_stack,
    };
    if effective.is_unset() {
        return Ok(None);
    }
    MatchContext::from_config(engine, &effective).map(Some)
}

fn limit_error(engine: &dyn Engine, code: i32) -> Option<Error> {
    limit_for_code(code).map(|limit| Error::LimitExceeded {
        limit,
        code,
        message: engine.error_message(code),
    })
}

/// Translate a failed match result.
pub(crate) fn match_error(engine: &dyn Engine, code: i32) -> Error {
    limit_error(engine, code).unwrap_or_else(|| Error::Match {
        code,
        message: engine.error_message(code),
    })
}

/// Translate a failed substitution result.
pub(crate) fn substitute_error(engine: &dyn Engine, code: i32) -> Error {
    limit_error(engine, code).unwrap_or_else(|| Error::Substitute {
        code,
        message: engine.error_message(code),
    })
}
