//! # pcre2-compat
//!
//! `java.util.regex` matching semantics on top of the PCRE2 engine.
//!
//! The native engine offers one matching call. This crate layers the Java
//! API over it: separate `find`, `matches` and `lookingAt` operations,
//! region bounds with or without anchoring, `hitEnd`/`requireEnd`, and
//! named and numbered groups. Execution can be bounded by match-step,
//! depth and heap ceilings, and uses the JIT whenever it is available.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pcre2_compat::{backend, Pattern};
//!
//! backend::install_native_default();
//!
//! let phone = Pattern::compile(r"\d{3}-(\d{3})-(\d{4})")?;
//! let mut matcher = phone.matcher("call 555-123-4567 now")?;
//! assert!(matcher.find()?);
//! assert_eq!(matcher.group(1), Some("123"));
//! assert_eq!(matcher.range(), Some(5..17));
//! # Ok::<(), pcre2_compat::Error>(())
//! ```
//!
//! ### Regions
//!
//! ```rust,no_run
//! use pcre2_compat::{backend, Pattern};
//!
//! backend::install_native_default();
//!
//! let word = Pattern::compile("^[a-z]+$")?;
//! let mut matcher = word.matcher("12abc34")?;
//! matcher.region(2, 5)?;
//! // With anchoring bounds `^` and `$` match at the region bounds.
//! assert!(matcher.matches()?);
//! # Ok::<(), pcre2_compat::Error>(())
//! ```
//!
//! ### Bounded execution
//!
//! ```rust,no_run
//! use pcre2_compat::{backend, CompatConfig, Pattern};
//!
//! backend::install_native_default();
//!
//! let pattern = Pattern::builder("(a+)+b")
//!     .config(CompatConfig::untrusted_input())
//!     // Otherwise a subject without any 'b' is rejected before matching.
//!     .disable_start_optimization()
//!     .build()?;
//! let err = pattern.matcher(&"a".repeat(40))?.find().unwrap_err();
//! assert!(err.is_limit_exceeded());
//! # Ok::<(), pcre2_compat::Error>(())
//! ```
//!
//! ## Engine bindings
//!
//! Everything native goes through the [`Engine`] trait. Operations resolve
//! a binding from an explicit argument, then the innermost
//! [`backend::enter_scope`] on the current thread, then the process default
//! installed with [`backend::install_default`]. No binding is installed
//! implicitly.
//!
//! Native handles are owned by the wrappers in [`resources`] and released
//! when they drop.

pub mod backend;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod limits;
pub mod matcher;
pub mod pattern;
pub mod resources;
pub mod serialize;
pub mod syntax;

// Backend resolution
pub use backend::{Binding, Registry, ScopeGuard};

// Configuration
pub use config::{CompatConfig, CompileConfig, JitStackConfig, MatchConfig, MatchLimits, Newline};

// Engine contract and bindings
pub use engine::{CallCounts, Engine, EngineInfo, Instrumented, Pcre2};

// Core types and errors
pub use error::{CompileError, Error, Limit, Result, SubstringErrorKind};
pub use matcher::Matcher;
pub use pattern::{DfaOptions, Flags, Pattern, PatternBuilder, SubstituteOptions};
pub use resources::{Code, CompileContext, ConvertContext, JitStack, MatchContext, MatchData};

// Conversion
pub use convert::{GlobOptions, PosixSyntax};
