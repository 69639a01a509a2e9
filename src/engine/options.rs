//! Numeric option, info and error codes of the native engine contract.
//!
//! Values are those of the PCRE2 C API; every binding of [`Engine`] speaks
//! them.
//!
//! [`Engine`]: super::Engine

// Compile options
pub const ALLOW_EMPTY_CLASS: u32 = 0x0000_0001;
pub const ALT_BSUX: u32 = 0x0000_0002;
pub const CASELESS: u32 = 0x0000_0008;
pub const DOLLAR_ENDONLY: u32 = 0x0000_0010;
pub const DOTALL: u32 = 0x0000_0020;
pub const DUPNAMES: u32 = 0x0000_0040;
pub const EXTENDED: u32 = 0x0000_0080;
pub const FIRSTLINE: u32 = 0x0000_0100;
pub const MULTILINE: u32 = 0x0000_0400;
pub const NEVER_UCP: u32 = 0x0000_0800;
pub const NEVER_UTF: u32 = 0x0000_1000;
pub const NO_AUTO_CAPTURE: u32 = 0x0000_2000;
pub const NO_AUTO_POSSESS: u32 = 0x0000_4000;
pub const NO_DOTSTAR_ANCHOR: u32 = 0x0000_8000;
pub const NO_START_OPTIMIZE: u32 = 0x0001_0000;
pub const UCP: u32 = 0x0002_0000;
pub const UNGREEDY: u32 = 0x0004_0000;
pub const UTF: u32 = 0x0008_0000;
pub const USE_OFFSET_LIMIT: u32 = 0x0080_0000;
pub const LITERAL: u32 = 0x0200_0000;

// Options valid at compile time and at match time
pub const ENDANCHORED: u32 = 0x2000_0000;
pub const NO_UTF_CHECK: u32 = 0x4000_0000;
pub const ANCHORED: u32 = 0x8000_0000;

/// Compile options the engine accepts together with [`LITERAL`].
pub const LITERAL_COMPATIBLE: u32 =
    ANCHORED | CASELESS | ENDANCHORED | FIRSTLINE | NO_START_OPTIMIZE | NO_UTF_CHECK | UTF;

// Match options
pub const NOTBOL: u32 = 0x0000_0001;
pub const NOTEOL: u32 = 0x0000_0002;
pub const NOTEMPTY: u32 = 0x0000_0004;
pub const NOTEMPTY_ATSTART: u32 = 0x0000_0008;
pub const PARTIAL_SOFT: u32 = 0x0000_0010;
pub const PARTIAL_HARD: u32 = 0x0000_0020;
pub const DFA_SHORTEST: u32 = 0x0000_0080;
pub const SUBSTITUTE_GLOBAL: u32 = 0x0000_0100;
pub const SUBSTITUTE_EXTENDED: u32 = 0x0000_0200;
pub const SUBSTITUTE_UNSET_EMPTY: u32 = 0x0000_0400;
pub const SUBSTITUTE_UNKNOWN_UNSET: u32 = 0x0000_0800;
pub const SUBSTITUTE_OVERFLOW_LENGTH: u32 = 0x0000_1000;
pub const NO_JIT: u32 = 0x0000_2000;

// JIT compile options
pub const JIT_COMPLETE: u32 = 0x0000_0001;

// Newline conventions
pub const NEWLINE_CR: u32 = 1;
pub const NEWLINE_LF: u32 = 2;
pub const NEWLINE_CRLF: u32 = 3;
pub const NEWLINE_ANY: u32 = 4;
pub const NEWLINE_ANYCRLF: u32 = 5;
pub const NEWLINE_NUL: u32 = 6;

// Conversion options
pub const CONVERT_UTF: u32 = 0x0000_0001;
pub const CONVERT_POSIX_BASIC: u32 = 0x0000_0004;
pub const CONVERT_POSIX_EXTENDED: u32 = 0x0000_0008;
pub const CONVERT_GLOB: u32 = 0x0000_0010;
pub const CONVERT_GLOB_NO_WILD_SEPARATOR: u32 = 0x0000_0030;
pub const CONVERT_GLOB_NO_STARSTAR: u32 = 0x0000_0050;

// Pattern info requests answered with a u32
pub const INFO_ALLOPTIONS: u32 = 0;
pub const INFO_ARGOPTIONS: u32 = 1;
pub const INFO_BACKREFMAX: u32 = 2;
pub const INFO_CAPTURECOUNT: u32 = 4;
pub const INFO_MATCHEMPTY: u32 = 13;
pub const INFO_MINLENGTH: u32 = 16;
pub const INFO_NAMECOUNT: u32 = 17;
pub const INFO_NAMEENTRYSIZE: u32 = 18;
pub const INFO_NEWLINE: u32 = 20;
// Answered with a pointer into the compiled pattern
pub const INFO_NAMETABLE: u32 = 19;
// Pattern info requests answered with a size
pub const INFO_JITSIZE: u32 = 10;
pub const INFO_SIZE: u32 = 22;

// Engine configuration queries answered with a u32
pub const CONFIG_JIT: u32 = 1;
pub const CONFIG_LINKSIZE: u32 = 3;
pub const CONFIG_MATCHLIMIT: u32 = 4;
pub const CONFIG_NEWLINE: u32 = 5;
pub const CONFIG_PARENSLIMIT: u32 = 6;
pub const CONFIG_DEPTHLIMIT: u32 = 7;
pub const CONFIG_UNICODE: u32 = 9;
// Answered with a string
pub const CONFIG_VERSION: u32 = 11;
pub const CONFIG_HEAPLIMIT: u32 = 12;

// Result codes
pub const ERROR_NOMATCH: i32 = -1;
pub const ERROR_PARTIAL: i32 = -2;
pub const ERROR_BADOFFSET: i32 = -33;
pub const ERROR_BADOPTION: i32 = -34;
pub const ERROR_BADUTFOFFSET: i32 = -36;
pub const ERROR_DFA_WSSIZE: i32 = -43;
pub const ERROR_INTERNAL: i32 = -44;
pub const ERROR_JIT_BADOPTION: i32 = -45;
pub const ERROR_JIT_STACKLIMIT: i32 = -46;
pub const ERROR_MATCHLIMIT: i32 = -47;
pub const ERROR_NOMEMORY: i32 = -48;
pub const ERROR_NOSUBSTRING: i32 = -49;
pub const ERROR_NOUNIQUESUBSTRING: i32 = -50;
pub const ERROR_NULL: i32 = -51;
pub const ERROR_DEPTHLIMIT: i32 = -53;
pub const ERROR_UNAVAILABLE: i32 = -54;
pub const ERROR_UNSET: i32 = -55;
pub const ERROR_BADSERIALIZEDDATA: i32 = -62;
pub const ERROR_HEAPLIMIT: i32 = -63;

/// Ovector value for a group that did not participate in the match.
pub const UNSET: usize = usize::MAX;
